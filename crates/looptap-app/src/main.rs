//! # looptap
//!
//! Plays the default microphone back through the default speakers with
//! as little delay as the hardware allows.

mod control;
mod meter;

use anyhow::Result;
use control::Command;
use looptap_audio::{AudioBackend, CpalBackend, Loopback, TracingSink};
use looptap_core::Config;
use meter::LevelMeter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("looptap: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Logs go to stderr so the level meter owns stdout
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .init();

    info!("Starting looptap v{}", env!("CARGO_PKG_VERSION"));
    let spec = config.frame_spec();
    info!(
        "{} Hz, {} samples ({} bytes, {:?}) per frame, {} buffers, {} ticks/s",
        spec.sample_rate,
        spec.samples,
        spec.bytes(),
        spec.duration(),
        config.pool_capacity,
        config.tick_rate_hz
    );
    info!(
        "Worst-case queued latency {:?}",
        spec.duration() * config.pool_capacity as u32
    );

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("looptap failed: {e:#}");
            match e.downcast_ref::<looptap_core::Error>() {
                Some(cause) if cause.is_initialization_failure() => {
                    eprintln!("looptap: {e}. Please check your audio hardware.");
                }
                Some(cause) if cause.is_invariant_violation() => {
                    eprintln!("looptap: internal error: {e}. This is a bug, please report it.");
                }
                _ => eprintln!("looptap: {e:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

/// First argument overrides the config file location.
fn load_config() -> looptap_core::Result<Config> {
    match std::env::args_os().nth(1) {
        Some(path) => Config::load_from(&PathBuf::from(path)),
        None => Config::load(),
    }
}

fn run(config: &Config) -> Result<()> {
    let backend = CpalBackend::new();
    info!("Audio host: {}", backend.name());

    let mut loopback = Loopback::open(&backend, config, Box::new(TracingSink))?;
    let commands = control::spawn_stdin_reader()?;
    let mut meter = LevelMeter::new(std::io::stdout(), config.meter_width);
    let interval = config.tick_interval();

    info!("Listening. Enter 'm' to toggle mute, 'q' to quit.");

    'running: loop {
        let started = Instant::now();

        for command in commands.try_iter() {
            match command {
                Command::ToggleMute => {
                    loopback.toggle_mute();
                }
                Command::Quit => break 'running,
            }
        }

        loopback.tick(&mut meter)?;

        if let Some(rest) = interval.checked_sub(started.elapsed()) {
            std::thread::sleep(rest);
        }
    }

    println!();
    let stats = loopback.engine().stats();
    info!(
        "Shutting down: {} frames played, {} dropped, {} backend errors",
        stats.submitted, stats.dropped, stats.backend_errors
    );
    loopback.shutdown();
    Ok(())
}
