//! Runtime configuration.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::error::{Error, Result};
use crate::frame::FrameSpec;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable that overrides the config file location.
pub const CONFIG_ENV: &str = "LOOPTAP_CONFIG";

/// Number of hardware buffers the playback engine cycles through.
pub const MAX_CACHE: usize = 32;

/// Loopback settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Capture and playback sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per frame.
    pub frame_samples: usize,
    /// Capture device's internal buffer length in seconds.
    pub capture_buffer_secs: f32,
    /// Drive loop ticks per second.
    pub tick_rate_hz: u32,
    /// Hardware buffers in the playback pool.
    pub pool_capacity: usize,
    /// Start with playback muted.
    pub start_muted: bool,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Width of the terminal level meter in characters.
    pub meter_width: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            frame_samples: 512,
            capture_buffer_secs: 0.1,
            tick_rate_hz: 60,
            pool_capacity: MAX_CACHE,
            start_muted: false,
            log_filter: "looptap=info,looptap_app=info,looptap_audio=info".to_string(),
            meter_width: 48,
        }
    }
}

impl Config {
    /// Load from `$LOOPTAP_CONFIG` or the platform config directory.
    ///
    /// A missing file yields the defaults.
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory available, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Resolve the config file location.
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        ProjectDirs::from("", "", "looptap").map(|d| d.config_dir().join("config.json"))
    }

    /// Reject settings the loopback cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".to_string()));
        }
        if self.frame_samples == 0 {
            return Err(Error::Config("frame_samples must be positive".to_string()));
        }
        if self.tick_rate_hz == 0 {
            return Err(Error::Config("tick_rate_hz must be positive".to_string()));
        }
        if !(1..=256).contains(&self.pool_capacity) {
            return Err(Error::Config(format!(
                "pool_capacity must be within 1..=256, got {}",
                self.pool_capacity
            )));
        }
        if !(self.capture_buffer_secs.is_finite() && self.capture_buffer_secs > 0.0) {
            return Err(Error::Config(
                "capture_buffer_secs must be a positive number".to_string(),
            ));
        }
        if self.capture_buffer_samples() < self.frame_samples {
            return Err(Error::Config(format!(
                "capture buffer of {} samples cannot hold one {}-sample frame",
                self.capture_buffer_samples(),
                self.frame_samples
            )));
        }
        Ok(())
    }

    /// Frame contract derived from these settings.
    pub const fn frame_spec(&self) -> FrameSpec {
        FrameSpec::new(self.sample_rate, self.frame_samples)
    }

    /// Capture ring size in samples.
    pub fn capture_buffer_samples(&self) -> usize {
        (f64::from(self.sample_rate) * f64::from(self.capture_buffer_secs)).round() as usize
    }

    /// Time between drive loop ticks.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}
