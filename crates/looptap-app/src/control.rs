//! Control surface: toggle-mute and quit, read line by line from stdin.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::io::BufRead;
use tracing::{debug, warn};

/// User commands accepted while the loopback runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Stop or restart feeding captured audio to playback.
    ToggleMute,
    /// Tear down and exit.
    Quit,
}

/// Map one input line to a command.
pub fn parse_command(line: &str) -> Option<Command> {
    let line = line.trim_end_matches(['\r', '\n']);
    if line.starts_with(' ') && line.trim().is_empty() {
        return Some(Command::ToggleMute);
    }

    match line.trim().to_ascii_lowercase().as_str() {
        "m" | "mute" => Some(Command::ToggleMute),
        "q" | "quit" | "exit" => Some(Command::Quit),
        _ => None,
    }
}

/// Forward commands from `reader` until it ends, then send `Quit`.
pub fn read_commands<R: BufRead>(reader: R, tx: &Sender<Command>) {
    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to read control input: {e}");
                break;
            }
        };

        match parse_command(&line) {
            Some(command) => {
                if tx.send(command).is_err() {
                    return;
                }
                if command == Command::Quit {
                    return;
                }
            }
            None => debug!("Ignoring control input {line:?}"),
        }
    }

    let _ = tx.send(Command::Quit);
}

/// Read commands from stdin on a background thread.
pub fn spawn_stdin_reader() -> std::io::Result<Receiver<Command>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("stdin-control".to_string())
        .spawn(move || read_commands(std::io::stdin().lock(), &tx))?;
    Ok(rx)
}
