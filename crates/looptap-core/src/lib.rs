//! # looptap-core
//!
//! Core types, configuration, and error handling for the looptap
//! capture-to-playback loopback engine.

pub mod config;
pub mod error;
pub mod frame;

pub use config::{Config, MAX_CACHE};
pub use error::{BackendError, Error, PoolError, Result};
pub use frame::{Frame, FrameSpec, SampleFormat};
