//! Error types for looptap.

use thiserror::Error;

/// Result type alias using looptap's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for looptap.
#[derive(Error, Debug)]
pub enum Error {
    // Initialization errors
    #[error("No output device available: {0}")]
    NoOutputDevice(String),

    #[error("Failed to create output context: {0}")]
    ContextCreation(String),

    #[error("Failed to allocate {what}")]
    Allocation { what: &'static str },

    #[error("No input device available: {0}")]
    NoInputDevice(String),

    #[error("Unsupported stream format: {0}")]
    UnsupportedFormat(String),

    // Runtime errors
    #[error("Audio backend reported {count} error(s) after \"{tag}\"")]
    Backend { tag: &'static str, count: usize },

    #[error("Capture device failed: {0}")]
    Capture(BackendError),

    #[error("Capture has {available} samples available, {requested} requested")]
    InsufficientSamples { available: usize, requested: usize },

    #[error("Frame holds {actual} samples, expected {expected}")]
    FrameSize { expected: usize, actual: usize },

    // Invariant violations
    #[error("Buffer pool invariant violated: {0}")]
    Pool(#[from] PoolError),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Misuse of the buffer pool. Always a programming error.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("buffer {id} released while already in the free-list")]
    DoubleRelease { id: u32 },

    #[error("buffer {id} does not belong to this pool")]
    UnknownHandle { id: u32 },
}

/// Error codes surfaced by an audio backend after a hardware call.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendError {
    #[error("invalid name")]
    InvalidName,

    #[error("invalid enum")]
    InvalidEnum,

    #[error("invalid value")]
    InvalidValue,

    #[error("invalid operation")]
    InvalidOperation,

    #[error("out of memory")]
    OutOfMemory,

    #[error("device lost")]
    DeviceLost,

    #[error("unknown error")]
    Unknown(i32),
}

impl BackendError {
    /// Numeric code, using the OpenAL values where one exists.
    pub const fn code(self) -> i32 {
        match self {
            Self::InvalidName => 0xA001,
            Self::InvalidEnum => 0xA002,
            Self::InvalidValue => 0xA003,
            Self::InvalidOperation => 0xA004,
            Self::OutOfMemory => 0xA005,
            Self::DeviceLost => 0xA0FF,
            Self::Unknown(code) => code,
        }
    }
}

impl Error {
    /// Returns true if this error means the loopback could not be brought up.
    pub const fn is_initialization_failure(&self) -> bool {
        matches!(
            self,
            Self::NoOutputDevice(_)
                | Self::ContextCreation(_)
                | Self::Allocation { .. }
                | Self::NoInputDevice(_)
                | Self::UnsupportedFormat(_)
        )
    }

    /// Returns true if this error indicates a broken internal invariant.
    pub const fn is_invariant_violation(&self) -> bool {
        matches!(self, Self::Pool(_) | Self::FrameSize { .. })
    }
}
