//! # looptap-audio
//!
//! Low-latency capture-to-playback engine for looptap.
//!
//! Features:
//! - Fixed pool of hardware buffers recycled through a FIFO free-list
//! - Queued playback voice that never blocks the capture loop
//! - Lock-free ring buffer between the capture callback and the drive loop
//! - cpal hardware backend plus a deterministic simulated backend

pub mod backend;
pub mod buffer;
pub mod diagnostics;
pub mod engine;
pub mod loopback;

pub use backend::{
    AudioBackend, BufferHandle, CaptureDevice, CpalBackend, DeviceInfo, PlaybackDevice,
    SimBackend, VoiceId, VoiceState,
};
pub use buffer::{BufferPool, SampleRing};
pub use diagnostics::{Diagnostic, DiagnosticSink, MemorySink, TracingSink};
pub use engine::{EngineStats, PlayOutcome, PlaybackEngine};
pub use loopback::{FrameSink, Loopback, TickReport};
