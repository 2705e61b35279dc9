//! Device boundary between the engine and an audio backend.
//!
//! The playback side follows a queued-voice model: the engine fills buffers,
//! queues them on a single voice, and later unqueues the ones the hardware
//! reports as processed. Hardware calls do not return errors directly; the
//! engine polls [`PlaybackDevice::take_error`] after each group of calls.

mod bank;
pub mod native;
pub mod sim;

use looptap_core::{BackendError, FrameSpec, Result};
use std::fmt;

pub use native::CpalBackend;
pub use sim::SimBackend;

/// Backend-assigned identifier of one hardware buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u32);

impl BufferHandle {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "buffer#{}", self.0)
    }
}

/// Backend-assigned identifier of a playback voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoiceId(u32);

impl VoiceId {
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    pub const fn id(self) -> u32 {
        self.0
    }
}

/// Play state of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoiceState {
    #[default]
    Stopped,
    Paused,
    Playing,
}

/// Descriptive strings reported by an output backend.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    pub vendor: String,
    pub version: String,
    pub renderer: String,
    pub extensions: String,
}

/// Opens the output and input devices of one audio backend.
pub trait AudioBackend {
    type Output: PlaybackDevice;
    type Input: CaptureDevice;

    /// Short backend name for logs.
    fn name(&self) -> &'static str;

    /// Acquire the output device and create its context.
    fn open_output(&self, spec: &FrameSpec) -> Result<Self::Output>;

    /// Acquire the input device with an internal buffer of `buffer_secs`.
    fn open_input(&self, spec: &FrameSpec, buffer_secs: f32) -> Result<Self::Input>;
}

/// An acquired output device together with its context.
///
/// Dropping the value releases the context and the device.
pub trait PlaybackDevice {
    fn info(&self) -> DeviceInfo;

    /// Bind or unbind this device's context for subsequent calls.
    fn make_context_current(&mut self, current: bool);

    /// Allocate up to `count` buffers. Shortfalls are reported via `take_error`.
    fn gen_buffers(&mut self, count: usize) -> Vec<BufferHandle>;

    fn delete_buffers(&mut self, buffers: &[BufferHandle]);

    /// Allocate a voice. Failures are reported via `take_error`.
    fn gen_voice(&mut self) -> Option<VoiceId>;

    fn delete_voice(&mut self, voice: VoiceId);

    /// Copy samples into a buffer's backing storage.
    fn buffer_data(&mut self, buffer: BufferHandle, samples: &[i16], sample_rate: u32);

    /// Append buffers to the tail of the voice's queue.
    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferHandle]);

    /// Remove `out.len()` processed buffers from the head of the queue.
    ///
    /// Returns how many were written to `out`.
    fn unqueue_buffers(&mut self, voice: VoiceId, out: &mut [BufferHandle]) -> usize;

    fn voice_state(&self, voice: VoiceId) -> VoiceState;

    /// Buffers on the voice's queue, processed or not.
    fn buffers_queued(&self, voice: VoiceId) -> usize;

    /// Queued buffers the hardware has finished consuming.
    fn buffers_processed(&self, voice: VoiceId) -> usize;

    fn play(&mut self, voice: VoiceId);

    fn pause(&mut self, voice: VoiceId);

    /// Stop the voice. Everything still queued is marked processed.
    fn stop(&mut self, voice: VoiceId);

    /// Pop the oldest pending error code.
    fn take_error(&mut self) -> Option<BackendError>;
}

/// An acquired input device.
///
/// Dropping the value stops capture and closes the device.
pub trait CaptureDevice {
    fn start(&mut self) -> Result<()>;

    fn stop(&mut self) -> Result<()>;

    /// Samples captured and not yet read.
    fn available_samples(&self) -> usize;

    /// Fill `buffer` completely, or fail without consuming anything.
    fn read_into(&mut self, buffer: &mut [i16]) -> Result<()>;

    /// Take the failure that ended capture, if one happened.
    fn take_error(&mut self) -> Option<BackendError>;
}
