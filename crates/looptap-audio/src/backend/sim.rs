//! Deterministic in-memory audio backend.
//!
//! Stands in for real hardware in tests: the caller decides when queued
//! buffers finish playing, what the microphone hears, and which resources
//! fail to allocate. Live-resource counters make leaks and double releases
//! observable.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use super::bank::VoiceBank;
use super::{
    AudioBackend, BufferHandle, CaptureDevice, DeviceInfo, PlaybackDevice, VoiceId, VoiceState,
};
use looptap_core::{BackendError, Error, FrameSpec, Result};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::debug;

/// Resource acquisition the simulated hardware can be told to refuse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimFault {
    /// No output device is present.
    NoOutputDevice,
    /// The output device refuses to create a context.
    ContextCreation,
    /// Buffer allocation runs out of memory.
    BufferAllocation,
    /// Voice allocation runs out of memory.
    VoiceAllocation,
    /// No input device is present.
    NoInputDevice,
}

#[derive(Debug, Default)]
struct SimHardware {
    faults: Vec<SimFault>,
    bank: Option<VoiceBank>,
    /// Samples of every buffer the voice finished, in play order.
    played: Vec<i16>,
    injected: VecDeque<BackendError>,
    outputs_open: usize,
    outputs_opened: usize,
    context_switches: usize,
    inputs_open: usize,
    capturing: bool,
    capture_error: Option<BackendError>,
    input: VecDeque<i16>,
    input_capacity: usize,
}

impl SimHardware {
    fn has_fault(&self, fault: SimFault) -> bool {
        self.faults.contains(&fault)
    }
}

/// Handle to one simulated sound card. Clones share the same hardware.
#[derive(Debug, Clone, Default)]
pub struct SimBackend {
    hw: Arc<Mutex<SimHardware>>,
}

impl SimBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the given acquisition fail from now on.
    #[must_use]
    pub fn with_fault(self, fault: SimFault) -> Self {
        self.hw.lock().faults.push(fault);
        self
    }

    /// Queue an error code to surface on the next error poll.
    pub fn inject_error(&self, error: BackendError) {
        self.hw.lock().injected.push_back(error);
    }

    /// Let the hardware finish up to `count` queued buffers.
    ///
    /// Returns how many finished. Only a playing voice consumes.
    pub fn consume(&self, count: usize) -> usize {
        let mut hw = self.hw.lock();
        let SimHardware { bank, played, .. } = &mut *hw;
        bank.as_mut()
            .map_or(0, |bank| bank.consume_buffers(count, played))
    }

    /// Make the microphone fail with `error`. Capture stops immediately.
    pub fn fail_capture(&self, error: BackendError) {
        let mut hw = self.hw.lock();
        hw.capturing = false;
        hw.capture_error = Some(error);
    }

    /// Deliver samples to the microphone. Ignored unless capture is running.
    ///
    /// Returns how many samples fit in the device buffer.
    pub fn push_input(&self, samples: &[i16]) -> usize {
        let mut hw = self.hw.lock();
        if !hw.capturing {
            return 0;
        }
        let room = hw.input_capacity.saturating_sub(hw.input.len());
        let accepted = samples.len().min(room);
        hw.input.extend(&samples[..accepted]);
        accepted
    }

    /// Everything the voice has played so far.
    pub fn played(&self) -> Vec<i16> {
        self.hw.lock().played.clone()
    }

    pub fn outputs_open(&self) -> usize {
        self.hw.lock().outputs_open
    }

    /// Output devices opened over the backend's lifetime.
    pub fn outputs_opened(&self) -> usize {
        self.hw.lock().outputs_opened
    }

    /// Context bind and unbind calls made through output devices.
    pub fn context_switches(&self) -> usize {
        self.hw.lock().context_switches
    }

    pub fn inputs_open(&self) -> usize {
        self.hw.lock().inputs_open
    }

    pub fn is_capturing(&self) -> bool {
        self.hw.lock().capturing
    }

    pub fn live_buffers(&self) -> usize {
        self.hw.lock().bank.as_ref().map_or(0, VoiceBank::live_buffers)
    }

    pub fn has_voice(&self) -> bool {
        self.hw.lock().bank.as_ref().is_some_and(VoiceBank::has_voice)
    }

    pub fn context_current(&self) -> bool {
        self.hw
            .lock()
            .bank
            .as_ref()
            .is_some_and(VoiceBank::context_current)
    }
}

impl AudioBackend for SimBackend {
    type Output = SimOutput;
    type Input = SimInput;

    fn name(&self) -> &'static str {
        "sim"
    }

    fn open_output(&self, spec: &FrameSpec) -> Result<SimOutput> {
        let mut hw = self.hw.lock();

        if hw.has_fault(SimFault::NoOutputDevice) {
            return Err(Error::NoOutputDevice("simulated device absent".to_string()));
        }
        if hw.has_fault(SimFault::ContextCreation) {
            return Err(Error::ContextCreation(
                "simulated context refused".to_string(),
            ));
        }

        let mut bank = VoiceBank::new(spec.sample_rate);
        if hw.has_fault(SimFault::BufferAllocation) {
            bank.limit_buffers(0);
        }
        if hw.has_fault(SimFault::VoiceAllocation) {
            bank.disable_voices();
        }

        hw.bank = Some(bank);
        hw.outputs_open += 1;
        hw.outputs_opened += 1;
        debug!("Simulated output opened at {} Hz", spec.sample_rate);

        Ok(SimOutput {
            hw: self.hw.clone(),
        })
    }

    fn open_input(&self, spec: &FrameSpec, buffer_secs: f32) -> Result<SimInput> {
        let mut hw = self.hw.lock();

        if hw.has_fault(SimFault::NoInputDevice) {
            return Err(Error::NoInputDevice("simulated microphone absent".to_string()));
        }

        hw.capture_error = None;
        hw.input_capacity =
            (f64::from(spec.sample_rate) * f64::from(buffer_secs)).round() as usize;
        hw.input.clear();
        hw.inputs_open += 1;

        Ok(SimInput {
            hw: self.hw.clone(),
        })
    }
}

/// Simulated output device and context.
#[derive(Debug)]
pub struct SimOutput {
    hw: Arc<Mutex<SimHardware>>,
}

impl SimOutput {
    fn with_bank<T: Default>(&self, f: impl FnOnce(&mut VoiceBank) -> T) -> T {
        self.hw.lock().bank.as_mut().map(f).unwrap_or_default()
    }
}

impl PlaybackDevice for SimOutput {
    fn info(&self) -> DeviceInfo {
        DeviceInfo {
            vendor: "looptap".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            renderer: "simulated voice".to_string(),
            extensions: String::new(),
        }
    }

    fn make_context_current(&mut self, current: bool) {
        let mut hw = self.hw.lock();
        hw.context_switches += 1;
        if let Some(bank) = hw.bank.as_mut() {
            bank.make_context_current(current);
        }
    }

    fn gen_buffers(&mut self, count: usize) -> Vec<BufferHandle> {
        self.with_bank(|bank| bank.gen_buffers(count))
    }

    fn delete_buffers(&mut self, buffers: &[BufferHandle]) {
        self.with_bank(|bank| bank.delete_buffers(buffers));
    }

    fn gen_voice(&mut self) -> Option<VoiceId> {
        self.with_bank(VoiceBank::gen_voice)
    }

    fn delete_voice(&mut self, voice: VoiceId) {
        self.with_bank(|bank| bank.delete_voice(voice));
    }

    fn buffer_data(&mut self, buffer: BufferHandle, samples: &[i16], sample_rate: u32) {
        self.with_bank(|bank| bank.buffer_data(buffer, samples, sample_rate));
    }

    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferHandle]) {
        self.with_bank(|bank| bank.queue_buffers(voice, buffers));
    }

    fn unqueue_buffers(&mut self, voice: VoiceId, out: &mut [BufferHandle]) -> usize {
        self.with_bank(|bank| bank.unqueue_buffers(voice, out))
    }

    fn voice_state(&self, voice: VoiceId) -> VoiceState {
        self.with_bank(|bank| bank.voice_state(voice))
    }

    fn buffers_queued(&self, voice: VoiceId) -> usize {
        self.with_bank(|bank| bank.buffers_queued(voice))
    }

    fn buffers_processed(&self, voice: VoiceId) -> usize {
        self.with_bank(|bank| bank.buffers_processed(voice))
    }

    fn play(&mut self, voice: VoiceId) {
        self.with_bank(|bank| bank.play(voice));
    }

    fn pause(&mut self, voice: VoiceId) {
        self.with_bank(|bank| bank.pause(voice));
    }

    fn stop(&mut self, voice: VoiceId) {
        self.with_bank(|bank| bank.stop(voice));
    }

    fn take_error(&mut self) -> Option<BackendError> {
        let mut hw = self.hw.lock();
        if let Some(error) = hw.injected.pop_front() {
            return Some(error);
        }
        hw.bank.as_mut().and_then(VoiceBank::take_error)
    }
}

impl Drop for SimOutput {
    fn drop(&mut self) {
        let mut hw = self.hw.lock();
        hw.outputs_open -= 1;
        if let Some(bank) = hw.bank.as_mut() {
            bank.make_context_current(false);
        }
        debug!("Simulated output released");
    }
}

/// Simulated microphone.
#[derive(Debug)]
pub struct SimInput {
    hw: Arc<Mutex<SimHardware>>,
}

impl CaptureDevice for SimInput {
    fn start(&mut self) -> Result<()> {
        self.hw.lock().capturing = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.hw.lock().capturing = false;
        Ok(())
    }

    fn available_samples(&self) -> usize {
        self.hw.lock().input.len()
    }

    fn read_into(&mut self, buffer: &mut [i16]) -> Result<()> {
        let mut hw = self.hw.lock();
        let available = hw.input.len();
        if available < buffer.len() {
            return Err(Error::InsufficientSamples {
                available,
                requested: buffer.len(),
            });
        }
        let n = buffer.len();
        for (out, sample) in buffer.iter_mut().zip(hw.input.drain(..n)) {
            *out = sample;
        }
        Ok(())
    }

    fn take_error(&mut self) -> Option<BackendError> {
        self.hw.lock().capture_error.take()
    }
}

impl Drop for SimInput {
    fn drop(&mut self) {
        let mut hw = self.hw.lock();
        hw.capturing = false;
        hw.inputs_open -= 1;
    }
}
