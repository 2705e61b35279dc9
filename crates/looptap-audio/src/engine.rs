//! Double-buffered streaming playback engine.
//!
//! Captured frames are copied into pooled hardware buffers and queued on a
//! single voice. Buffers the hardware has finished with come back through
//! [`PlaybackEngine::recycle`]. Nothing here blocks: when the pool is empty
//! the frame is dropped.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::backend::{AudioBackend, BufferHandle, DeviceInfo, PlaybackDevice, VoiceId, VoiceState};
use crate::buffer::BufferPool;
use crate::diagnostics::{Diagnostic, DiagnosticSink};
use looptap_core::{Error, Frame, FrameSpec, Result};
use std::panic::Location;
use tracing::{debug, info, trace};

/// Backend errors drained per check, so a wedged backend cannot spin us.
const MAX_ERRORS_PER_CHECK: usize = 32;

/// Result of submitting one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The frame was copied into this buffer and queued on the voice.
    Queued(BufferHandle),
    /// No buffer was available (or the engine is shut down).
    Dropped,
}

impl PlayOutcome {
    pub const fn is_queued(self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Counters accumulated over the engine's lifetime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Frames queued for playback.
    pub submitted: u64,
    /// Frames dropped for lack of a free buffer.
    pub dropped: u64,
    /// Buffers returned to the pool.
    pub reclaimed: u64,
    /// Backend error codes observed.
    pub backend_errors: u64,
}

/// Device, voice, and buffers owned by an open engine.
///
/// Releasing happens on drop, so every early return during initialization
/// frees exactly what was acquired.
struct Hardware<D: PlaybackDevice> {
    device: D,
    voice: Option<VoiceId>,
    buffers: Vec<BufferHandle>,
    released: bool,
}

impl<D: PlaybackDevice> Hardware<D> {
    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        self.device.make_context_current(true);
        // Deleting the voice detaches its queue, so buffers can go after it.
        if let Some(voice) = self.voice.take() {
            self.device.delete_voice(voice);
        }
        if !self.buffers.is_empty() {
            self.device.delete_buffers(&self.buffers);
            self.buffers.clear();
        }
        self.device.make_context_current(false);
    }
}

impl<D: PlaybackDevice> Drop for Hardware<D> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Playback engine over one output voice and a fixed buffer pool.
pub struct PlaybackEngine<D: PlaybackDevice> {
    hw: Option<Hardware<D>>,
    pool: BufferPool,
    spec: FrameSpec,
    /// Preallocated destination for unqueued handles.
    scratch: Vec<BufferHandle>,
    sink: Box<dyn DiagnosticSink>,
    stats: EngineStats,
}

impl<D: PlaybackDevice> PlaybackEngine<D> {
    /// Open the output device and allocate the voice plus `capacity` buffers.
    ///
    /// Any failure releases whatever was already acquired; no partially
    /// initialized engine is ever returned.
    pub fn open<B>(
        backend: &B,
        spec: FrameSpec,
        capacity: usize,
        sink: Box<dyn DiagnosticSink>,
    ) -> Result<Self>
    where
        B: AudioBackend<Output = D>,
    {
        let device = backend.open_output(&spec)?;
        let mut hw = Hardware {
            device,
            voice: None,
            buffers: Vec::new(),
            released: false,
        };

        hw.device.make_context_current(true);
        hw.buffers = hw.device.gen_buffers(capacity);
        hw.voice = hw.device.gen_voice();

        let tag = "PlaybackEngine::open";
        let errors = drain_errors(&mut hw.device, sink.as_ref(), tag);
        if hw.voice.is_none() {
            return Err(Error::Allocation { what: "voice" });
        }
        if hw.buffers.len() != capacity {
            return Err(Error::Allocation {
                what: "playback buffers",
            });
        }
        if errors > 0 {
            return Err(Error::Backend { tag, count: errors });
        }

        let pool = BufferPool::new(hw.buffers.clone());
        info!(
            "Playback engine ready on {}: {} buffers of {} samples at {} Hz",
            backend.name(),
            capacity,
            spec.samples,
            spec.sample_rate
        );

        Ok(Self {
            hw: Some(hw),
            pool,
            spec,
            scratch: vec![BufferHandle::new(0); capacity],
            sink,
            stats: EngineStats::default(),
        })
    }

    /// Copy `frame` into a free buffer and queue it, then resume playback.
    ///
    /// An exhausted pool drops the frame rather than waiting.
    pub fn play(&mut self, frame: &Frame) -> Result<PlayOutcome> {
        self.check_frame(frame)?;

        let Some(hw) = self.hw.as_mut() else {
            return Ok(PlayOutcome::Dropped);
        };
        let Some(voice) = hw.voice else {
            return Ok(PlayOutcome::Dropped);
        };

        let outcome = match self.pool.acquire() {
            Some(handle) => {
                let before = hw.device.buffers_queued(voice);
                hw.device
                    .buffer_data(handle, frame.samples(), self.spec.sample_rate);
                hw.device.queue_buffers(voice, &[handle]);

                if hw.device.buffers_queued(voice) > before {
                    PlayOutcome::Queued(handle)
                } else {
                    // The voice refused it; the buffer is still ours.
                    self.pool.release(handle)?;
                    PlayOutcome::Dropped
                }
            }
            None => PlayOutcome::Dropped,
        };

        match outcome {
            PlayOutcome::Queued(handle) => {
                self.stats.submitted += 1;
                trace!("Queued frame in {handle}");
            }
            PlayOutcome::Dropped => {
                self.stats.dropped += 1;
                if self.pool.is_exhausted() {
                    trace!("Dropped frame, all {} buffers in flight", self.pool.in_flight());
                } else {
                    trace!("Dropped frame, voice refused the buffer");
                }
            }
        }

        self.start_if_idle();
        self.check_errors("PlaybackEngine::play");
        Ok(outcome)
    }

    /// Start the voice if it is idle and has something queued.
    pub fn resume(&mut self) {
        self.start_if_idle();
        self.check_errors("PlaybackEngine::resume");
    }

    fn start_if_idle(&mut self) {
        let Some((device, voice)) = self.live() else {
            return;
        };

        if device.voice_state(voice) == VoiceState::Playing {
            return;
        }

        let queued = device.buffers_queued(voice);
        if queued != 0 {
            device.play(voice);
            debug!("Voice started with {queued} buffer(s) queued");
        }
    }

    pub fn pause(&mut self) {
        if let Some((device, voice)) = self.live() {
            if device.voice_state(voice) == VoiceState::Playing {
                device.pause(voice);
                debug!("Voice paused");
            }
        }
        self.check_errors("PlaybackEngine::pause");
    }

    /// Stop the voice. Queued buffers stay queued and come back through
    /// [`recycle`](Self::recycle).
    pub fn stop(&mut self) {
        if let Some((device, voice)) = self.live() {
            if device.voice_state(voice) == VoiceState::Playing {
                device.stop(voice);
                debug!("Voice stopped");
            }
        }
        self.check_errors("PlaybackEngine::stop");
    }

    /// Return every processed buffer to the pool.
    ///
    /// Returns how many buffers were reclaimed.
    pub fn recycle(&mut self) -> Result<usize> {
        let Some(hw) = self.hw.as_mut() else {
            return Ok(0);
        };
        let Some(voice) = hw.voice else {
            return Ok(0);
        };

        let processed = hw.device.buffers_processed(voice).min(self.scratch.len());
        let mut reclaimed = 0;
        if processed > 0 {
            reclaimed = hw
                .device
                .unqueue_buffers(voice, &mut self.scratch[..processed]);
            for &handle in &self.scratch[..reclaimed] {
                self.pool.release(handle)?;
            }
            self.stats.reclaimed += reclaimed as u64;
            trace!("Reclaimed {reclaimed} buffer(s)");
        }

        self.check_errors("PlaybackEngine::recycle");
        Ok(reclaimed)
    }

    pub fn is_playing(&self) -> bool {
        self.state() == VoiceState::Playing
    }

    /// Current voice state; `Stopped` once shut down.
    pub fn state(&self) -> VoiceState {
        self.live_ref()
            .map_or(VoiceState::Stopped, |(device, voice)| device.voice_state(voice))
    }

    /// Buffers on the voice's queue.
    pub fn queued_buffers(&self) -> usize {
        self.live_ref()
            .map_or(0, |(device, voice)| device.buffers_queued(voice))
    }

    pub fn free_buffers(&self) -> usize {
        self.pool.free_len()
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub const fn spec(&self) -> &FrameSpec {
        &self.spec
    }

    pub const fn stats(&self) -> EngineStats {
        self.stats
    }

    pub const fn is_open(&self) -> bool {
        self.hw.is_some()
    }

    pub fn info(&self) -> Option<DeviceInfo> {
        self.hw.as_ref().map(|hw| hw.device.info())
    }

    /// Drain and report pending backend errors.
    ///
    /// Returns true if any were pending.
    #[track_caller]
    pub fn check_errors(&mut self, tag: &'static str) -> bool {
        let Some(hw) = self.hw.as_mut() else {
            return false;
        };
        let count = drain_errors(&mut hw.device, self.sink.as_ref(), tag);
        self.stats.backend_errors += count as u64;
        count > 0
    }

    /// Release the voice, the buffers, the context, and the device.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        let Some(mut hw) = self.hw.take() else {
            return;
        };

        hw.release();
        drain_errors(&mut hw.device, self.sink.as_ref(), "PlaybackEngine::shutdown");
        self.pool = BufferPool::new(Vec::new());
        drop(hw);

        info!(
            "Playback engine shut down ({} queued, {} dropped, {} reclaimed)",
            self.stats.submitted, self.stats.dropped, self.stats.reclaimed
        );
    }

    fn check_frame(&self, frame: &Frame) -> Result<()> {
        if frame.len() != self.spec.samples {
            return Err(Error::FrameSize {
                expected: self.spec.samples,
                actual: frame.len(),
            });
        }
        if frame.spec().sample_rate != self.spec.sample_rate {
            return Err(Error::UnsupportedFormat(format!(
                "frame at {} Hz, engine at {} Hz",
                frame.spec().sample_rate,
                self.spec.sample_rate
            )));
        }
        Ok(())
    }

    fn live(&mut self) -> Option<(&mut D, VoiceId)> {
        let hw = self.hw.as_mut()?;
        let voice = hw.voice?;
        Some((&mut hw.device, voice))
    }

    fn live_ref(&self) -> Option<(&D, VoiceId)> {
        let hw = self.hw.as_ref()?;
        let voice = hw.voice?;
        Some((&hw.device, voice))
    }
}

impl<D: PlaybackDevice> Drop for PlaybackEngine<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[track_caller]
fn drain_errors<D: PlaybackDevice>(
    device: &mut D,
    sink: &dyn DiagnosticSink,
    tag: &'static str,
) -> usize {
    let location = Location::caller();
    let mut count = 0;
    while count < MAX_ERRORS_PER_CHECK {
        let Some(error) = device.take_error() else {
            break;
        };
        sink.report(&Diagnostic::new(tag, location, error));
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{SimBackend, SimFault, SimOutput};
    use crate::diagnostics::MemorySink;
    use looptap_core::BackendError;
    use proptest::prelude::*;

    const CAPACITY: usize = 32;

    fn spec() -> FrameSpec {
        FrameSpec::new(44100, 512)
    }

    fn sine_frame(freq: f64) -> Frame {
        let spec = spec();
        let samples = (0..spec.samples)
            .map(|i| {
                let t = i as f64 / f64::from(spec.sample_rate);
                ((2.0 * std::f64::consts::PI * freq * t).sin() * 16000.0) as i16
            })
            .collect();
        Frame::from_samples(spec, samples).unwrap()
    }

    fn open(backend: &SimBackend) -> (PlaybackEngine<SimOutput>, MemorySink) {
        let sink = MemorySink::new();
        let engine =
            PlaybackEngine::open(backend, spec(), CAPACITY, Box::new(sink.clone())).unwrap();
        (engine, sink)
    }

    #[test]
    fn test_open_allocates_everything() {
        let backend = SimBackend::new();
        let (engine, sink) = open(&backend);

        assert!(engine.is_open());
        assert_eq!(engine.capacity(), CAPACITY);
        assert_eq!(engine.free_buffers(), CAPACITY);
        assert_eq!(engine.queued_buffers(), 0);
        assert_eq!(engine.state(), VoiceState::Stopped);
        assert_eq!(backend.live_buffers(), CAPACITY);
        assert!(backend.has_voice());
        assert!(backend.context_current());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_open_without_output_device() {
        let backend = SimBackend::new().with_fault(SimFault::NoOutputDevice);
        let result = PlaybackEngine::open(&backend, spec(), CAPACITY, Box::new(MemorySink::new()));

        let err = result.err().unwrap();
        assert!(err.is_initialization_failure());
        assert_eq!(backend.outputs_open(), 0);
    }

    #[test]
    fn test_open_context_failure() {
        let backend = SimBackend::new().with_fault(SimFault::ContextCreation);
        let result = PlaybackEngine::open(&backend, spec(), CAPACITY, Box::new(MemorySink::new()));

        let err = result.err().unwrap();
        assert!(matches!(err, Error::ContextCreation(_)));
        assert!(err.is_initialization_failure());
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_open_buffer_failure_releases_partial_state() {
        let backend = SimBackend::new().with_fault(SimFault::BufferAllocation);
        let sink = MemorySink::new();
        let result = PlaybackEngine::open(&backend, spec(), CAPACITY, Box::new(sink.clone()));

        assert!(matches!(result, Err(Error::Allocation { .. })));
        assert_eq!(backend.outputs_opened(), 1);
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
        assert!(!backend.has_voice());
        assert_eq!(sink.records()[0].error, BackendError::OutOfMemory);
        assert_eq!(sink.records()[0].tag, "PlaybackEngine::open");
    }

    #[test]
    fn test_open_voice_failure_releases_buffers() {
        let backend = SimBackend::new().with_fault(SimFault::VoiceAllocation);
        let result = PlaybackEngine::open(&backend, spec(), CAPACITY, Box::new(MemorySink::new()));

        assert!(matches!(result, Err(Error::Allocation { what: "voice" })));
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_open_fails_on_backend_error() {
        let backend = SimBackend::new();
        backend.inject_error(BackendError::InvalidValue);
        let result = PlaybackEngine::open(&backend, spec(), CAPACITY, Box::new(MemorySink::new()));

        assert!(matches!(
            result,
            Err(Error::Backend {
                tag: "PlaybackEngine::open",
                count: 1
            })
        ));
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_play_queues_and_starts_voice() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);

        let outcome = engine.play(&sine_frame(440.0)).unwrap();
        assert!(outcome.is_queued());
        assert_eq!(engine.queued_buffers(), 1);
        assert_eq!(engine.free_buffers(), CAPACITY - 1);
        assert!(engine.is_playing());
        assert_eq!(engine.stats().submitted, 1);
    }

    #[test]
    fn test_round_trip_frame_fidelity() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        let frame = sine_frame(440.0);

        let PlayOutcome::Queued(handle) = engine.play(&frame).unwrap() else {
            panic!("frame was not queued");
        };
        let free_before = engine.free_buffers();

        assert_eq!(backend.consume(1), 1);
        assert_eq!(backend.played(), frame.samples());

        assert_eq!(engine.recycle().unwrap(), 1);
        assert_eq!(engine.free_buffers(), free_before + 1);
        assert_eq!(engine.queued_buffers(), 0);
        assert_eq!(engine.stats().reclaimed, 1);

        // The reclaimed handle went to the tail of the free-list.
        for _ in 0..CAPACITY - 1 {
            engine.play(&frame).unwrap();
        }
        assert_eq!(engine.play(&frame).unwrap(), PlayOutcome::Queued(handle));
    }

    #[test]
    fn test_frames_play_in_submission_order() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        let frames = [sine_frame(220.0), sine_frame(440.0), sine_frame(880.0)];

        for frame in &frames {
            engine.play(frame).unwrap();
        }
        assert_eq!(backend.consume(3), 3);

        let expected: Vec<i16> = frames.iter().flat_map(|f| f.samples().to_vec()).collect();
        assert_eq!(backend.played(), expected);
    }

    #[test]
    fn test_backpressure_when_exhausted() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        let frame = sine_frame(440.0);

        for _ in 0..CAPACITY {
            assert!(engine.play(&frame).unwrap().is_queued());
        }
        assert_eq!(engine.free_buffers(), 0);

        assert_eq!(engine.play(&frame).unwrap(), PlayOutcome::Dropped);
        assert_eq!(engine.queued_buffers(), CAPACITY);
        assert_eq!(engine.stats().dropped, 1);
    }

    #[test]
    fn test_sustained_overload() {
        let backend = SimBackend::new();
        let (mut engine, sink) = open(&backend);
        let frame = sine_frame(440.0);

        let queued = (0..40)
            .map(|_| engine.play(&frame).unwrap())
            .filter(|outcome| outcome.is_queued())
            .count();

        assert_eq!(queued, 32);
        assert_eq!(engine.stats().dropped, 8);
        assert_eq!(engine.queued_buffers(), 32);
        assert_eq!(engine.free_buffers(), 0);
        assert!(engine.is_playing());
        assert!(sink.is_empty());
    }

    #[test]
    fn test_resume_reports_backend_errors() {
        let backend = SimBackend::new();
        let (mut engine, sink) = open(&backend);

        backend.inject_error(BackendError::InvalidName);
        engine.resume();

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, "PlaybackEngine::resume");
        assert_eq!(engine.stats().backend_errors, 1);
    }

    #[test]
    fn test_resume_with_nothing_queued() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);

        engine.resume();
        assert_eq!(engine.state(), VoiceState::Stopped);
        assert!(!engine.is_playing());
    }

    #[test]
    fn test_pause_and_resume() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        engine.play(&sine_frame(440.0)).unwrap();

        engine.pause();
        assert_eq!(engine.state(), VoiceState::Paused);
        engine.pause();
        assert_eq!(engine.state(), VoiceState::Paused);

        engine.resume();
        assert!(engine.is_playing());
    }

    #[test]
    fn test_stop_keeps_buffers_until_recycled() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        let frame = sine_frame(440.0);
        for _ in 0..3 {
            engine.play(&frame).unwrap();
        }

        engine.stop();
        assert_eq!(engine.state(), VoiceState::Stopped);
        assert_eq!(engine.queued_buffers(), 3);
        assert_eq!(engine.free_buffers(), CAPACITY - 3);

        assert_eq!(engine.recycle().unwrap(), 3);
        assert_eq!(engine.free_buffers(), CAPACITY);
    }

    #[test]
    fn test_stop_when_not_playing_is_noop() {
        let backend = SimBackend::new();
        let (mut engine, sink) = open(&backend);
        engine.stop();
        engine.pause();
        assert_eq!(engine.state(), VoiceState::Stopped);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_underrun_then_restart() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        let frame = sine_frame(440.0);
        engine.play(&frame).unwrap();
        engine.play(&frame).unwrap();

        assert_eq!(backend.consume(5), 2);
        assert!(!engine.is_playing());

        assert_eq!(engine.recycle().unwrap(), 2);
        engine.play(&frame).unwrap();
        assert!(engine.is_playing());
        assert_eq!(engine.queued_buffers(), 1);
    }

    #[test]
    fn test_recycle_with_nothing_processed() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        engine.play(&sine_frame(440.0)).unwrap();
        assert_eq!(engine.recycle().unwrap(), 0);
        assert_eq!(engine.free_buffers(), CAPACITY - 1);
    }

    #[test]
    fn test_backend_errors_are_reported_not_fatal() {
        let backend = SimBackend::new();
        let (mut engine, sink) = open(&backend);

        backend.inject_error(BackendError::InvalidEnum);
        assert!(engine.play(&sine_frame(440.0)).unwrap().is_queued());

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].tag, "PlaybackEngine::play");
        assert_eq!(records[0].error, BackendError::InvalidEnum);
        assert!(records[0].file.ends_with("engine.rs"));
        assert_eq!(engine.stats().backend_errors, 1);
    }

    #[test]
    fn test_error_drain_is_bounded() {
        let backend = SimBackend::new();
        let (mut engine, sink) = open(&backend);

        for _ in 0..40 {
            backend.inject_error(BackendError::Unknown(9));
        }
        assert!(engine.check_errors("test"));
        assert_eq!(sink.len(), 32);
        assert!(engine.check_errors("test"));
        assert_eq!(sink.len(), 40);
        assert!(!engine.check_errors("test"));
    }

    #[test]
    fn test_wrong_frame_size_rejected() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        let short = Frame::silent(FrameSpec::new(44100, 256));

        assert!(matches!(
            engine.play(&short),
            Err(Error::FrameSize {
                expected: 512,
                actual: 256
            })
        ));
        assert_eq!(engine.free_buffers(), CAPACITY);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let backend = SimBackend::new();
        let (mut engine, sink) = open(&backend);
        engine.play(&sine_frame(440.0)).unwrap();

        engine.shutdown();
        engine.shutdown();

        assert!(!engine.is_open());
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
        assert!(!backend.has_voice());
        assert!(sink.is_empty());

        assert_eq!(engine.play(&sine_frame(440.0)).unwrap(), PlayOutcome::Dropped);
        assert!(!engine.is_playing());
        assert_eq!(engine.recycle().unwrap(), 0);

        drop(engine);
        assert_eq!(backend.outputs_open(), 0);
    }

    #[test]
    fn test_shutdown_binds_context_once() {
        let backend = SimBackend::new();
        let (mut engine, _) = open(&backend);
        let after_open = backend.context_switches();

        engine.shutdown();
        assert_eq!(backend.context_switches(), after_open + 2);
        assert!(!backend.context_current());

        drop(engine);
        assert_eq!(backend.context_switches(), after_open + 2);
    }

    proptest! {
        #[test]
        fn prop_engine_conserves_buffers(ops in proptest::collection::vec(0u8..7, 0..300)) {
            let backend = SimBackend::new();
            let (mut engine, sink) = open(&backend);
            let frame = sine_frame(440.0);

            for op in ops {
                match op {
                    0 | 1 => {
                        engine.play(&frame).unwrap();
                    }
                    2 => {
                        backend.consume(1);
                    }
                    3 => {
                        engine.recycle().unwrap();
                    }
                    4 => engine.stop(),
                    5 => engine.pause(),
                    _ => engine.resume(),
                }
                prop_assert_eq!(engine.free_buffers() + engine.queued_buffers(), CAPACITY);
            }

            prop_assert!(sink.is_empty());
            prop_assert_eq!(engine.stats().backend_errors, 0);
        }
    }
}
