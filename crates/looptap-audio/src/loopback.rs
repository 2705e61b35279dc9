//! Drive loop feeding captured frames to the playback engine.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::backend::{AudioBackend, CaptureDevice, PlaybackDevice};
use crate::diagnostics::DiagnosticSink;
use crate::engine::{PlayOutcome, PlaybackEngine};
use looptap_core::{Config, Error, Frame, Result};
use tracing::{info, warn};

/// Receives every frame that went through a capture-and-play cycle.
pub trait FrameSink {
    fn on_frame(&mut self, frame: &Frame);
}

impl<F: FnMut(&Frame)> FrameSink for F {
    fn on_frame(&mut self, frame: &Frame) {
        self(frame);
    }
}

/// What one tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Frames queued for playback.
    pub frames_played: usize,
    /// Frames dropped because the pool was exhausted.
    pub frames_dropped: usize,
    /// Frames captured and thrown away while muted.
    pub frames_discarded: usize,
    /// Buffers returned to the pool.
    pub reclaimed: usize,
}

impl TickReport {
    pub const fn frames(&self) -> usize {
        self.frames_played + self.frames_dropped + self.frames_discarded
    }
}

/// Capture device, playback engine, and the frame shuttling between them.
pub struct Loopback<O: PlaybackDevice, I: CaptureDevice> {
    engine: PlaybackEngine<O>,
    capture: Option<I>,
    frame: Frame,
    muted: bool,
}

impl<O: PlaybackDevice, I: CaptureDevice> Loopback<O, I> {
    /// Open playback first, then capture, and start capturing.
    pub fn open<B>(backend: &B, config: &Config, sink: Box<dyn DiagnosticSink>) -> Result<Self>
    where
        B: AudioBackend<Output = O, Input = I>,
    {
        let spec = config.frame_spec();
        let engine = PlaybackEngine::open(backend, spec, config.pool_capacity, sink)?;

        if let Some(device) = engine.info() {
            info!("Output vendor = {}", device.vendor);
            info!("Output version = {}", device.version);
            info!("Output renderer = {}", device.renderer);
            info!("Output extensions = {}", device.extensions);
        }

        let mut capture = backend.open_input(&spec, config.capture_buffer_secs)?;
        capture.start()?;

        Ok(Self::from_parts(engine, capture, config.start_muted))
    }

    /// Assemble from an open engine and a started capture device.
    pub fn from_parts(engine: PlaybackEngine<O>, capture: I, muted: bool) -> Self {
        let frame = Frame::silent(*engine.spec());
        Self {
            engine,
            capture: Some(capture),
            frame,
            muted,
        }
    }

    /// Move every complete frame from capture to playback.
    ///
    /// Each frame is preceded by a recycle pass. Muted ticks still recycle
    /// but discard what was captured. A failed capture device ends the
    /// loop with [`Error::Capture`].
    pub fn tick<S: FrameSink>(&mut self, sink: &mut S) -> Result<TickReport> {
        let mut report = TickReport::default();
        let Some(capture) = self.capture.as_mut() else {
            return Ok(report);
        };

        if let Some(error) = capture.take_error() {
            warn!("Capture device failed: {error}");
            return Err(Error::Capture(error));
        }

        while capture.available_samples() > self.frame.len() {
            capture.read_into(self.frame.samples_mut())?;
            report.reclaimed += self.engine.recycle()?;

            if self.muted {
                report.frames_discarded += 1;
                continue;
            }

            match self.engine.play(&self.frame)? {
                PlayOutcome::Queued(_) => report.frames_played += 1,
                PlayOutcome::Dropped => report.frames_dropped += 1,
            }
            sink.on_frame(&self.frame);
        }

        if report.frames() == 0 {
            report.reclaimed += self.engine.recycle()?;
        }

        Ok(report)
    }

    /// Flip the mute flag and return the new value.
    pub fn toggle_mute(&mut self) -> bool {
        self.muted = !self.muted;
        info!("mute: {}", self.muted);
        self.muted
    }

    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    pub const fn engine(&self) -> &PlaybackEngine<O> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PlaybackEngine<O> {
        &mut self.engine
    }

    /// The most recently captured frame.
    pub const fn frame(&self) -> &Frame {
        &self.frame
    }

    /// Stop and close capture, then tear down playback. Safe to repeat.
    pub fn shutdown(&mut self) {
        if let Some(mut capture) = self.capture.take() {
            if let Err(e) = capture.stop() {
                warn!("Failed to stop capture: {e}");
            }
        }
        self.engine.shutdown();
    }
}

impl<O: PlaybackDevice, I: CaptureDevice> Drop for Loopback<O, I> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::sim::{SimBackend, SimFault, SimInput, SimOutput};
    use crate::diagnostics::MemorySink;
    use looptap_core::BackendError;

    fn config() -> Config {
        Config {
            sample_rate: 8000,
            frame_samples: 64,
            capture_buffer_secs: 0.5,
            ..Config::default()
        }
    }

    fn open(backend: &SimBackend, config: &Config) -> Loopback<SimOutput, SimInput> {
        Loopback::open(backend, config, Box::new(MemorySink::new())).unwrap()
    }

    fn ramp(len: usize, start: i16) -> Vec<i16> {
        (0..len).map(|i| start.wrapping_add(i as i16)).collect()
    }

    #[test]
    fn test_open_starts_capture() {
        let backend = SimBackend::new();
        let loopback = open(&backend, &config());
        assert!(backend.is_capturing());
        assert_eq!(backend.inputs_open(), 1);
        assert_eq!(backend.outputs_open(), 1);
        assert!(!loopback.is_muted());
    }

    #[test]
    fn test_missing_input_releases_output() {
        let backend = SimBackend::new().with_fault(SimFault::NoInputDevice);
        let result = Loopback::open(&backend, &config(), Box::new(MemorySink::new()));

        assert!(matches!(result, Err(Error::NoInputDevice(_))));
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_tick_needs_more_than_one_frame() {
        let backend = SimBackend::new();
        let mut loopback = open(&backend, &config());
        let mut frames = 0;

        backend.push_input(&ramp(64, 0));
        let report = loopback.tick(&mut |_: &Frame| frames += 1).unwrap();
        assert_eq!(report.frames(), 0);

        backend.push_input(&ramp(1, 64));
        let report = loopback.tick(&mut |_: &Frame| frames += 1).unwrap();
        assert_eq!(report.frames_played, 1);
        assert_eq!(frames, 1);
    }

    #[test]
    fn test_tick_plays_captured_audio_in_order() {
        let backend = SimBackend::new();
        let mut loopback = open(&backend, &config());
        let input = ramp(64 * 3 + 1, 100);
        backend.push_input(&input);

        let mut seen = Vec::new();
        let report = loopback
            .tick(&mut |f: &Frame| seen.push(f.samples()[0]))
            .unwrap();

        assert_eq!(report.frames_played, 3);
        assert_eq!(seen, vec![100, 164, 228]);
        assert!(loopback.engine().is_playing());

        assert_eq!(backend.consume(3), 3);
        assert_eq!(backend.played(), &input[..192]);
        assert_eq!(loopback.frame().samples(), &input[128..192]);
    }

    #[test]
    fn test_tick_recycles_before_each_play() {
        let backend = SimBackend::new();
        let mut loopback = open(&backend, &config());

        backend.push_input(&ramp(65, 0));
        loopback.tick(&mut |_: &Frame| {}).unwrap();
        backend.consume(1);

        backend.push_input(&ramp(64, 0));
        let report = loopback.tick(&mut |_: &Frame| {}).unwrap();
        assert_eq!(report.reclaimed, 1);
        assert_eq!(report.frames_played, 1);
        assert_eq!(loopback.engine().free_buffers(), 31);
    }

    #[test]
    fn test_muted_tick_discards_and_still_recycles() {
        let backend = SimBackend::new();
        let mut loopback = open(&backend, &config());

        backend.push_input(&ramp(65, 0));
        loopback.tick(&mut |_: &Frame| {}).unwrap();
        backend.consume(1);

        assert!(loopback.toggle_mute());
        let report = loopback.tick(&mut |_: &Frame| {}).unwrap();
        assert_eq!(report.frames(), 0);
        assert_eq!(report.reclaimed, 1);

        backend.push_input(&ramp(128, 0));
        let mut rendered = 0;
        let report = loopback.tick(&mut |_: &Frame| rendered += 1).unwrap();
        assert_eq!(report.frames_discarded, 2);
        assert_eq!(rendered, 0);
        assert_eq!(loopback.engine().queued_buffers(), 0);

        assert!(!loopback.toggle_mute());
    }

    #[test]
    fn test_start_muted() {
        let backend = SimBackend::new();
        let config = Config {
            start_muted: true,
            ..config()
        };
        let loopback = open(&backend, &config);
        assert!(loopback.is_muted());
    }

    #[test]
    fn test_tick_drops_when_pool_exhausted() {
        let backend = SimBackend::new();
        let config = Config {
            pool_capacity: 4,
            ..config()
        };
        let mut loopback = open(&backend, &config);

        backend.push_input(&ramp(64 * 6 + 1, 0));
        let mut rendered = 0;
        let report = loopback.tick(&mut |_: &Frame| rendered += 1).unwrap();
        assert_eq!(report.frames_played, 4);
        assert_eq!(report.frames_dropped, 2);
        assert_eq!(rendered, 6);
    }

    #[test]
    fn test_lost_microphone_ends_tick() {
        let backend = SimBackend::new();
        let mut loopback = open(&backend, &config());
        backend.push_input(&ramp(65, 0));
        loopback.tick(&mut |_: &Frame| {}).unwrap();

        backend.fail_capture(BackendError::DeviceLost);
        let result = loopback.tick(&mut |_: &Frame| {});
        assert!(matches!(result, Err(Error::Capture(BackendError::DeviceLost))));
        assert!(!result.unwrap_err().is_initialization_failure());

        loopback.shutdown();
        assert_eq!(backend.inputs_open(), 0);
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
    }

    #[test]
    fn test_shutdown_releases_everything() {
        let backend = SimBackend::new();
        let mut loopback = open(&backend, &config());
        backend.push_input(&ramp(65, 0));
        loopback.tick(&mut |_: &Frame| {}).unwrap();

        loopback.shutdown();
        loopback.shutdown();
        assert_eq!(backend.inputs_open(), 0);
        assert_eq!(backend.outputs_open(), 0);
        assert_eq!(backend.live_buffers(), 0);
        assert!(!backend.is_capturing());

        assert_eq!(loopback.tick(&mut |_: &Frame| {}).unwrap(), TickReport::default());
    }
}
