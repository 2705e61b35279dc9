//! Hardware backend using cpal.
//!
//! cpal exposes callback-driven streams rather than queued voices, so the
//! output side runs a [`VoiceBank`] behind a mutex and lets the stream
//! callback drain it. The input side pushes into a lock-free [`SampleRing`].
//!
//! [`SampleRing`]: crate::buffer::SampleRing

use super::bank::VoiceBank;
use super::{
    AudioBackend, BufferHandle, CaptureDevice, DeviceInfo, PlaybackDevice, VoiceId, VoiceState,
};
use crate::buffer::{shared_sample_ring, SharedSampleRing};
use cpal::{
    traits::{DeviceTrait, HostTrait, StreamTrait},
    Device, FromSample, Host, Sample, SampleRate, SizedSample, Stream, StreamConfig,
    StreamError, SupportedStreamConfig, SupportedStreamConfigRange,
};
use looptap_core::{BackendError, Error, FrameSpec, Result};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Samples converted per batch in the capture callback.
const CAPTURE_CHUNK: usize = 256;

/// Audio backend on the platform's default cpal host.
pub struct CpalBackend {
    host: Host,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }
}

impl Default for CpalBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioBackend for CpalBackend {
    type Output = CpalOutput;
    type Input = CpalInput;

    fn name(&self) -> &'static str {
        self.host.id().name()
    }

    fn open_output(&self, spec: &FrameSpec) -> Result<CpalOutput> {
        let device = self
            .host
            .default_output_device()
            .ok_or_else(|| Error::NoOutputDevice("no default output device".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio output device: {device_name}");

        let ranges = device
            .supported_output_configs()
            .map_err(|e| Error::NoOutputDevice(format!("Failed to query output configs: {e}")))?;
        let supported = pick_config(ranges, spec.sample_rate).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{device_name} cannot play 16-bit audio at {} Hz",
                spec.sample_rate
            ))
        })?;

        debug!("Output config: {:?}", supported);

        let bank = Arc::new(Mutex::new(VoiceBank::new(spec.sample_rate)));
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let stream = match sample_format {
            cpal::SampleFormat::I16 => build_output::<i16>(&device, &config, bank.clone()),
            cpal::SampleFormat::F32 => build_output::<f32>(&device, &config, bank.clone()),
            cpal::SampleFormat::U16 => build_output::<u16>(&device, &config, bank.clone()),
            other => {
                return Err(Error::UnsupportedFormat(format!(
                    "Unsupported sample format: {other:?}"
                )));
            }
        }?;

        // The stream runs for the device's whole lifetime; silence is
        // produced whenever the voice is not playing.
        stream
            .play()
            .map_err(|e| Error::ContextCreation(format!("Failed to start stream: {e}")))?;

        let info = DeviceInfo {
            vendor: self.host.id().name().to_string(),
            version: format!(
                "{} Hz, {} channel(s), {sample_format:?}",
                config.sample_rate.0, config.channels
            ),
            renderer: device_name,
            extensions: String::new(),
        };

        Ok(CpalOutput {
            _stream: stream,
            bank,
            info,
        })
    }

    fn open_input(&self, spec: &FrameSpec, buffer_secs: f32) -> Result<CpalInput> {
        let device = self
            .host
            .default_input_device()
            .ok_or_else(|| Error::NoInputDevice("no default input device".to_string()))?;

        let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
        info!("Using audio input device: {device_name}");

        let ranges = device
            .supported_input_configs()
            .map_err(|e| Error::NoInputDevice(format!("Failed to query input configs: {e}")))?;
        let supported = pick_config(ranges, spec.sample_rate).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{device_name} cannot capture 16-bit audio at {} Hz",
                spec.sample_rate
            ))
        })?;

        debug!("Input config: {:?}", supported);

        let capacity = (f64::from(spec.sample_rate) * f64::from(buffer_secs)).round() as usize;
        let ring = shared_sample_ring(capacity);
        let failure = Arc::new(Mutex::new(None));
        let sample_format = supported.sample_format();
        let config: StreamConfig = supported.into();

        let stream = match sample_format {
            cpal::SampleFormat::I16 => {
                build_input::<i16>(&device, &config, ring.clone(), failure.clone())
            }
            cpal::SampleFormat::F32 => {
                build_input::<f32>(&device, &config, ring.clone(), failure.clone())
            }
            cpal::SampleFormat::U16 => {
                build_input::<u16>(&device, &config, ring.clone(), failure.clone())
            }
            other => {
                return Err(Error::UnsupportedFormat(format!(
                    "Unsupported sample format: {other:?}"
                )));
            }
        }?;

        Ok(CpalInput {
            stream,
            ring,
            failure,
        })
    }
}

/// Pick a supported config at exactly `sample_rate`, preferring fewer
/// channels and native 16-bit samples.
fn pick_config(
    ranges: impl Iterator<Item = SupportedStreamConfigRange>,
    sample_rate: u32,
) -> Option<SupportedStreamConfig> {
    let rate = SampleRate(sample_rate);
    ranges
        .filter(|r| r.min_sample_rate() <= rate && rate <= r.max_sample_rate())
        .filter_map(|r| format_rank(r.sample_format()).map(|rank| (r, rank)))
        .min_by_key(|(r, rank)| (r.channels(), *rank))
        .map(|(r, _)| r.with_sample_rate(rate))
}

const fn format_rank(format: cpal::SampleFormat) -> Option<u8> {
    match format {
        cpal::SampleFormat::I16 => Some(0),
        cpal::SampleFormat::F32 => Some(1),
        cpal::SampleFormat::U16 => Some(2),
        _ => None,
    }
}

fn stream_error_code(err: &StreamError) -> BackendError {
    match err {
        StreamError::DeviceNotAvailable => BackendError::DeviceLost,
        _ => BackendError::Unknown(-1),
    }
}

fn build_output<T>(
    device: &Device,
    config: &StreamConfig,
    bank: Arc<Mutex<VoiceBank>>,
) -> Result<Stream>
where
    T: SizedSample + FromSample<i16>,
{
    let channels = usize::from(config.channels.max(1));
    let err_bank = bank.clone();

    let err_fn = move |err: StreamError| {
        error!("Audio output stream error: {err}");
        err_bank.lock().push_error(stream_error_code(&err));
    };

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                let mut bank = bank.lock();
                for frame in data.chunks_mut(channels) {
                    // Mono voice fans out to every device channel.
                    let sample = T::from_sample(bank.next_sample().unwrap_or(0));
                    frame.fill(sample);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::ContextCreation(format!("Failed to build output stream: {e}")))
}

fn build_input<T>(
    device: &Device,
    config: &StreamConfig,
    ring: SharedSampleRing,
    failure: Arc<Mutex<Option<BackendError>>>,
) -> Result<Stream>
where
    T: SizedSample,
    i16: FromSample<T>,
{
    let channels = usize::from(config.channels.max(1));

    // Keep the first failure; later ones are usually fallout from it.
    let err_fn = move |err: StreamError| {
        error!("Audio input stream error: {err}");
        failure.lock().get_or_insert(stream_error_code(&err));
    };

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                let mut scratch = [0i16; CAPTURE_CHUNK];
                let mut filled = 0;
                // Only the first channel is kept.
                for frame in data.chunks(channels) {
                    scratch[filled] = i16::from_sample(frame[0]);
                    filled += 1;
                    if filled == CAPTURE_CHUNK {
                        ring.write(&scratch);
                        filled = 0;
                    }
                }
                ring.write(&scratch[..filled]);
            },
            err_fn,
            None,
        )
        .map_err(|e| Error::NoInputDevice(format!("Failed to build input stream: {e}")))
}

/// Output device, stream, and emulated voice.
pub struct CpalOutput {
    /// Keeps the stream alive for the lifetime of the device.
    _stream: Stream,
    bank: Arc<Mutex<VoiceBank>>,
    info: DeviceInfo,
}

impl PlaybackDevice for CpalOutput {
    fn info(&self) -> DeviceInfo {
        self.info.clone()
    }

    fn make_context_current(&mut self, current: bool) {
        self.bank.lock().make_context_current(current);
    }

    fn gen_buffers(&mut self, count: usize) -> Vec<BufferHandle> {
        self.bank.lock().gen_buffers(count)
    }

    fn delete_buffers(&mut self, buffers: &[BufferHandle]) {
        self.bank.lock().delete_buffers(buffers);
    }

    fn gen_voice(&mut self) -> Option<VoiceId> {
        self.bank.lock().gen_voice()
    }

    fn delete_voice(&mut self, voice: VoiceId) {
        self.bank.lock().delete_voice(voice);
    }

    fn buffer_data(&mut self, buffer: BufferHandle, samples: &[i16], sample_rate: u32) {
        self.bank.lock().buffer_data(buffer, samples, sample_rate);
    }

    fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferHandle]) {
        self.bank.lock().queue_buffers(voice, buffers);
    }

    fn unqueue_buffers(&mut self, voice: VoiceId, out: &mut [BufferHandle]) -> usize {
        self.bank.lock().unqueue_buffers(voice, out)
    }

    fn voice_state(&self, voice: VoiceId) -> VoiceState {
        self.bank.lock().voice_state(voice)
    }

    fn buffers_queued(&self, voice: VoiceId) -> usize {
        self.bank.lock().buffers_queued(voice)
    }

    fn buffers_processed(&self, voice: VoiceId) -> usize {
        self.bank.lock().buffers_processed(voice)
    }

    fn play(&mut self, voice: VoiceId) {
        self.bank.lock().play(voice);
    }

    fn pause(&mut self, voice: VoiceId) {
        self.bank.lock().pause(voice);
    }

    fn stop(&mut self, voice: VoiceId) {
        self.bank.lock().stop(voice);
    }

    fn take_error(&mut self) -> Option<BackendError> {
        self.bank.lock().take_error()
    }
}

impl Drop for CpalOutput {
    fn drop(&mut self) {
        self.bank.lock().make_context_current(false);
        debug!("Audio output released");
    }
}

/// Input device streaming into a lock-free sample ring.
pub struct CpalInput {
    stream: Stream,
    ring: SharedSampleRing,
    /// Set by the stream's error callback.
    failure: Arc<Mutex<Option<BackendError>>>,
}

impl CaptureDevice for CpalInput {
    fn start(&mut self) -> Result<()> {
        self.ring.clear();
        self.stream
            .play()
            .map_err(|e| Error::NoInputDevice(format!("Failed to start capture: {e}")))
    }

    fn stop(&mut self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| Error::NoInputDevice(format!("Failed to stop capture: {e}")))
    }

    fn available_samples(&self) -> usize {
        self.ring.available()
    }

    fn read_into(&mut self, buffer: &mut [i16]) -> Result<()> {
        let available = self.ring.available();
        if available < buffer.len() {
            return Err(Error::InsufficientSamples {
                available,
                requested: buffer.len(),
            });
        }
        self.ring.read(buffer);
        Ok(())
    }

    fn take_error(&mut self) -> Option<BackendError> {
        self.failure.lock().take()
    }
}

impl Drop for CpalInput {
    fn drop(&mut self) {
        if let Err(e) = self.stream.pause() {
            warn!("Failed to pause capture stream on close: {e}");
        }
        let dropped = self.ring.overflowed();
        if dropped > 0 {
            debug!("Capture ring overflowed by {dropped} samples over its lifetime");
        }
    }
}
