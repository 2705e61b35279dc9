//! Frame format types shared by capture, playback, and rendering.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Sample encoding exchanged across the frame boundary.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SampleFormat {
    /// Signed 16-bit mono.
    #[default]
    Mono16,
}

impl SampleFormat {
    /// Size of one sample frame in bytes.
    pub const fn bytes_per_sample(self) -> usize {
        match self {
            Self::Mono16 => 2,
        }
    }
}

/// Fixed contract every collaborator exchanging frames must match.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FrameSpec {
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Samples per frame.
    pub samples: usize,
    /// Sample encoding.
    pub format: SampleFormat,
}

impl FrameSpec {
    pub const fn new(sample_rate: u32, samples: usize) -> Self {
        Self {
            sample_rate,
            samples,
            format: SampleFormat::Mono16,
        }
    }

    /// Size of one frame in bytes.
    pub const fn bytes(&self) -> usize {
        self.samples * self.format.bytes_per_sample()
    }

    /// Wall-clock length of one frame.
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples as f64 / f64::from(self.sample_rate))
    }
}

impl Default for FrameSpec {
    fn default() -> Self {
        Self::new(44100, 512)
    }
}

/// One fixed-length chunk of captured audio.
///
/// The drive loop allocates a single frame up front and refills it every
/// cycle, so steady-state capture never allocates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    spec: FrameSpec,
    samples: Box<[i16]>,
}

impl Frame {
    /// Create a silent frame for the given spec.
    pub fn silent(spec: FrameSpec) -> Self {
        Self {
            spec,
            samples: vec![0i16; spec.samples].into_boxed_slice(),
        }
    }

    /// Wrap existing samples, checking they match the spec's length.
    pub fn from_samples(spec: FrameSpec, samples: Vec<i16>) -> Result<Self> {
        if samples.len() != spec.samples {
            return Err(Error::FrameSize {
                expected: spec.samples,
                actual: samples.len(),
            });
        }
        Ok(Self {
            spec,
            samples: samples.into_boxed_slice(),
        })
    }

    pub const fn spec(&self) -> &FrameSpec {
        &self.spec
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn samples_mut(&mut self) -> &mut [i16] {
        &mut self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value, normalized to 0.0..=1.0.
    pub fn peak(&self) -> f32 {
        let max = self
            .samples
            .iter()
            .map(|s| s.unsigned_abs())
            .max()
            .unwrap_or(0);
        f32::from(max) / 32768.0
    }
}
