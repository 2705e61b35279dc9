//! Buffer management for real-time audio.

pub mod pool;
pub mod ring;

pub use pool::BufferPool;
pub use ring::{shared_sample_ring, SampleRing, SharedSampleRing};
