//! Lock-free ring buffer for captured samples.
//!
//! This buffer is designed for single-producer, single-consumer scenarios
//! where the capture callback writes samples and the drive loop reads them.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use std::sync::atomic::{AtomicI16, AtomicUsize, Ordering};
use std::sync::Arc;

/// Lock-free single-producer, single-consumer ring of 16-bit samples.
///
/// Slots are atomics so neither side ever needs `unsafe` or a lock; the
/// read and write cursors carry the acquire/release ordering.
pub struct SampleRing {
    /// The underlying sample storage.
    slots: Box<[AtomicI16]>,
    /// Current read position.
    read_pos: AtomicUsize,
    /// Current write position.
    write_pos: AtomicUsize,
    /// Samples rejected because the ring was full.
    overflowed: AtomicUsize,
    /// Buffer capacity (power of 2 for efficient modulo).
    capacity: usize,
    /// Mask for efficient modulo (capacity - 1).
    mask: usize,
}

impl SampleRing {
    /// Create a new ring with at least the specified capacity.
    ///
    /// The capacity will be rounded up to the next power of 2.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        let slots = (0..capacity).map(|_| AtomicI16::new(0)).collect();

        Self {
            slots,
            read_pos: AtomicUsize::new(0),
            write_pos: AtomicUsize::new(0),
            overflowed: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
        }
    }

    /// Get the ring capacity.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the number of samples available for reading.
    pub fn available(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Get the number of free slots for writing.
    pub fn free(&self) -> usize {
        self.capacity - self.available()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn is_full(&self) -> bool {
        self.free() == 0
    }

    /// Total samples dropped on overflow since creation.
    pub fn overflowed(&self) -> usize {
        self.overflowed.load(Ordering::Relaxed)
    }

    /// Write samples to the ring, dropping whatever does not fit.
    ///
    /// Returns the number of samples actually written. Producer side only.
    pub fn write(&self, samples: &[i16]) -> usize {
        let write_pos = self.write_pos.load(Ordering::Relaxed);
        let read_pos = self.read_pos.load(Ordering::Acquire);

        let space = self.capacity - write_pos.wrapping_sub(read_pos);
        let to_write = samples.len().min(space);

        for (offset, &sample) in samples[..to_write].iter().enumerate() {
            let idx = write_pos.wrapping_add(offset) & self.mask;
            self.slots[idx].store(sample, Ordering::Relaxed);
        }

        if to_write < samples.len() {
            self.overflowed
                .fetch_add(samples.len() - to_write, Ordering::Relaxed);
        }

        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);

        to_write
    }

    /// Read samples from the ring.
    ///
    /// Returns the number of samples actually read. Consumer side only.
    pub fn read(&self, output: &mut [i16]) -> usize {
        let read_pos = self.read_pos.load(Ordering::Relaxed);
        let write_pos = self.write_pos.load(Ordering::Acquire);

        let available = write_pos.wrapping_sub(read_pos);
        let to_read = output.len().min(available);

        for (offset, out) in output[..to_read].iter_mut().enumerate() {
            let idx = read_pos.wrapping_add(offset) & self.mask;
            *out = self.slots[idx].load(Ordering::Relaxed);
        }

        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);

        to_read
    }

    /// Discard everything currently buffered.
    pub fn clear(&self) {
        let write_pos = self.write_pos.load(Ordering::Acquire);
        self.read_pos.store(write_pos, Ordering::Release);
    }
}

/// Thread-safe reference to a sample ring.
pub type SharedSampleRing = Arc<SampleRing>;

/// Create a new shared sample ring.
pub fn shared_sample_ring(capacity: usize) -> SharedSampleRing {
    Arc::new(SampleRing::new(capacity))
}
