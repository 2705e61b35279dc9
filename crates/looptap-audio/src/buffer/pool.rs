//! Fixed-capacity pool of hardware buffers with a FIFO free-list.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use crate::backend::BufferHandle;
use looptap_core::PoolError;
use std::collections::VecDeque;

/// Arena of preallocated buffer handles.
///
/// Handles are stored once in `slots`; the free-list holds slot indices in
/// release order. Neither collection grows after construction, so acquire and
/// release never allocate.
#[derive(Debug)]
pub struct BufferPool {
    slots: Box<[BufferHandle]>,
    free: VecDeque<usize>,
    is_free: Box<[bool]>,
}

impl BufferPool {
    /// Create a pool owning `handles`, all initially free in the given order.
    pub fn new(handles: Vec<BufferHandle>) -> Self {
        let capacity = handles.len();
        let mut free = VecDeque::with_capacity(capacity);
        free.extend(0..capacity);

        Self {
            slots: handles.into_boxed_slice(),
            free,
            is_free: vec![true; capacity].into_boxed_slice(),
        }
    }

    /// Total handles owned by the pool.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Handles currently available for reuse.
    pub fn free_len(&self) -> usize {
        self.free.len()
    }

    /// Handles handed out and not yet released.
    pub fn in_flight(&self) -> usize {
        self.capacity() - self.free_len()
    }

    /// True when every handle is in flight.
    pub fn is_exhausted(&self) -> bool {
        self.free.is_empty()
    }

    /// Take the oldest free handle, or `None` when the pool is exhausted.
    pub fn acquire(&mut self) -> Option<BufferHandle> {
        let slot = self.free.pop_front()?;
        self.is_free[slot] = false;
        Some(self.slots[slot])
    }

    /// Return a handle to the tail of the free-list.
    pub fn release(&mut self, handle: BufferHandle) -> Result<(), PoolError> {
        let slot = self
            .slot_of(handle)
            .ok_or(PoolError::UnknownHandle { id: handle.id() })?;

        if self.is_free[slot] {
            return Err(PoolError::DoubleRelease { id: handle.id() });
        }

        self.is_free[slot] = true;
        self.free.push_back(slot);
        Ok(())
    }

    fn slot_of(&self, handle: BufferHandle) -> Option<usize> {
        self.slots.iter().position(|&h| h == handle)
    }
}
