//! Software model of a queued playback voice and its buffers.
//!
//! Both backends keep one of these behind a mutex: the cpal output callback
//! pulls samples from it, the simulated backend consumes whole buffers on
//! request.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use super::{BufferHandle, VoiceId, VoiceState};
use looptap_core::BackendError;
use std::collections::{HashMap, VecDeque};

/// Pending error codes kept before the oldest are discarded.
const MAX_PENDING_ERRORS: usize = 64;

#[derive(Debug, Default)]
struct Voice {
    id: u32,
    queue: VecDeque<u32>,
    processed: usize,
    cursor: usize,
    state: VoiceState,
}

impl Voice {
    fn pending(&self) -> usize {
        self.queue.len() - self.processed
    }
}

#[derive(Debug)]
pub(crate) struct VoiceBank {
    sample_rate: u32,
    context_current: bool,
    next_id: u32,
    buffers: HashMap<u32, Vec<i16>>,
    voice: Option<Voice>,
    errors: VecDeque<BackendError>,
    /// Most buffers that may be alive at once.
    buffer_limit: usize,
    /// Whether a voice may be allocated at all.
    voice_available: bool,
}

impl VoiceBank {
    pub(crate) fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            context_current: false,
            next_id: 1,
            buffers: HashMap::new(),
            voice: None,
            errors: VecDeque::new(),
            buffer_limit: usize::MAX,
            voice_available: true,
        }
    }

    pub(crate) fn limit_buffers(&mut self, limit: usize) {
        self.buffer_limit = limit;
    }

    pub(crate) fn disable_voices(&mut self) {
        self.voice_available = false;
    }

    pub(crate) const fn context_current(&self) -> bool {
        self.context_current
    }

    pub(crate) fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub(crate) const fn has_voice(&self) -> bool {
        self.voice.is_some()
    }

    pub(crate) fn push_error(&mut self, error: BackendError) {
        if self.errors.len() == MAX_PENDING_ERRORS {
            self.errors.pop_front();
        }
        self.errors.push_back(error);
    }

    pub(crate) fn take_error(&mut self) -> Option<BackendError> {
        self.errors.pop_front()
    }

    pub(crate) fn make_context_current(&mut self, current: bool) {
        self.context_current = current;
    }

    /// Records `InvalidOperation` when no context is bound.
    fn require_context(&mut self) -> bool {
        if !self.context_current {
            self.push_error(BackendError::InvalidOperation);
        }
        self.context_current
    }

    fn voice_mut(&mut self, id: VoiceId) -> Option<&mut Voice> {
        if self.voice_ref(id).is_some() {
            self.voice.as_mut()
        } else {
            self.push_error(BackendError::InvalidName);
            None
        }
    }

    fn voice_ref(&self, id: VoiceId) -> Option<&Voice> {
        self.voice.as_ref().filter(|voice| voice.id == id.id())
    }

    fn is_queued(&self, id: u32) -> bool {
        self.voice
            .as_ref()
            .is_some_and(|voice| voice.queue.contains(&id))
    }

    pub(crate) fn gen_buffers(&mut self, count: usize) -> Vec<BufferHandle> {
        if !self.require_context() {
            return Vec::new();
        }

        let room = self.buffer_limit.saturating_sub(self.buffers.len());
        if room < count {
            self.push_error(BackendError::OutOfMemory);
            return Vec::new();
        }

        (0..count)
            .map(|_| {
                let id = self.next_id;
                self.next_id += 1;
                self.buffers.insert(id, Vec::new());
                BufferHandle::new(id)
            })
            .collect()
    }

    pub(crate) fn delete_buffers(&mut self, buffers: &[BufferHandle]) {
        if !self.require_context() {
            return;
        }

        if buffers.iter().any(|b| !self.buffers.contains_key(&b.id())) {
            self.push_error(BackendError::InvalidName);
            return;
        }
        if buffers.iter().any(|b| self.is_queued(b.id())) {
            self.push_error(BackendError::InvalidOperation);
            return;
        }

        for buffer in buffers {
            self.buffers.remove(&buffer.id());
        }
    }

    pub(crate) fn gen_voice(&mut self) -> Option<VoiceId> {
        if !self.require_context() {
            return None;
        }

        if !self.voice_available || self.voice.is_some() {
            self.push_error(BackendError::OutOfMemory);
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;
        self.voice = Some(Voice {
            id,
            ..Voice::default()
        });
        Some(VoiceId::new(id))
    }

    pub(crate) fn delete_voice(&mut self, voice: VoiceId) {
        if !self.require_context() {
            return;
        }

        if self.voice_ref(voice).is_some() {
            self.voice = None;
        } else {
            self.push_error(BackendError::InvalidName);
        }
    }

    pub(crate) fn buffer_data(&mut self, buffer: BufferHandle, samples: &[i16], sample_rate: u32) {
        if !self.require_context() {
            return;
        }

        if !self.buffers.contains_key(&buffer.id()) {
            self.push_error(BackendError::InvalidName);
            return;
        }
        if sample_rate != self.sample_rate {
            self.push_error(BackendError::InvalidValue);
            return;
        }
        if self.is_queued(buffer.id()) {
            self.push_error(BackendError::InvalidOperation);
            return;
        }

        if let Some(data) = self.buffers.get_mut(&buffer.id()) {
            data.clear();
            data.extend_from_slice(samples);
        }
    }

    pub(crate) fn queue_buffers(&mut self, voice: VoiceId, buffers: &[BufferHandle]) {
        if !self.require_context() {
            return;
        }

        if buffers.iter().any(|b| !self.buffers.contains_key(&b.id())) {
            self.push_error(BackendError::InvalidName);
            return;
        }
        if let Some(voice) = self.voice_mut(voice) {
            voice.queue.extend(buffers.iter().map(|b| b.id()));
        }
    }

    pub(crate) fn unqueue_buffers(&mut self, voice: VoiceId, out: &mut [BufferHandle]) -> usize {
        if !self.require_context() {
            return 0;
        }

        let Some(v) = self.voice_mut(voice) else {
            return 0;
        };

        if out.len() > v.processed {
            self.push_error(BackendError::InvalidValue);
            return 0;
        }

        let mut taken = 0;
        for slot in out.iter_mut() {
            let Some(id) = v.queue.pop_front() else {
                break;
            };
            *slot = BufferHandle::new(id);
            taken += 1;
        }
        v.processed -= taken;
        taken
    }

    pub(crate) fn voice_state(&self, voice: VoiceId) -> VoiceState {
        self.voice_ref(voice).map_or(VoiceState::Stopped, |v| v.state)
    }

    pub(crate) fn buffers_queued(&self, voice: VoiceId) -> usize {
        self.voice_ref(voice).map_or(0, |v| v.queue.len())
    }

    pub(crate) fn buffers_processed(&self, voice: VoiceId) -> usize {
        self.voice_ref(voice).map_or(0, |v| v.processed)
    }

    pub(crate) fn play(&mut self, voice: VoiceId) {
        if !self.require_context() {
            return;
        }

        if let Some(v) = self.voice_mut(voice) {
            // Nothing left to consume means an immediate underrun.
            v.state = if v.pending() == 0 {
                VoiceState::Stopped
            } else {
                VoiceState::Playing
            };
        }
    }

    pub(crate) fn pause(&mut self, voice: VoiceId) {
        if !self.require_context() {
            return;
        }

        if let Some(v) = self.voice_mut(voice) {
            if v.state == VoiceState::Playing {
                v.state = VoiceState::Paused;
            }
        }
    }

    pub(crate) fn stop(&mut self, voice: VoiceId) {
        if !self.require_context() {
            return;
        }

        if let Some(v) = self.voice_mut(voice) {
            v.state = VoiceState::Stopped;
            v.processed = v.queue.len();
            v.cursor = 0;
        }
    }

    /// Pull the next sample of the playing voice.
    ///
    /// Returns `None` when the voice is not playing. Running out of queued
    /// data stops the voice.
    pub(crate) fn next_sample(&mut self) -> Option<i16> {
        let voice = self.voice.as_mut()?;
        if voice.state != VoiceState::Playing {
            return None;
        }

        loop {
            let Some(&id) = voice.queue.get(voice.processed) else {
                voice.state = VoiceState::Stopped;
                voice.cursor = 0;
                return None;
            };

            let data = self.buffers.get(&id).map_or(&[][..], Vec::as_slice);
            if let Some(&sample) = data.get(voice.cursor) {
                voice.cursor += 1;
                return Some(sample);
            }

            voice.processed += 1;
            voice.cursor = 0;
        }
    }

    /// Finish up to `count` whole buffers of the playing voice, appending
    /// their samples to `played`. Returns how many were finished.
    pub(crate) fn consume_buffers(&mut self, count: usize, played: &mut Vec<i16>) -> usize {
        let Some(voice) = self.voice.as_mut() else {
            return 0;
        };
        if voice.state != VoiceState::Playing {
            return 0;
        }

        let mut finished = 0;
        while finished < count {
            let Some(&id) = voice.queue.get(voice.processed) else {
                break;
            };
            if let Some(data) = self.buffers.get(&id) {
                played.extend_from_slice(&data[voice.cursor.min(data.len())..]);
            }
            voice.processed += 1;
            voice.cursor = 0;
            finished += 1;
        }

        if voice.pending() == 0 {
            voice.state = VoiceState::Stopped;
        }
        finished
    }
}
