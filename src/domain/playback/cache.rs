//! Audio Cache
//!
//! Bounded LRU mapping from chunk index to the raw audio returned by the
//! synthesis service. Buffers are `Bytes`, so handing one to a decoder is a
//! reference-count bump and the cached copy can never be mutated or consumed.

use bytes::Bytes;
use std::collections::{HashMap, VecDeque};

pub const DEFAULT_CACHE_CAPACITY: usize = 10;

/// LRU audio cache keyed by chunk index
///
/// Not thread-safe on purpose: the playback engine is its only writer.
#[derive(Debug)]
pub struct AudioCache {
    capacity: usize,
    entries: HashMap<usize, Bytes>,
    /// Front is most recently used
    order: VecDeque<usize>,
}

impl AudioCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Look up a chunk, marking it most recently used on a hit
    pub fn get(&mut self, index: usize) -> Option<Bytes> {
        let audio = self.entries.get(&index)?.clone();
        self.touch(index);
        Some(audio)
    }

    /// Insert or overwrite a chunk, then evict down to capacity
    pub fn put(&mut self, index: usize, audio: Bytes) {
        if self.capacity == 0 {
            return;
        }

        self.entries.insert(index, audio);
        self.touch(index);
        self.evict_to_capacity();
    }

    /// Membership test; does not count as an access
    pub fn has(&self, index: usize) -> bool {
        self.entries.contains_key(&index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Change capacity, evicting least recently used entries if it shrank
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        self.evict_to_capacity();
    }

    /// Keep only the indices for which `keep` returns true
    pub fn retain(&mut self, mut keep: impl FnMut(usize) -> bool) {
        self.entries.retain(|index, _| keep(*index));
        let entries = &self.entries;
        self.order.retain(|index| entries.contains_key(index));
    }

    /// Cached indices from most to least recently used
    #[cfg(test)]
    pub fn indices(&self) -> Vec<usize> {
        self.order.iter().copied().collect()
    }

    fn touch(&mut self, index: usize) {
        if let Some(position) = self.order.iter().position(|&i| i == index) {
            self.order.remove(position);
        }
        self.order.push_front(index);
    }

    fn evict_to_capacity(&mut self) {
        while self.order.len() > self.capacity {
            if let Some(oldest) = self.order.pop_back() {
                self.entries.remove(&oldest);
                tracing::debug!(chunk_index = oldest, "Cache full, evicted chunk");
            }
        }
    }
}

impl Default for AudioCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}
