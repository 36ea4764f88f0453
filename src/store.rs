//! In-memory recording store: one optional clip per sentence.

use std::sync::Arc;

use tracing::debug;

use crate::services::{AudioCodec, AudioEncoding};

/// A stored recording for one sentence.
///
/// Clips are published twice per capture: first the raw recording marked
/// `provisional`, then (if the trim pass removed anything) the trimmed
/// replacement. Replay uses whatever is current.
#[derive(Debug, Clone)]
pub struct Clip {
    bytes: Arc<Vec<u8>>,
    encoding: AudioEncoding,
    generation: u64,
    provisional: bool,
    duration_ms: Option<u64>,
}

impl Clip {
    /// A raw clip awaiting its trim result.
    pub fn provisional(
        bytes: Arc<Vec<u8>>,
        encoding: AudioEncoding,
        generation: u64,
        duration_ms: Option<u64>,
    ) -> Self {
        Self {
            bytes,
            encoding,
            generation,
            provisional: true,
            duration_ms,
        }
    }

    /// A clip that will not be replaced.
    pub fn finalized(
        bytes: Arc<Vec<u8>>,
        encoding: AudioEncoding,
        generation: u64,
        duration_ms: Option<u64>,
    ) -> Self {
        Self {
            bytes,
            encoding,
            generation,
            provisional: false,
            duration_ms,
        }
    }

    pub fn bytes(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.bytes)
    }

    pub fn encoding(&self) -> &AudioEncoding {
        &self.encoding
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_provisional(&self) -> bool {
        self.provisional
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.duration_ms
    }

    /// Cached duration, computed through the codec on first ask.
    pub fn duration_or_compute(&mut self, codec: &dyn AudioCodec) -> Option<u64> {
        if self.duration_ms.is_none() {
            self.duration_ms = codec.duration_ms(&self.bytes, &self.encoding).ok();
        }
        self.duration_ms
    }
}

/// Clip slots, one per sentence of the processed text.
#[derive(Debug, Default)]
pub struct RecordingStore {
    slots: Vec<Option<Clip>>,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size the store for a new sentence list, dropping all stored clips.
    pub fn reset(&mut self, len: usize) {
        self.slots.clear();
        self.slots.resize_with(len, || None);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn has_clip(&self, index: usize) -> bool {
        matches!(self.slots.get(index), Some(Some(_)))
    }

    pub fn get(&self, index: usize) -> Option<&Clip> {
        self.slots.get(index)?.as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut Clip> {
        self.slots.get_mut(index)?.as_mut()
    }

    /// Store a clip, replacing any previous take for this sentence.
    pub fn publish(&mut self, index: usize, clip: Clip) {
        if let Some(slot) = self.slots.get_mut(index) {
            *slot = Some(clip);
        }
    }

    /// Swap in a trim result, but only if the slot still holds the capture
    /// generation it was computed for. Returns whether it applied.
    pub fn apply_trimmed(&mut self, index: usize, generation: u64, clip: Clip) -> bool {
        match self.slots.get_mut(index) {
            Some(Some(current)) if current.generation == generation => {
                *current = clip;
                true
            }
            _ => {
                debug!(index, generation, "dropping stale trim result");
                false
            }
        }
    }

    /// Mark a provisional clip as final (trim pass decided to keep it as is).
    pub fn settle(&mut self, index: usize, generation: u64) -> bool {
        match self.slots.get_mut(index) {
            Some(Some(current)) if current.generation == generation => {
                current.provisional = false;
                true
            }
            _ => false,
        }
    }

    pub fn clear(&mut self) {
        let len = self.slots.len();
        self.reset(len);
    }

    pub fn recorded_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(generation: u64) -> Clip {
        Clip::provisional(
            Arc::new(vec![0u8; 8]),
            AudioEncoding::Wav,
            generation,
            Some(500),
        )
    }

    #[test]
    fn reset_sizes_empty_slots() {
        let mut store = RecordingStore::new();
        store.reset(3);
        assert_eq!(store.len(), 3);
        assert_eq!(store.recorded_count(), 0);
        assert!(!store.has_clip(0));
    }

    #[test]
    fn publish_replaces_previous_take() {
        let mut store = RecordingStore::new();
        store.reset(2);
        store.publish(1, clip(1));
        store.publish(1, clip(2));
        assert_eq!(store.get(1).unwrap().generation(), 2);
        assert_eq!(store.recorded_count(), 1);
    }

    #[test]
    fn publish_out_of_range_is_ignored() {
        let mut store = RecordingStore::new();
        store.reset(1);
        store.publish(5, clip(1));
        assert_eq!(store.recorded_count(), 0);
    }

    #[test]
    fn trim_applies_only_to_matching_generation() {
        let mut store = RecordingStore::new();
        store.reset(1);
        store.publish(0, clip(1));

        let trimmed = Clip::finalized(Arc::new(vec![1u8; 4]), AudioEncoding::Wav, 1, Some(300));
        assert!(store.apply_trimmed(0, 1, trimmed));
        let current = store.get(0).unwrap();
        assert!(!current.is_provisional());
        assert_eq!(current.duration_ms(), Some(300));

        // A re-record bumped the slot to generation 2; the old trim is stale.
        store.publish(0, clip(2));
        let stale = Clip::finalized(Arc::new(vec![2u8; 4]), AudioEncoding::Wav, 1, Some(100));
        assert!(!store.apply_trimmed(0, 1, stale));
        assert_eq!(store.get(0).unwrap().generation(), 2);
    }

    #[test]
    fn settle_clears_provisional_flag() {
        let mut store = RecordingStore::new();
        store.reset(1);
        store.publish(0, clip(3));
        assert!(store.settle(0, 3));
        assert!(!store.get(0).unwrap().is_provisional());
        assert!(!store.settle(0, 2));
    }

    #[test]
    fn clear_keeps_length() {
        let mut store = RecordingStore::new();
        store.reset(2);
        store.publish(0, clip(1));
        store.clear();
        assert_eq!(store.len(), 2);
        assert_eq!(store.recorded_count(), 0);
    }
}
