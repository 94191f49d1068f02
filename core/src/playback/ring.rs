//! Bounded history of state snapshots for reversible playback

use std::collections::VecDeque;

/// Core state captured after a completed frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Number of frames completed when the snapshot was taken
    pub frame: u64,
    /// Serialized core state
    pub data: Vec<u8>,
    /// xxh3 checksum of `data`
    pub checksum: u64,
}

impl Snapshot {
    pub fn new(frame: u64, data: Vec<u8>) -> Self {
        let checksum = retroplay_shared::blob_checksum(&data);
        Self {
            frame,
            data,
            checksum,
        }
    }

    /// Check the data still matches its checksum
    pub fn is_intact(&self) -> bool {
        retroplay_shared::blob_checksum(&self.data) == self.checksum
    }
}

/// Ordered, bounded sequence of snapshots; oldest evicted first.
///
/// Snapshots are kept in ascending frame order. Pushing a snapshot at or
/// before an existing frame discards that divergent future first.
#[derive(Debug)]
pub struct RewindRing {
    capacity: usize,
    snapshots: VecDeque<Snapshot>,
    /// Evicted buffers, reused for the next capture
    spare: Option<Vec<u8>>,
}

impl RewindRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            snapshots: VecDeque::with_capacity(capacity.min(1024)),
            spare: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Append a snapshot, evicting the oldest when over capacity
    pub fn push(&mut self, snapshot: Snapshot) {
        self.truncate_from(snapshot.frame);
        self.snapshots.push_back(snapshot);
        while self.snapshots.len() > self.capacity {
            if let Some(evicted) = self.snapshots.pop_front() {
                self.spare = Some(evicted.data);
            }
        }
    }

    /// Remove every snapshot taken at or after `frame`
    pub fn truncate_from(&mut self, frame: u64) {
        while self.snapshots.back().is_some_and(|s| s.frame >= frame) {
            self.snapshots.pop_back();
        }
    }

    /// Newest snapshot taken at or before `frame`
    pub fn at_or_before(&self, frame: u64) -> Option<&Snapshot> {
        let idx = self.snapshots.partition_point(|s| s.frame <= frame);
        idx.checked_sub(1).and_then(|i| self.snapshots.get(i))
    }

    pub fn oldest(&self) -> Option<&Snapshot> {
        self.snapshots.front()
    }

    pub fn newest(&self) -> Option<&Snapshot> {
        self.snapshots.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot> {
        self.snapshots.iter()
    }

    /// Take a buffer for the next capture, reusing an evicted one when possible
    pub fn take_buffer(&mut self) -> Vec<u8> {
        let mut buffer = self.spare.take().unwrap_or_default();
        buffer.clear();
        buffer
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}
