//! In-process suppression store.

use std::collections::BTreeMap;

use hashbrown::{HashMap, HashSet};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxBuildHasher;
use spawnward_spatial::ChunkIndex;

use crate::error::StoreError;
use crate::span::SuppressionEntry;
use crate::store::SuppressionStore;

/// A notification delivered to a loaded chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Updated(ChunkIndex),
    Removed(ChunkIndex),
}

/// Suppression store kept in memory, with loaded-chunk tracking.
///
/// Used when the host has no suppression subsystem of its own, and in tests.
/// Notifications for loaded chunks are recorded and can be drained.
#[derive(Debug, Default)]
pub struct MemorySuppressionStore {
    entries: RwLock<HashMap<ChunkIndex, SuppressionEntry, FxBuildHasher>>,
    loaded: RwLock<HashSet<ChunkIndex, FxBuildHasher>>,
    notifications: Mutex<Vec<Notification>>,
}

impl MemorySuppressionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a chunk as loaded so it receives notifications.
    pub fn load_chunk(&self, chunk: ChunkIndex) {
        self.loaded.write().insert(chunk);
    }

    pub fn unload_chunk(&self, chunk: ChunkIndex) {
        self.loaded.write().remove(&chunk);
    }

    #[must_use]
    pub fn is_loaded(&self, chunk: ChunkIndex) -> bool {
        self.loaded.read().contains(&chunk)
    }

    /// Take every notification recorded so far.
    pub fn drain_notifications(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.notifications.lock())
    }

    /// Ordered copy of the whole store.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<ChunkIndex, SuppressionEntry> {
        self.entries.read().iter().map(|(k, v)| (*k, v.clone())).collect()
    }

    /// Entry for a chunk, if any.
    #[must_use]
    pub fn entry(&self, chunk: ChunkIndex) -> Option<SuppressionEntry> {
        self.entries.read().get(&chunk).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, chunk: ChunkIndex, notification: Notification) -> bool {
        if !self.is_loaded(chunk) {
            return false;
        }
        self.notifications.lock().push(notification);
        true
    }
}

impl SuppressionStore for MemorySuppressionStore {
    fn chunk_indices(&self) -> Result<Vec<ChunkIndex>, StoreError> {
        Ok(self.entries.read().keys().copied().collect())
    }

    fn get(&self, chunk: ChunkIndex) -> Result<Option<SuppressionEntry>, StoreError> {
        Ok(self.entry(chunk))
    }

    fn put(&self, chunk: ChunkIndex, entry: SuppressionEntry) -> Result<(), StoreError> {
        self.entries.write().insert(chunk, entry);
        Ok(())
    }

    fn remove(&self, chunk: ChunkIndex) -> Result<(), StoreError> {
        self.entries.write().remove(&chunk);
        Ok(())
    }

    fn notify_updated(&self, chunk: ChunkIndex, _entry: &SuppressionEntry) -> bool {
        self.record(chunk, Notification::Updated(chunk))
    }

    fn notify_removed(&self, chunk: ChunkIndex) -> bool {
        self.record(chunk, Notification::Removed(chunk))
    }
}
