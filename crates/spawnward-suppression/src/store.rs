//! The external suppression store interface.

use spawnward_spatial::ChunkIndex;

use crate::error::StoreError;
use crate::span::SuppressionEntry;

/// Chunk-keyed store of suppression spans shared with other writers.
///
/// The synchronizer reads entries to find its own stale spans and writes the
/// reconciled lists back. It never assumes it is the only writer.
pub trait SuppressionStore: Send + Sync {
    /// Every chunk that currently has an entry.
    fn chunk_indices(&self) -> Result<Vec<ChunkIndex>, StoreError>;

    fn get(&self, chunk: ChunkIndex) -> Result<Option<SuppressionEntry>, StoreError>;

    fn put(&self, chunk: ChunkIndex, entry: SuppressionEntry) -> Result<(), StoreError>;

    fn remove(&self, chunk: ChunkIndex) -> Result<(), StoreError>;

    /// Tell a loaded chunk its entry changed. Returns whether the chunk was loaded.
    fn notify_updated(&self, chunk: ChunkIndex, entry: &SuppressionEntry) -> bool;

    /// Tell a loaded chunk its entry is gone. Returns whether the chunk was loaded.
    fn notify_removed(&self, chunk: ChunkIndex) -> bool;
}
