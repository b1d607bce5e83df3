//! Suppression error types.

use spawnward_zone::ZoneError;
use thiserror::Error;
use uuid::Uuid;

use crate::id::SuppressorId;

/// Failure reported by a suppression store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The store cannot be reached right now.
    #[error("suppression store unavailable: {0}")]
    Unavailable(String),

    /// The store rejected or failed an operation.
    #[error("suppression store failure: {0}")]
    Backend(String),
}

/// Reconciliation failure.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    /// A selected zone could not be turned into spans.
    #[error(transparent)]
    Zone(#[from] ZoneError),

    /// Two zones in one world derived the same suppressor id.
    #[error("zones {first} and {second} share suppressor id {suppressor}")]
    SuppressorCollision {
        suppressor: SuppressorId,
        first: Uuid,
        second: Uuid,
    },

    /// A store read or write failed; the pass was abandoned.
    #[error(transparent)]
    Store(#[from] StoreError),
}
