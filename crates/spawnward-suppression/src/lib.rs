//! Spawnward suppression synchronization.
//!
//! BLOCK and DENY zones are mirrored into an external, chunk-keyed
//! [`SuppressionStore`] that the host's spawning engine consults directly.
//! The [`SuppressionSynchronizer`] rewrites only spans it can prove are its
//! own, so other writers can share the store.

mod error;
mod id;
mod memory;
mod span;
mod store;
mod sync;

pub use error::{StoreError, SyncError};
pub use id::{OWNER_PREFIX, SuppressorId};
pub use memory::{MemorySuppressionStore, Notification};
pub use span::{SuppressionEntry, SuppressionSpan};
pub use store::SuppressionStore;
pub use sync::{SuppressionSynchronizer, SyncReport};
