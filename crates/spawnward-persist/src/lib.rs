//! Zone persistence for Spawnward.
//!
//! Zones live in a single JSON document per data directory. The registry
//! hands out snapshots through `zones_for_save` and takes restored zones
//! through `load_zones`; this crate only moves them to and from disk.

mod error;
mod file;
mod record;

pub use error::{PersistError, PersistResult};
pub use file::{SCHEMA_VERSION, ZoneFile};
pub use record::{BoundaryRecord, FilterRecord, PointRecord, ZoneRecord};
