//! Spawnward zones.
//!
//! A zone is a named region of one world that blocks, permits, rate-scales or
//! substitutes spawns. This crate holds the zone model, the filter compiler,
//! the [`ZoneRegistry`] with its per-world chunk index, and the
//! [`SpawnRuleCache`] that answers spawn queries from many threads at once.

mod cache;
mod error;
mod filter;
mod mode;
mod registry;
mod zone;

pub use cache::{CacheStats, SpawnRuleCache};
pub use error::{FilterError, ParseError, ZoneError, ZoneResult};
pub use filter::{
    CompiledFilter, MAX_LIGHT, MOON_PHASES, RoleIndex, RoleIndexSet, RoleResolver, RoleSet, SpawnContext,
    TimeOfDay, ZoneFilter, ZoneFilterBuilder,
};
pub use mode::ZoneMode;
pub use registry::{ChangeKind, ChangeListener, RegistryStats, ZoneChange, ZoneRef, ZoneRegistry};
pub use zone::{MAX_RATE_MULTIPLIER, SpawnZone, clamp_rate_multiplier};
