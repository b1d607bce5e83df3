//! Spawnward service layer.
//!
//! [`SpawnControl`] ties the zone registry to per-world rule caches and
//! suppression stores. [`SpawnwardConfig`] and [`CatalogRoleResolver`] supply
//! its settings and role catalog. [`AutoSaver`] writes dirty zones back to
//! disk on the configured interval.

mod autosave;
mod config;
mod control;
mod error;
mod resolver;

pub use autosave::AutoSaver;
pub use config::{CONFIG_FILE, SpawnwardConfig};
pub use control::{SpawnControl, WorldReport};
pub use error::{ConfigError, ControlError};
pub use resolver::CatalogRoleResolver;
