//! The spawn control service.
//!
//! ```text
//!   ZoneRegistry ──change──► SpawnControl ──► compile filter
//!                                 │
//!                                 ├─► WorldState(world).cache.rebuild
//!                                 └─► WorldState(world).sync.apply_to_world ──► SuppressionStore
//! ```
//!
//! Each registered world has its own rule cache, optional suppression store
//! and synchronizer. The synchronizer mutex serializes every rebuild of that
//! world, so cache and store updates for one world never interleave.

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxBuildHasher;
use spawnward_persist::ZoneFile;
use spawnward_spatial::{Boundary, ChunkIndex, Position};
use spawnward_suppression::{SuppressionStore, SuppressionSynchronizer, SyncReport};
use spawnward_zone::{
    CacheStats, ChangeKind, RoleResolver, SpawnContext, SpawnRuleCache, SpawnZone, ZoneChange, ZoneRegistry,
    clamp_rate_multiplier,
};

use crate::config::SpawnwardConfig;
use crate::error::ControlError;

/// Result of rebuilding one world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorldReport {
    pub cache: CacheStats,
    pub sync: SyncReport,
}

struct WorldState {
    cache: SpawnRuleCache,
    store: Option<Arc<dyn SuppressionStore>>,
    sync: Mutex<SuppressionSynchronizer>,
}

impl WorldState {
    fn rebuild(&self, registry: &ZoneRegistry) -> Result<WorldReport, ControlError> {
        let mut synchronizer = self.sync.lock();
        let cache = self.cache.rebuild(registry)?;
        let sync = synchronizer.apply_to_world(registry, self.store.as_deref())?;
        Ok(WorldReport { cache, sync })
    }
}

/// Owns the registry and keeps every registered world's cache and
/// suppression store in line with it.
pub struct SpawnControl {
    registry: Arc<ZoneRegistry>,
    resolver: RwLock<Arc<dyn RoleResolver>>,
    config: RwLock<SpawnwardConfig>,
    worlds: RwLock<HashMap<String, Arc<WorldState>, FxBuildHasher>>,
}

impl fmt::Debug for SpawnControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpawnControl")
            .field("registry", &self.registry)
            .field("worlds", &self.worlds())
            .finish_non_exhaustive()
    }
}

impl SpawnControl {
    /// Build the service and subscribe it to registry changes.
    pub fn new(config: SpawnwardConfig, resolver: Arc<dyn RoleResolver>) -> Arc<Self> {
        let control = Arc::new(Self {
            registry: Arc::new(ZoneRegistry::new()),
            resolver: RwLock::new(resolver),
            config: RwLock::new(config.normalized()),
            worlds: RwLock::new(HashMap::default()),
        });

        let weak = Arc::downgrade(&control);
        control.registry.set_change_listener(move |change| {
            if let Some(control) = weak.upgrade() {
                control.on_zone_change(change);
            }
        });
        control
    }

    pub fn registry(&self) -> &Arc<ZoneRegistry> {
        &self.registry
    }

    pub fn resolver(&self) -> Arc<dyn RoleResolver> {
        Arc::clone(&*self.resolver.read())
    }

    pub fn config(&self) -> SpawnwardConfig {
        self.config.read().clone()
    }

    pub fn set_paused(&self, paused: bool) {
        self.config.write().global_spawn_paused = paused;
        tracing::info!(paused, "global spawning pause changed");
    }

    pub fn set_global_multiplier(&self, multiplier: f64) {
        let multiplier = clamp_rate_multiplier(multiplier);
        self.config.write().global_spawn_multiplier = multiplier;
        tracing::info!(multiplier, "global spawn multiplier changed");
    }

    // ===== Worlds =====

    /// Registered world names, sorted.
    pub fn worlds(&self) -> Vec<String> {
        let mut worlds: Vec<_> = self.worlds.read().keys().cloned().collect();
        worlds.sort_unstable();
        worlds
    }

    fn world(&self, name: &str) -> Option<Arc<WorldState>> {
        self.worlds.read().get(name).cloned()
    }

    fn world_or_err(&self, name: &str) -> Result<Arc<WorldState>, ControlError> {
        self.world(name).ok_or_else(|| ControlError::UnknownWorld(name.to_owned()))
    }

    /// Start tracking a world and bring its cache and store up to date.
    ///
    /// `store` is `None` when the host has no suppression subsystem for the
    /// world; zones then act through the local cache only. If the first
    /// rebuild fails the world is not registered and the error is returned.
    pub fn register_world(
        &self,
        name: &str,
        store: Option<Arc<dyn SuppressionStore>>,
    ) -> Result<WorldReport, ControlError> {
        let has_store = store.is_some();
        let state = Arc::new(WorldState {
            cache: SpawnRuleCache::new(name),
            store,
            sync: Mutex::new(SuppressionSynchronizer::new(name)),
        });
        {
            let mut worlds = self.worlds.write();
            if worlds.contains_key(name) {
                return Err(ControlError::WorldAlreadyRegistered(name.to_owned()));
            }
            worlds.insert(name.to_owned(), Arc::clone(&state));
        }
        match state.rebuild(&self.registry) {
            Ok(report) => {
                tracing::info!(world = name, store = has_store, "registered world");
                Ok(report)
            }
            Err(e) => {
                self.discard_world(name, &state);
                tracing::warn!(world = name, error = %e, "world registration failed");
                Err(e)
            }
        }
    }

    /// Undo a registration whose first rebuild failed.
    fn discard_world(&self, name: &str, state: &Arc<WorldState>) {
        {
            let mut worlds = self.worlds.write();
            if worlds.get(name).is_some_and(|current| Arc::ptr_eq(current, state)) {
                worlds.remove(name);
            }
        }
        let mut sync = state.sync.lock();
        state.cache.clear();
        if let Err(e) = sync.clear_world(state.store.as_deref()) {
            tracing::warn!(world = name, error = %e, "could not clear store of discarded world");
        }
    }

    /// Stop tracking a world, removing everything written to its store.
    pub fn unregister_world(&self, name: &str) -> Result<SyncReport, ControlError> {
        let state = self
            .worlds
            .write()
            .remove(name)
            .ok_or_else(|| ControlError::UnknownWorld(name.to_owned()))?;
        let mut sync = state.sync.lock();
        state.cache.clear();
        let report = sync.clear_world(state.store.as_deref())?;
        tracing::info!(world = name, "unregistered world");
        Ok(report)
    }

    /// Rebuild one world's cache and reconcile its store.
    pub fn rebuild_world(&self, name: &str) -> Result<WorldReport, ControlError> {
        self.world_or_err(name)?.rebuild(&self.registry)
    }

    /// Rebuild every world. All worlds are attempted; the first failure is returned.
    pub fn rebuild_all(&self) -> Result<(), ControlError> {
        let states: Vec<_> = self.worlds.read().values().cloned().collect();
        let mut first_error = None;
        for state in states {
            if let Err(e) = state.rebuild(&self.registry) {
                tracing::warn!(world = state.cache.world(), error = %e, "world rebuild failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Re-signal a chunk that just became active. Returns whether it was notified.
    pub fn on_chunk_loaded(&self, world: &str, chunk: ChunkIndex) -> Result<bool, ControlError> {
        let state = self.world_or_err(world)?;
        let sync = state.sync.lock();
        Ok(sync.apply_to_chunk(state.store.as_deref(), chunk)?)
    }

    // ===== Zones =====

    /// Create a zone with the configured default mode.
    pub fn create_zone(&self, name: &str, world: &str, boundary: Boundary) -> Result<Arc<SpawnZone>, ControlError> {
        let mode = self.config.read().default_zone_mode;
        let zone = SpawnZone::new(name, world, boundary)
            .with_mode(mode)
            .compiled_with(self.resolver().as_ref());
        Ok(self.registry.insert(zone)?)
    }

    /// Swap the role resolver, recompile every filter and rebuild every world.
    pub fn reload_roles(&self, resolver: Arc<dyn RoleResolver>) -> Result<(), ControlError> {
        *self.resolver.write() = Arc::clone(&resolver);
        self.registry.compile_all_filters(resolver.as_ref());
        tracing::info!("reloaded role catalog");
        self.rebuild_all()
    }

    fn on_zone_change(&self, change: &ZoneChange) {
        let zone = &change.zone;
        if change.kind != ChangeKind::Deleted {
            let resolver = self.resolver();
            if let Err(e) = self.registry.compile_filter(zone.id(), resolver.as_ref()) {
                // Deleted by a concurrent writer; its own change event rebuilds.
                tracing::debug!(zone = %zone.name(), error = %e, "zone gone before its filter compiled");
            }
        }

        self.rebuild_after_change(zone.world());
        if let ChangeKind::Moved { previous_world } = &change.kind {
            self.rebuild_after_change(previous_world);
        }
    }

    fn rebuild_after_change(&self, world: &str) {
        let Some(state) = self.world(world) else {
            tracing::trace!(world, "zone change in unregistered world");
            return;
        };
        match state.rebuild(&self.registry) {
            Ok(report) => tracing::debug!(world, cache = ?report.cache, sync = %report.sync, "rebuilt world"),
            Err(e) => tracing::warn!(world, error = %e, "world rebuild after zone change failed"),
        }
    }

    // ===== Spawn queries =====

    /// Whether a spawn must be blocked. Unregistered worlds never block
    /// unless spawning is paused globally.
    pub fn should_block(&self, world: &str, pos: Position, ctx: &SpawnContext) -> bool {
        if self.config.read().global_spawn_paused {
            return true;
        }
        self.world(world).is_some_and(|state| state.cache.should_block(pos, ctx))
    }

    pub fn rate_multiplier(&self, world: &str, pos: Position, ctx: &SpawnContext) -> f64 {
        let global = self.config.read().global_spawn_multiplier;
        self.world(world)
            .map_or(global, |state| state.cache.rate_multiplier(pos, ctx) * global)
    }

    pub fn substitute_for(&self, world: &str, pos: Position, ctx: &SpawnContext) -> Option<Arc<str>> {
        self.world(world)?.cache.substitute_for(pos, ctx)
    }

    // ===== Persistence =====

    /// Replace every zone with the contents of `file`, then rebuild every world.
    pub fn load_zones(&self, file: &ZoneFile) -> Result<usize, ControlError> {
        let resolver = self.resolver();
        let zones = file
            .load()?
            .into_iter()
            .map(|zone| zone.compiled_with(resolver.as_ref()));
        let loaded = self.registry.load_zones(zones);
        self.rebuild_all()?;
        Ok(loaded)
    }

    /// Save when zones changed since the last save. Returns the number of
    /// zones written, or `None` when there was nothing to save.
    pub fn save_if_dirty(&self, file: &ZoneFile) -> Result<Option<usize>, ControlError> {
        if !self.registry.take_dirty() {
            return Ok(None);
        }
        let zones = self.registry.zones_for_save();
        match file.save(zones.iter().map(Arc::as_ref)) {
            Ok(saved) => {
                tracing::info!(path = %file.path().display(), zones = saved, "saved zones");
                Ok(Some(saved))
            }
            Err(e) => {
                self.registry.mark_dirty();
                Err(e.into())
            }
        }
    }
}
