//! The zone registry.
//!
//! # Index Layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ RegistryInner (one RwLock)                                   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ by_id:   Uuid            ──► Arc<SpawnZone>                  │
//! │ by_name: lowercase name  ──► Uuid                            │
//! │ chunks:  world ──► ChunkIndex ──► {Uuid, ...}                │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A zone id appears in a chunk set exactly when the zone's boundary
//! intersects that chunk in the zone's world. Every mutation runs inside one
//! write section, so readers never see the maps disagree. Zones are replaced
//! wholesale (copy, modify, swap) rather than edited in place, so an
//! `Arc<SpawnZone>` handed to a reader stays a consistent snapshot.
//!
//! Change listeners run after the write lock is released and may call back
//! into the registry.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use spawnward_spatial::{Boundary, ChunkIndex, Position};
use uuid::Uuid;

use crate::error::{ZoneError, ZoneResult};
use crate::filter::{RoleResolver, ZoneFilter};
use crate::mode::ZoneMode;
use crate::zone::{SpawnZone, clamp_rate_multiplier};

type ZoneIdSet = HashSet<Uuid, FxBuildHasher>;
type ChunkMap = HashMap<ChunkIndex, ZoneIdSet, FxBuildHasher>;

/// Callback invoked after every registry change.
pub type ChangeListener = Arc<dyn Fn(&ZoneChange) + Send + Sync>;

/// A zone lookup key: id or case-insensitive name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneRef<'a> {
    Id(Uuid),
    Name(&'a str),
}

impl From<Uuid> for ZoneRef<'_> {
    fn from(id: Uuid) -> Self {
        Self::Id(id)
    }
}

impl<'a> From<&'a str> for ZoneRef<'a> {
    fn from(name: &'a str) -> Self {
        Self::Name(name)
    }
}

impl<'a> From<&'a String> for ZoneRef<'a> {
    fn from(name: &'a String) -> Self {
        Self::Name(name)
    }
}

impl From<&SpawnZone> for ZoneRef<'_> {
    fn from(zone: &SpawnZone) -> Self {
        Self::Id(zone.id())
    }
}

impl From<&Arc<SpawnZone>> for ZoneRef<'_> {
    fn from(zone: &Arc<SpawnZone>) -> Self {
        Self::Id(zone.id())
    }
}

impl fmt::Display for ZoneRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Name(name) => f.write_str(name),
        }
    }
}

/// What happened to a zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Deleted,
    /// The zone moved to another world.
    Moved { previous_world: String },
}

/// Notification emitted after a registry mutation.
#[derive(Debug, Clone)]
pub struct ZoneChange {
    pub kind: ChangeKind,
    /// The zone after the change (before it, for deletions).
    pub zone: Arc<SpawnZone>,
}

/// Registry counters for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub zones: usize,
    pub worlds: usize,
    pub indexed_chunks: usize,
}

#[derive(Default)]
struct RegistryInner {
    by_id: HashMap<Uuid, Arc<SpawnZone>>,
    by_name: HashMap<String, Uuid>,
    chunks: HashMap<String, ChunkMap>,
}

impl RegistryInner {
    fn resolve(&self, zone: ZoneRef<'_>) -> Option<&Arc<SpawnZone>> {
        match zone {
            ZoneRef::Id(id) => self.by_id.get(&id),
            ZoneRef::Name(name) => self.by_name.get(&name_key(name)).and_then(|id| self.by_id.get(id)),
        }
    }

    fn resolve_or_err(&self, zone: ZoneRef<'_>) -> ZoneResult<Arc<SpawnZone>> {
        self.resolve(zone)
            .cloned()
            .ok_or_else(|| ZoneError::NotFound(zone.to_string()))
    }

    fn insert(&mut self, zone: SpawnZone) -> ZoneResult<Arc<SpawnZone>> {
        validate_name(&zone.name)?;
        let key = name_key(&zone.name);
        if self.by_name.contains_key(&key) {
            return Err(ZoneError::DuplicateName(zone.name));
        }
        if self.by_id.contains_key(&zone.id) {
            return Err(ZoneError::IndexInconsistent(format!("zone id {} already registered", zone.id)));
        }

        let zone = Arc::new(zone);
        self.index(&zone);
        self.by_name.insert(key, zone.id);
        self.by_id.insert(zone.id, Arc::clone(&zone));
        Ok(zone)
    }

    /// Add the zone id to every chunk its boundary intersects.
    fn index(&mut self, zone: &SpawnZone) {
        let chunks = self.chunks.entry(zone.world.clone()).or_default();
        let mut touched = 0_usize;
        for (cx, cz) in zone.boundary.chunk_range().iter() {
            if zone.boundary.intersects_chunk(cx, cz) {
                chunks.entry(ChunkIndex::new(cx, cz)).or_default().insert(zone.id);
                touched += 1;
            }
        }
        tracing::trace!(zone = %zone.name, world = %zone.world, chunks = touched, "indexed zone");
    }

    /// Remove the zone id from every chunk its boundary intersects.
    fn unindex(&mut self, zone: &SpawnZone) {
        let Some(chunks) = self.chunks.get_mut(&zone.world) else {
            return;
        };
        for (cx, cz) in zone.boundary.chunk_range().iter() {
            if !zone.boundary.intersects_chunk(cx, cz) {
                continue;
            }
            let key = ChunkIndex::new(cx, cz);
            if let Some(ids) = chunks.get_mut(&key) {
                ids.remove(&zone.id);
                if ids.is_empty() {
                    chunks.remove(&key);
                }
            }
        }
        if chunks.is_empty() {
            self.chunks.remove(&zone.world);
        }
        tracing::trace!(zone = %zone.name, world = %zone.world, "unindexed zone");
    }

    /// Swap in an updated copy of a zone whose spatial extent is unchanged.
    fn replace(&mut self, zone: SpawnZone) -> Arc<SpawnZone> {
        let zone = Arc::new(zone);
        self.by_id.insert(zone.id, Arc::clone(&zone));
        zone
    }
}

/// Owner of all zones and their indexes.
pub struct ZoneRegistry {
    inner: RwLock<RegistryInner>,
    dirty: AtomicBool,
    listener: RwLock<Option<ChangeListener>>,
}

impl Default for ZoneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ZoneRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("ZoneRegistry")
            .field("zones", &stats.zones)
            .field("worlds", &stats.worlds)
            .field("indexed_chunks", &stats.indexed_chunks)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}

impl ZoneRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(RegistryInner::default()),
            dirty: AtomicBool::new(false),
            listener: RwLock::new(None),
        }
    }

    /// Install the change listener, replacing any previous one.
    pub fn set_change_listener(&self, listener: impl Fn(&ZoneChange) + Send + Sync + 'static) {
        *self.listener.write() = Some(Arc::new(listener));
    }

    pub fn clear_change_listener(&self) {
        *self.listener.write() = None;
    }

    fn changed(&self, kind: ChangeKind, zone: &Arc<SpawnZone>) {
        self.dirty.store(true, Ordering::Release);
        let listener = self.listener.read().clone();
        if let Some(listener) = listener {
            listener(&ZoneChange {
                kind,
                zone: Arc::clone(zone),
            });
        }
    }

    // ===== Lifecycle =====

    /// Create a BLOCK zone with default settings.
    pub fn create(&self, name: &str, world: &str, boundary: Boundary) -> ZoneResult<Arc<SpawnZone>> {
        self.create_with_mode(name, world, boundary, ZoneMode::default())
    }

    pub fn create_with_mode(
        &self,
        name: &str,
        world: &str,
        boundary: Boundary,
        mode: ZoneMode,
    ) -> ZoneResult<Arc<SpawnZone>> {
        self.insert(SpawnZone::new(name, world, boundary).with_mode(mode))
    }

    /// Register a fully built zone.
    pub fn insert(&self, zone: SpawnZone) -> ZoneResult<Arc<SpawnZone>> {
        let zone = self.inner.write().insert(zone)?;
        tracing::info!(
            zone = %zone.name(),
            world = %zone.world(),
            boundary = %zone.boundary(),
            mode = %zone.mode(),
            "created zone"
        );
        self.changed(ChangeKind::Created, &zone);
        Ok(zone)
    }

    /// Remove a zone from every index.
    pub fn delete<'a>(&self, zone: impl Into<ZoneRef<'a>>) -> ZoneResult<Arc<SpawnZone>> {
        let removed = {
            let mut inner = self.inner.write();
            let zone = inner.resolve_or_err(zone.into())?;
            inner.unindex(&zone);
            inner.by_name.remove(&name_key(&zone.name));
            inner.by_id.remove(&zone.id);
            zone
        };
        tracing::info!(zone = %removed.name(), world = %removed.world(), "deleted zone");
        self.changed(ChangeKind::Deleted, &removed);
        Ok(removed)
    }

    /// Replace every zone with `zones`, e.g. after reading them from disk.
    ///
    /// Records whose name or id repeats an earlier record are skipped. Returns
    /// the number of zones loaded. Clears the dirty flag and emits no change
    /// notifications.
    pub fn load_zones(&self, zones: impl IntoIterator<Item = SpawnZone>) -> usize {
        let mut inner = self.inner.write();
        *inner = RegistryInner::default();
        let mut loaded = 0;
        for zone in zones {
            let name = zone.name.clone();
            match inner.insert(zone) {
                Ok(_) => loaded += 1,
                Err(e) => tracing::warn!(zone = %name, error = %e, "skipping zone on load"),
            }
        }
        drop(inner);
        self.dirty.store(false, Ordering::Release);
        tracing::info!(zones = loaded, "loaded zones");
        loaded
    }

    /// Snapshot of every zone, ordered by name.
    #[must_use]
    pub fn zones_for_save(&self) -> Vec<Arc<SpawnZone>> {
        let mut zones = self.zones();
        zones.sort_by_key(|zone| name_key(&zone.name));
        zones
    }

    // ===== Lookup =====

    #[must_use]
    pub fn get<'a>(&self, zone: impl Into<ZoneRef<'a>>) -> Option<Arc<SpawnZone>> {
        self.inner.read().resolve(zone.into()).cloned()
    }

    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.inner.read().by_name.contains_key(&name_key(name))
    }

    #[must_use]
    pub fn zones(&self) -> Vec<Arc<SpawnZone>> {
        self.inner.read().by_id.values().cloned().collect()
    }

    #[must_use]
    pub fn zones_in_world(&self, world: &str) -> Vec<Arc<SpawnZone>> {
        self.inner
            .read()
            .by_id
            .values()
            .filter(|zone| zone.world == world)
            .cloned()
            .collect()
    }

    /// Enabled zones containing `pos`, highest priority first.
    ///
    /// Equal priorities are ordered by id so results are stable across calls.
    #[must_use]
    pub fn zones_at_point(&self, world: &str, pos: Position) -> Vec<Arc<SpawnZone>> {
        let mut found: Vec<_> = {
            let inner = self.inner.read();
            let Some(ids) = inner.chunks.get(world).and_then(|chunks| chunks.get(&pos.chunk())) else {
                return Vec::new();
            };
            ids.iter()
                .filter_map(|id| inner.by_id.get(id))
                .filter(|zone| zone.enabled && zone.contains(pos))
                .cloned()
                .collect()
        };
        found.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.id.cmp(&b.id)));
        found
    }

    #[must_use]
    pub fn highest_priority_at_point(&self, world: &str, pos: Position) -> Option<Arc<SpawnZone>> {
        self.zones_at_point(world, pos).into_iter().next()
    }

    /// Ids of every zone indexed under a chunk, in ascending order.
    ///
    /// This is a superset of the zones covering the whole chunk: round shapes
    /// are indexed conservatively.
    #[must_use]
    pub fn zones_in_chunk(&self, world: &str, chunk: ChunkIndex) -> Vec<Uuid> {
        let inner = self.inner.read();
        let mut ids: Vec<_> = inner
            .chunks
            .get(world)
            .and_then(|chunks| chunks.get(&chunk))
            .map(|ids| ids.iter().copied().collect())
            .unwrap_or_default();
        ids.sort_unstable();
        ids
    }

    // ===== Spatial mutation =====

    /// Swap a zone's boundary and reindex it.
    pub fn update_boundary<'a>(&self, zone: impl Into<ZoneRef<'a>>, boundary: Boundary) -> ZoneResult<Arc<SpawnZone>> {
        let updated = {
            let mut inner = self.inner.write();
            let current = inner.resolve_or_err(zone.into())?;
            inner.unindex(&current);
            let mut next = SpawnZone::clone(&current);
            next.boundary = boundary;
            inner.index(&next);
            inner.replace(next)
        };
        tracing::info!(zone = %updated.name(), boundary = %updated.boundary(), "updated zone boundary");
        self.changed(ChangeKind::Modified, &updated);
        Ok(updated)
    }

    /// Move a zone to another world. Moving to its current world is a no-op.
    pub fn update_world<'a>(&self, zone: impl Into<ZoneRef<'a>>, world: &str) -> ZoneResult<Arc<SpawnZone>> {
        let (updated, previous_world) = {
            let mut inner = self.inner.write();
            let current = inner.resolve_or_err(zone.into())?;
            if current.world == world {
                return Ok(current);
            }
            inner.unindex(&current);
            let mut next = SpawnZone::clone(&current);
            next.world = world.to_owned();
            inner.index(&next);
            (inner.replace(next), current.world.clone())
        };
        tracing::info!(zone = %updated.name(), from = %previous_world, to = %updated.world(), "moved zone");
        self.changed(ChangeKind::Moved { previous_world }, &updated);
        Ok(updated)
    }

    pub fn rename<'a>(&self, zone: impl Into<ZoneRef<'a>>, new_name: &str) -> ZoneResult<Arc<SpawnZone>> {
        validate_name(new_name)?;
        let (updated, old_name) = {
            let mut inner = self.inner.write();
            let current = inner.resolve_or_err(zone.into())?;
            let new_key = name_key(new_name);
            if inner.by_name.get(&new_key).is_some_and(|&id| id != current.id) {
                return Err(ZoneError::DuplicateName(new_name.to_owned()));
            }
            inner.by_name.remove(&name_key(&current.name));
            inner.by_name.insert(new_key, current.id);
            let mut next = SpawnZone::clone(&current);
            next.name = new_name.to_owned();
            (inner.replace(next), current.name.clone())
        };
        tracing::info!(from = %old_name, to = %updated.name(), "renamed zone");
        self.changed(ChangeKind::Modified, &updated);
        Ok(updated)
    }

    // ===== Attribute mutation =====

    fn modify(&self, zone: ZoneRef<'_>, edit: impl FnOnce(&mut SpawnZone)) -> ZoneResult<Arc<SpawnZone>> {
        let updated = {
            let mut inner = self.inner.write();
            let current = inner.resolve_or_err(zone)?;
            let mut next = SpawnZone::clone(&current);
            edit(&mut next);
            inner.replace(next)
        };
        tracing::debug!(zone = %updated.name(), "modified zone");
        self.changed(ChangeKind::Modified, &updated);
        Ok(updated)
    }

    pub fn set_mode<'a>(&self, zone: impl Into<ZoneRef<'a>>, mode: ZoneMode) -> ZoneResult<Arc<SpawnZone>> {
        self.modify(zone.into(), |z| z.mode = mode)
    }

    /// Replace a zone's filter. The zone stays uncompiled until the next compile.
    pub fn set_filter<'a>(&self, zone: impl Into<ZoneRef<'a>>, filter: ZoneFilter) -> ZoneResult<Arc<SpawnZone>> {
        self.modify(zone.into(), |z| {
            z.filter = filter;
            z.compiled = None;
        })
    }

    pub fn set_priority<'a>(&self, zone: impl Into<ZoneRef<'a>>, priority: i32) -> ZoneResult<Arc<SpawnZone>> {
        self.modify(zone.into(), |z| z.priority = priority)
    }

    pub fn set_enabled<'a>(&self, zone: impl Into<ZoneRef<'a>>, enabled: bool) -> ZoneResult<Arc<SpawnZone>> {
        self.modify(zone.into(), |z| z.enabled = enabled)
    }

    /// Set the rate multiplier, clamped to `[0, 10]`.
    pub fn set_rate_multiplier<'a>(&self, zone: impl Into<ZoneRef<'a>>, multiplier: f64) -> ZoneResult<Arc<SpawnZone>> {
        let multiplier = clamp_rate_multiplier(multiplier);
        self.modify(zone.into(), |z| z.rate_multiplier = multiplier)
    }

    pub fn set_substitute<'a>(
        &self,
        zone: impl Into<ZoneRef<'a>>,
        substitute: Option<String>,
    ) -> ZoneResult<Arc<SpawnZone>> {
        self.modify(zone.into(), |z| z.substitute = substitute)
    }

    /// Mark dirty and notify without changing anything.
    pub fn mark_modified<'a>(&self, zone: impl Into<ZoneRef<'a>>) -> ZoneResult<Arc<SpawnZone>> {
        let zone = self.inner.read().resolve_or_err(zone.into())?;
        self.changed(ChangeKind::Modified, &zone);
        Ok(zone)
    }

    // ===== Filter compilation =====

    /// Compile one zone's filter. Not a user-visible change: no dirty flag, no notification.
    pub fn compile_filter<'a>(
        &self,
        zone: impl Into<ZoneRef<'a>>,
        resolver: &dyn RoleResolver,
    ) -> ZoneResult<Arc<SpawnZone>> {
        let mut inner = self.inner.write();
        let current = inner.resolve_or_err(zone.into())?;
        let mut next = SpawnZone::clone(&current);
        next.compile_filter(resolver);
        Ok(inner.replace(next))
    }

    /// Compile every zone's filter, e.g. after the role catalog changed.
    pub fn compile_all_filters(&self, resolver: &dyn RoleResolver) {
        let mut inner = self.inner.write();
        let zones: Vec<_> = inner.by_id.values().cloned().collect();
        for zone in zones {
            let mut next = SpawnZone::clone(&zone);
            next.compile_filter(resolver);
            inner.replace(next);
        }
        tracing::debug!(zones = inner.by_id.len(), "compiled all zone filters");
    }

    // ===== Persistence support =====

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Clear the dirty flag after a successful save.
    pub fn clear_dirty(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// Clear the dirty flag, returning whether it was set.
    ///
    /// Savers take the flag before snapshotting so a change racing the save
    /// sets it again; a failed save puts it back with [`Self::mark_dirty`].
    pub fn take_dirty(&self) -> bool {
        self.dirty.swap(false, Ordering::AcqRel)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    // ===== Diagnostics =====

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        let inner = self.inner.read();
        let mut worlds: HashSet<&str> = inner.by_id.values().map(|zone| zone.world.as_str()).collect();
        worlds.extend(inner.chunks.keys().map(String::as_str));
        RegistryStats {
            zones: inner.by_id.len(),
            worlds: worlds.len(),
            indexed_chunks: inner.chunks.values().map(HashMap::len).sum(),
        }
    }

    /// Check that the name map, id map and chunk index agree.
    pub fn verify_index(&self) -> ZoneResult<()> {
        let inner = self.inner.read();

        if inner.by_name.len() != inner.by_id.len() {
            return Err(inconsistent(format!(
                "{} names for {} zones",
                inner.by_name.len(),
                inner.by_id.len()
            )));
        }
        for (key, id) in &inner.by_name {
            match inner.by_id.get(id) {
                Some(zone) if name_key(&zone.name) == *key => {}
                _ => return Err(inconsistent(format!("name '{key}' maps to a missing or renamed zone"))),
            }
        }

        for zone in inner.by_id.values() {
            let chunks = inner.chunks.get(&zone.world);
            for (cx, cz) in zone.boundary.chunk_range().iter() {
                let indexed = chunks
                    .and_then(|chunks| chunks.get(&ChunkIndex::new(cx, cz)))
                    .is_some_and(|ids| ids.contains(&zone.id));
                if indexed != zone.boundary.intersects_chunk(cx, cz) {
                    return Err(inconsistent(format!(
                        "zone '{}' index entry for chunk ({cx}, {cz}) is {}",
                        zone.name,
                        if indexed { "stale" } else { "missing" }
                    )));
                }
            }
        }

        for (world, chunks) in &inner.chunks {
            for (chunk, ids) in chunks {
                if ids.is_empty() {
                    return Err(inconsistent(format!("empty id set left at {chunk} in '{world}'")));
                }
                for id in ids {
                    let Some(zone) = inner.by_id.get(id) else {
                        return Err(inconsistent(format!("unknown zone {id} indexed at {chunk} in '{world}'")));
                    };
                    if zone.world != *world || !zone.boundary.intersects_chunk(chunk.x(), chunk.z()) {
                        return Err(inconsistent(format!(
                            "zone '{}' indexed at {chunk} in '{world}' outside its extent",
                            zone.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

fn inconsistent(detail: String) -> ZoneError {
    ZoneError::IndexInconsistent(detail)
}

fn name_key(name: &str) -> String {
    name.to_lowercase()
}

fn validate_name(name: &str) -> ZoneResult<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(ZoneError::InvalidName(name.to_owned()));
    }
    Ok(())
}
