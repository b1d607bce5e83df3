//! End-to-end reconciliation scenarios against in-memory and failing stores.

use std::sync::atomic::{AtomicUsize, Ordering};

use spawnward_spatial::{Boundary, ChunkIndex, Position};
use spawnward_suppression::{
    MemorySuppressionStore, Notification, StoreError, SuppressionEntry, SuppressionSpan, SuppressionStore,
    SuppressionSynchronizer, SuppressorId, SyncError,
};
use spawnward_zone::{
    RoleIndex, RoleResolver, RoleSet, SpawnContext, SpawnRuleCache, SpawnZone, TimeOfDay, ZoneFilter, ZoneMode,
    ZoneRegistry,
};
use uuid::Uuid;

const WORLD: &str = "overworld";

struct Catalog;

impl RoleResolver for Catalog {
    fn resolve_role(&self, name: &str) -> Option<RoleIndex> {
        match name {
            "zombie" => Some(3),
            "creeper" => Some(7),
            _ => None,
        }
    }

    fn resolve_group(&self, name: &str) -> Option<Vec<RoleIndex>> {
        (name == "hostile").then(|| vec![3, 7])
    }
}

/// Memory store whose writes start failing after a budget runs out.
struct FlakyStore {
    inner: MemorySuppressionStore,
    writes_left: AtomicUsize,
}

impl FlakyStore {
    fn new(writes: usize) -> Self {
        Self {
            inner: MemorySuppressionStore::new(),
            writes_left: AtomicUsize::new(writes),
        }
    }

    fn heal(&self) {
        self.writes_left.store(usize::MAX, Ordering::SeqCst);
    }

    fn spend(&self) -> Result<(), StoreError> {
        self.writes_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .map(|_| ())
            .map_err(|_| StoreError::Backend("write budget exhausted".into()))
    }
}

impl SuppressionStore for FlakyStore {
    fn chunk_indices(&self) -> Result<Vec<ChunkIndex>, StoreError> {
        self.inner.chunk_indices()
    }

    fn get(&self, chunk: ChunkIndex) -> Result<Option<SuppressionEntry>, StoreError> {
        self.inner.get(chunk)
    }

    fn put(&self, chunk: ChunkIndex, entry: SuppressionEntry) -> Result<(), StoreError> {
        self.spend()?;
        self.inner.put(chunk, entry)
    }

    fn remove(&self, chunk: ChunkIndex) -> Result<(), StoreError> {
        self.spend()?;
        self.inner.remove(chunk)
    }

    fn notify_updated(&self, chunk: ChunkIndex, entry: &SuppressionEntry) -> bool {
        self.inner.notify_updated(chunk, entry)
    }

    fn notify_removed(&self, chunk: ChunkIndex) -> bool {
        self.inner.notify_removed(chunk)
    }
}

fn p(x: f64, y: f64, z: f64) -> Position {
    Position::new(x, y, z)
}

fn scenario_box() -> Boundary {
    Boundary::cuboid(p(-10.0, 0.0, -10.0), p(10.0, 50.0, 10.0)).unwrap()
}

fn box_chunks() -> Vec<ChunkIndex> {
    vec![
        ChunkIndex::new(-1, -1),
        ChunkIndex::new(-1, 0),
        ChunkIndex::new(0, -1),
        ChunkIndex::new(0, 0),
    ]
}

fn foreign_span(min_y: i32) -> SuppressionSpan {
    SuppressionSpan::new(SuppressorId::foreign(Uuid::new_v4()), min_y, min_y + 20, RoleSet::only([1]))
}

fn ctx(role: RoleIndex) -> SpawnContext {
    SpawnContext::new(role, 0, TimeOfDay::Night, 0)
}

// ===== Scenarios =====

#[test]
fn test_box_block_scenario() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);
    let store = MemorySuppressionStore::new();
    let mut sync = SuppressionSynchronizer::new(WORLD);

    let report = sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert_eq!(report.zones_applied, 1);
    assert_eq!(report.chunks_written, 4);

    let snapshot = store.snapshot();
    let mut chunks: Vec<_> = snapshot.keys().copied().collect();
    chunks.sort_by_key(|chunk| (chunk.x(), chunk.z()));
    assert_eq!(chunks, box_chunks());
    for entry in snapshot.values() {
        assert_eq!(
            entry.spans(),
            &[SuppressionSpan::new(SuppressorId::derive(zone.id()), 0, 50, RoleSet::All)]
        );
    }

    let cache = SpawnRuleCache::new(WORLD);
    cache.rebuild(&registry).unwrap();
    for role in [0, 3, 99] {
        assert!(cache.should_block(p(0.0, 25.0, 0.0), &ctx(role)));
    }
}

#[test]
fn test_deny_hostile_scenario() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);
    let store = MemorySuppressionStore::new();
    let mut sync = SuppressionSynchronizer::new(WORLD);
    sync.apply_to_world(&registry, Some(&store)).unwrap();

    registry.set_mode(zone.id(), ZoneMode::Deny).unwrap();
    registry
        .set_filter(zone.id(), ZoneFilter::builder().group("hostile").build().unwrap())
        .unwrap();
    registry.compile_filter(zone.id(), &Catalog).unwrap();
    sync.apply_to_world(&registry, Some(&store)).unwrap();

    let snapshot = store.snapshot();
    assert_eq!(snapshot.len(), 4);
    for entry in snapshot.values() {
        assert_eq!(entry.len(), 1);
        assert_eq!(entry.spans()[0].roles, RoleSet::only([3, 7]));
        assert!(entry.suppresses(3, 25));
        assert!(!entry.suppresses(99, 25));
    }

    let cache = SpawnRuleCache::new(WORLD);
    cache.rebuild(&registry).unwrap();
    assert!(cache.should_block(p(0.0, 25.0, 0.0), &ctx(3)));
    assert!(!cache.should_block(p(0.0, 25.0, 0.0), &ctx(99)));
}

#[test]
fn test_allow_sphere_is_local_only() {
    let registry = ZoneRegistry::new();
    let sphere = Boundary::sphere(p(0.0, 64.0, 0.0), 5.0).unwrap();
    let zone = registry.create_with_mode("garden", WORLD, sphere, ZoneMode::Allow).unwrap();
    registry
        .set_filter(zone.id(), ZoneFilter::builder().role("zombie").build().unwrap())
        .unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    let report = SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();
    assert_eq!(report.zones_applied, 0);
    assert!(store.is_empty());

    let cache = SpawnRuleCache::new(WORLD);
    cache.rebuild(&registry).unwrap();
    assert!(!cache.should_block(p(0.0, 64.0, 0.0), &ctx(3)));
    assert!(cache.should_block(p(0.0, 64.0, 0.0), &ctx(99)));
    assert!(!cache.should_block(p(100.0, 64.0, 0.0), &ctx(3)));
}

#[test]
fn test_deny_with_unresolvable_roles_suppresses_nothing() {
    let registry = ZoneRegistry::new();
    let zone = registry.create_with_mode("typo", WORLD, scenario_box(), ZoneMode::Deny).unwrap();
    registry
        .set_filter(zone.id(), ZoneFilter::builder().role("zombiee").build().unwrap())
        .unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();

    let entry = store.entry(ChunkIndex::new(0, 0)).unwrap();
    assert!(entry.spans()[0].roles.is_nothing());
    assert!(!entry.suppresses(3, 10));
}

#[test]
fn test_deny_without_criteria_denies_everything() {
    let registry = ZoneRegistry::new();
    registry.create_with_mode("all", WORLD, scenario_box(), ZoneMode::Deny).unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();
    assert_eq!(store.entry(ChunkIndex::new(0, 0)).unwrap().spans()[0].roles, RoleSet::All);
}

// ===== Protocol properties =====

#[test]
fn test_apply_twice_is_idempotent() {
    let registry = ZoneRegistry::new();
    registry.create("a", WORLD, scenario_box()).unwrap();
    let b = registry
        .create_with_mode("b", WORLD, Boundary::sphere(p(4.0, 30.0, 4.0), 40.0).unwrap(), ZoneMode::Deny)
        .unwrap();
    registry.set_priority(b.id(), 7).unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    store.put(ChunkIndex::new(0, 0), SuppressionEntry::from_spans(vec![foreign_span(0)])).unwrap();
    let mut sync = SuppressionSynchronizer::new(WORLD);

    sync.apply_to_world(&registry, Some(&store)).unwrap();
    let once = store.snapshot();
    sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert_eq!(store.snapshot(), once);

    // A fresh synchronizer (after a restart) converges to the same state.
    SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();
    assert_eq!(store.snapshot(), once);
}

#[test]
fn test_foreign_spans_untouched() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);

    let shared = ChunkIndex::new(0, 0);
    let elsewhere = ChunkIndex::new(40, 40);
    let low = foreign_span(-20);
    let high = foreign_span(30);
    let store = MemorySuppressionStore::new();
    store.put(shared, SuppressionEntry::from_spans(vec![low.clone(), high.clone()])).unwrap();
    store.put(elsewhere, SuppressionEntry::from_spans(vec![high.clone()])).unwrap();

    let mut sync = SuppressionSynchronizer::new(WORLD);
    sync.apply_to_world(&registry, Some(&store)).unwrap();

    let ours = SuppressionSpan::new(SuppressorId::derive(zone.id()), 0, 50, RoleSet::All);
    assert_eq!(store.entry(shared).unwrap().spans(), &[low.clone(), ours, high.clone()]);
    assert_eq!(store.entry(elsewhere).unwrap().spans(), &[high.clone()]);

    registry.delete(zone.id()).unwrap();
    let report = sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert_eq!(report.spans_removed, 4);
    assert_eq!(report.entries_removed, 3);
    assert_eq!(store.entry(shared).unwrap().spans(), &[low, high.clone()]);
    assert_eq!(store.entry(elsewhere).unwrap().spans(), &[high]);
    assert_eq!(store.len(), 2);
}

#[test]
fn test_restart_removes_stale_derived_spans() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("old", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);
    let store = MemorySuppressionStore::new();
    SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();
    assert_eq!(store.len(), 4);

    registry.delete(zone.id()).unwrap();
    let mut restarted = SuppressionSynchronizer::new(WORLD);
    assert_eq!(restarted.owned_count(), 0);
    restarted.apply_to_world(&registry, Some(&store)).unwrap();
    assert!(store.is_empty());
}

#[test]
fn test_restart_recognises_non_random_zone_ids() {
    let registry = ZoneRegistry::new();
    // Time-based v1 id, as written by older tools.
    let id = Uuid::parse_str("6ba7b810-9dad-11d1-80b4-00c04fd430c8").unwrap();
    registry.load_zones([SpawnZone::with_id(id, "legacy", WORLD, scenario_box())]);
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();
    assert_eq!(store.len(), 4);
    assert!(SuppressorId::derive(id).is_derived());

    registry.load_zones([]);
    let mut restarted = SuppressionSynchronizer::new(WORLD);
    let report = restarted.apply_to_world(&registry, Some(&store)).unwrap();
    assert_eq!(report.spans_removed, 4);
    assert_eq!(store.len(), 0);
}

#[test]
fn test_foreign_v8_spans_survive_fresh_pass() {
    let registry = ZoneRegistry::new();
    let foreign = SuppressionSpan::new(
        SuppressorId::foreign(Uuid::parse_str("01920000-0000-8000-8000-000000000001").unwrap()),
        0,
        64,
        RoleSet::All,
    );
    let chunk = ChunkIndex::new(0, 0);
    let store = MemorySuppressionStore::new();
    store.put(chunk, SuppressionEntry::from_spans(vec![foreign.clone()])).unwrap();

    let report = SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();
    assert_eq!(report.spans_removed, 0);
    assert_eq!(store.entry(chunk).unwrap().spans(), &[foreign]);
}

#[test]
fn test_owned_set_tracks_last_pass() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    let mut sync = SuppressionSynchronizer::new(WORLD);
    sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert!(sync.owns(SuppressorId::derive(zone.id())));

    registry.delete(zone.id()).unwrap();
    sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert!(store.is_empty());
    assert_eq!(sync.owned_count(), 0);
}

#[test]
fn test_moved_zone_leaves_old_world_store() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("traveller", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);

    let overworld = MemorySuppressionStore::new();
    let nether = MemorySuppressionStore::new();
    let mut overworld_sync = SuppressionSynchronizer::new(WORLD);
    let mut nether_sync = SuppressionSynchronizer::new("nether");
    overworld_sync.apply_to_world(&registry, Some(&overworld)).unwrap();

    registry.update_world(zone.id(), "nether").unwrap();
    overworld_sync.apply_to_world(&registry, Some(&overworld)).unwrap();
    nether_sync.apply_to_world(&registry, Some(&nether)).unwrap();

    assert!(overworld.is_empty());
    assert_eq!(nether.len(), 4);
}

#[test]
fn test_spans_sorted_by_min_y_within_chunk() {
    let registry = ZoneRegistry::new();
    let deep = registry
        .create("deep", WORLD, Boundary::cuboid(p(0.0, -40.0, 0.0), p(5.0, -10.0, 5.0)).unwrap())
        .unwrap();
    let shallow = registry
        .create("shallow", WORLD, Boundary::cuboid(p(0.0, 60.0, 0.0), p(5.0, 80.0, 5.0)).unwrap())
        .unwrap();
    registry.set_priority(shallow.id(), 100).unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    SuppressionSynchronizer::new(WORLD)
        .apply_to_world(&registry, Some(&store))
        .unwrap();

    let entry = store.entry(ChunkIndex::new(0, 0)).unwrap();
    let owners: Vec<_> = entry.spans().iter().map(|span| span.suppressor).collect();
    assert_eq!(
        owners,
        vec![SuppressorId::derive(deep.id()), SuppressorId::derive(shallow.id())]
    );
}

// ===== Failure handling =====

#[test]
fn test_store_failure_keeps_attempted_ids_owned() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);

    let store = FlakyStore::new(2);
    let mut sync = SuppressionSynchronizer::new(WORLD);
    let err = sync.apply_to_world(&registry, Some(&store)).unwrap_err();
    assert!(matches!(err, SyncError::Store(StoreError::Backend(_))));
    assert!(sync.owns(SuppressorId::derive(zone.id())));
    assert_eq!(store.inner.len(), 2);

    store.heal();
    sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert_eq!(store.inner.len(), 4);
    for entry in store.inner.snapshot().values() {
        assert_eq!(entry.len(), 1);
    }
}

#[test]
fn test_unavailable_store_is_reported_not_fatal() {
    let registry = ZoneRegistry::new();
    registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);

    let mut sync = SuppressionSynchronizer::new(WORLD);
    let report = sync.apply_to_world(&registry, None).unwrap();
    assert!(!report.store_available);
    assert_eq!(sync.owned_count(), 0);

    let cache = SpawnRuleCache::new(WORLD);
    cache.rebuild(&registry).unwrap();
    assert!(cache.should_block(p(0.0, 25.0, 0.0), &ctx(3)));
}

// ===== Notifications =====

#[test]
fn test_loaded_chunks_are_notified() {
    let registry = ZoneRegistry::new();
    let zone = registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    store.load_chunk(ChunkIndex::new(0, 0));
    let mut sync = SuppressionSynchronizer::new(WORLD);

    let report = sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert_eq!(report.notified, 1);
    assert_eq!(store.drain_notifications(), vec![Notification::Updated(ChunkIndex::new(0, 0))]);

    registry.delete(zone.id()).unwrap();
    sync.apply_to_world(&registry, Some(&store)).unwrap();
    assert_eq!(store.drain_notifications(), vec![Notification::Removed(ChunkIndex::new(0, 0))]);
}

#[test]
fn test_apply_to_chunk_resignals_existing_entry() {
    let registry = ZoneRegistry::new();
    registry.create("spawn", WORLD, scenario_box()).unwrap();
    registry.compile_all_filters(&Catalog);

    let store = MemorySuppressionStore::new();
    let mut sync = SuppressionSynchronizer::new(WORLD);
    sync.apply_to_world(&registry, Some(&store)).unwrap();
    let before = store.snapshot();

    let chunk = ChunkIndex::new(-1, 0);
    store.load_chunk(chunk);
    assert!(sync.apply_to_chunk(Some(&store), chunk).unwrap());
    assert_eq!(store.drain_notifications(), vec![Notification::Updated(chunk)]);

    let empty = ChunkIndex::new(9, 9);
    store.load_chunk(empty);
    assert!(!sync.apply_to_chunk(Some(&store), empty).unwrap());
    assert_eq!(store.snapshot(), before);
}
