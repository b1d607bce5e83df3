//! Zone to suppression store reconciliation.
//!
//! A pass over one world runs in three steps:
//!
//! ```text
//!   plan   enabled BLOCK/DENY zones ──► spans per chunk     (no writes; may fail)
//!   clear  every store entry ──► drop spans we own          (remove or rewrite)
//!   apply  planned spans ──► append to entry, sort by min_y (write + notify)
//! ```
//!
//! A span is ours when its suppressor id carries the derived prefix (see
//! [`SuppressorId`]) or was written by an earlier pass of this synchronizer. Spans of other writers
//! are never touched. Running a pass twice without zone changes leaves the
//! store exactly as one pass does.

use std::collections::BTreeMap;
use std::fmt;

use hashbrown::{HashMap, HashSet};
use rustc_hash::FxBuildHasher;
use spawnward_spatial::ChunkIndex;
use spawnward_zone::{RoleSet, SpawnZone, ZoneMode, ZoneRegistry};
use uuid::Uuid;

use crate::error::{StoreError, SyncError};
use crate::id::SuppressorId;
use crate::span::SuppressionSpan;
use crate::store::SuppressionStore;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub world: String,
    /// False when no store was available and nothing was written.
    pub store_available: bool,
    pub zones_applied: usize,
    pub spans_removed: usize,
    pub entries_removed: usize,
    pub spans_written: usize,
    pub chunks_written: usize,
    /// Loaded chunks that received an update or removal notice.
    pub notified: usize,
}

impl SyncReport {
    fn new(world: &str) -> Self {
        Self {
            world: world.to_owned(),
            ..Self::default()
        }
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.store_available {
            return write!(f, "{}: suppression store unavailable", self.world);
        }
        write!(
            f,
            "{}: {} zones, {} spans in {} chunks written, {} stale spans removed ({} entries dropped), {} loaded chunks notified",
            self.world,
            self.zones_applied,
            self.spans_written,
            self.chunks_written,
            self.spans_removed,
            self.entries_removed,
            self.notified
        )
    }
}

#[derive(Default)]
struct Plan {
    zones: Vec<SuppressorId>,
    chunks: BTreeMap<ChunkIndex, Vec<SuppressionSpan>>,
}

/// Keeps one world's entries in a suppression store in line with its zones.
///
/// Passes for one world must not overlap; callers serialize them, typically
/// by holding the synchronizer behind a mutex.
#[derive(Debug)]
pub struct SuppressionSynchronizer {
    world: String,
    owned: HashSet<SuppressorId, FxBuildHasher>,
}

impl SuppressionSynchronizer {
    #[must_use]
    pub fn new(world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            owned: HashSet::default(),
        }
    }

    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Number of suppressor ids written by the last successful pass (plus any
    /// left over from failed passes).
    #[must_use]
    pub fn owned_count(&self) -> usize {
        self.owned.len()
    }

    #[must_use]
    pub fn owns(&self, id: SuppressorId) -> bool {
        self.owned.contains(&id)
    }

    fn is_ours(&self, id: SuppressorId) -> bool {
        id.is_derived() || self.owned.contains(&id)
    }

    /// Reconcile the store with the registry's zones for this world.
    ///
    /// With no store, logs a warning and returns a report with
    /// `store_available == false`. A zone that cannot be planned fails the pass
    /// before anything is written. A store failure abandons the pass; every id
    /// it may have written stays remembered so the next pass removes it.
    pub fn apply_to_world(
        &mut self,
        registry: &ZoneRegistry,
        store: Option<&dyn SuppressionStore>,
    ) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(&self.world);
        let Some(store) = store else {
            tracing::warn!(world = %self.world, "suppression store unavailable; zones apply through the local cache only");
            return Ok(report);
        };
        report.store_available = true;

        let plan = self.plan(registry)?;
        report.zones_applied = plan.zones.len();

        let result = self
            .clear_phase(store, &mut report)
            .and_then(|()| Self::apply_phase(store, plan.chunks, &mut report));

        match result {
            Ok(()) => {
                self.owned = plan.zones.into_iter().collect();
                tracing::info!(%report, "reconciled suppression store");
                Ok(report)
            }
            Err(e) => {
                self.owned.extend(plan.zones);
                tracing::warn!(world = %self.world, error = %e, "suppression reconciliation failed");
                Err(e.into())
            }
        }
    }

    /// Remove every span this synchronizer owns, e.g. when the world goes away.
    pub fn clear_world(&mut self, store: Option<&dyn SuppressionStore>) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::new(&self.world);
        let Some(store) = store else {
            tracing::warn!(world = %self.world, "suppression store unavailable; nothing cleared");
            return Ok(report);
        };
        report.store_available = true;
        self.clear_phase(store, &mut report)?;
        self.owned.clear();
        tracing::info!(%report, "cleared suppression store");
        Ok(report)
    }

    /// Re-signal the existing entry of a chunk that just became active.
    ///
    /// Spans are not recomputed. Returns whether a notification was delivered.
    pub fn apply_to_chunk(&self, store: Option<&dyn SuppressionStore>, chunk: ChunkIndex) -> Result<bool, SyncError> {
        let Some(store) = store else {
            return Ok(false);
        };
        let Some(entry) = store.get(chunk)? else {
            return Ok(false);
        };
        let delivered = store.notify_updated(chunk, &entry);
        tracing::trace!(world = %self.world, %chunk, delivered, "re-signalled chunk entry");
        Ok(delivered)
    }

    /// Spans for every enabled zone the store can express, highest priority first.
    fn plan(&self, registry: &ZoneRegistry) -> Result<Plan, SyncError> {
        let mut zones: Vec<_> = registry
            .zones_in_world(&self.world)
            .into_iter()
            .filter(|zone| zone.is_enabled() && zone.mode().is_store_expressible())
            .collect();
        zones.sort_by(|a, b| b.priority().cmp(&a.priority()).then_with(|| a.id().cmp(&b.id())));

        let mut plan = Plan::default();
        let mut claimed: HashMap<SuppressorId, Uuid, FxBuildHasher> = HashMap::default();
        for zone in &zones {
            let roles = self.role_set(zone)?;
            let suppressor = SuppressorId::derive(zone.id());
            claim(&mut claimed, suppressor, zone.id())?;
            let (min_y, max_y) = zone.y_range();
            let boundary = zone.boundary();

            let mut chunks = 0_usize;
            for (cx, cz) in boundary.chunk_range().iter() {
                if !boundary.intersects_chunk(cx, cz) {
                    continue;
                }
                plan.chunks
                    .entry(ChunkIndex::new(cx, cz))
                    .or_default()
                    .push(SuppressionSpan::new(suppressor, min_y, max_y, roles.clone()));
                chunks += 1;
            }
            tracing::debug!(world = %self.world, zone = %zone.name(), %roles, chunks, "planned zone spans");
            plan.zones.push(suppressor);
        }
        Ok(plan)
    }

    fn role_set(&self, zone: &SpawnZone) -> Result<RoleSet, SyncError> {
        if zone.mode() == ZoneMode::Block {
            return Ok(RoleSet::All);
        }

        let compiled = zone.compiled_filter()?;
        if compiled.roles().is_nothing() {
            tracing::warn!(
                world = %self.world,
                zone = %zone.name(),
                "deny zone's role criteria resolve to no roles; it suppresses nothing"
            );
        }
        if zone.filter().has_environment_criteria() {
            tracing::debug!(
                world = %self.world,
                zone = %zone.name(),
                "environment criteria are not stored; store spans cover every environment"
            );
        }
        Ok(compiled.roles().clone())
    }

    fn clear_phase(&self, store: &dyn SuppressionStore, report: &mut SyncReport) -> Result<(), StoreError> {
        let mut chunks = store.chunk_indices()?;
        chunks.sort_unstable();

        for chunk in chunks {
            let Some(mut entry) = store.get(chunk)? else {
                continue;
            };
            let removed = entry.remove_where(|span| self.is_ours(span.suppressor));
            if removed == 0 {
                continue;
            }
            report.spans_removed += removed;

            if entry.is_empty() {
                store.remove(chunk)?;
                report.entries_removed += 1;
                if store.notify_removed(chunk) {
                    report.notified += 1;
                }
            } else {
                store.put(chunk, entry.clone())?;
                if store.notify_updated(chunk, &entry) {
                    report.notified += 1;
                }
            }
        }
        Ok(())
    }

    fn apply_phase(
        store: &dyn SuppressionStore,
        chunks: BTreeMap<ChunkIndex, Vec<SuppressionSpan>>,
        report: &mut SyncReport,
    ) -> Result<(), StoreError> {
        for (chunk, spans) in chunks {
            let mut entry = store.get(chunk)?.unwrap_or_default();
            report.spans_written += spans.len();
            entry.extend(spans);
            store.put(chunk, entry.clone())?;
            report.chunks_written += 1;
            if store.notify_updated(chunk, &entry) {
                report.notified += 1;
            }
        }
        Ok(())
    }
}

/// Record that `zone` writes under `suppressor`, failing if another zone already does.
fn claim(
    claimed: &mut HashMap<SuppressorId, Uuid, FxBuildHasher>,
    suppressor: SuppressorId,
    zone: Uuid,
) -> Result<(), SyncError> {
    match claimed.insert(suppressor, zone) {
        Some(first) if first != zone => Err(SyncError::SuppressorCollision {
            suppressor,
            first,
            second: zone,
        }),
        _ => Ok(()),
    }
}
