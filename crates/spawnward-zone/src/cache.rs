//! Per-world spawn rule cache.
//!
//! Answers spawn questions locally for every zone mode, including the ones
//! the external suppression store cannot represent (ALLOW, MODIFY, REPLACE).
//! The cache maps each chunk to the spans of zones intersecting it, sorted by
//! priority (highest first) and then by lowest Y. A rebuild computes a whole
//! new map and swaps it in, so queries see either the old rules or the new
//! ones, never a mix.

use std::sync::Arc;

use hashbrown::HashMap;
use parking_lot::RwLock;
use rustc_hash::FxBuildHasher;
use smallvec::SmallVec;
use spawnward_spatial::{Boundary, ChunkIndex, Position};
use uuid::Uuid;

use crate::error::ZoneResult;
use crate::filter::{CompiledFilter, SpawnContext};
use crate::mode::ZoneMode;
use crate::registry::ZoneRegistry;

#[derive(Debug, Clone)]
struct CachedSpan {
    zone: Uuid,
    priority: i32,
    min_y: i32,
    boundary: Boundary,
    mode: ZoneMode,
    filter: Arc<CompiledFilter>,
    rate_multiplier: f64,
    substitute: Option<Arc<str>>,
}

type SpanList = SmallVec<[CachedSpan; 4]>;
type SpanMap = HashMap<ChunkIndex, SpanList, FxBuildHasher>;

#[derive(Debug, Default)]
struct Rules {
    zones: usize,
    chunks: SpanMap,
}

/// Cache size counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub zones: usize,
    pub chunks: usize,
    pub spans: usize,
}

/// Read-optimized mirror of one world's zones.
#[derive(Debug)]
pub struct SpawnRuleCache {
    world: String,
    rules: RwLock<Arc<Rules>>,
}

impl SpawnRuleCache {
    #[must_use]
    pub fn new(world: impl Into<String>) -> Self {
        Self {
            world: world.into(),
            rules: RwLock::new(Arc::default()),
        }
    }

    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    /// Rebuild from the registry's enabled zones in this world.
    ///
    /// Fails with [`crate::ZoneError::FilterNotCompiled`] if any enabled zone is
    /// uncompiled; the previous rules stay in place in that case.
    pub fn rebuild(&self, registry: &ZoneRegistry) -> ZoneResult<CacheStats> {
        let mut map = SpanMap::default();
        let mut zones = 0;

        for zone in registry.zones_in_world(&self.world) {
            if !zone.is_enabled() {
                continue;
            }
            let filter = Arc::clone(zone.compiled_filter()?);
            let substitute: Option<Arc<str>> = zone.substitute().map(Arc::from);
            let (min_y, _) = zone.y_range();
            let boundary = *zone.boundary();
            zones += 1;

            for (cx, cz) in boundary.chunk_range().iter() {
                if !boundary.intersects_chunk(cx, cz) {
                    continue;
                }
                map.entry(ChunkIndex::new(cx, cz)).or_default().push(CachedSpan {
                    zone: zone.id(),
                    priority: zone.priority(),
                    min_y,
                    boundary,
                    mode: zone.mode(),
                    filter: Arc::clone(&filter),
                    rate_multiplier: zone.rate_multiplier(),
                    substitute: substitute.clone(),
                });
            }
        }

        for spans in map.values_mut() {
            spans.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then(a.min_y.cmp(&b.min_y))
                    .then(a.zone.cmp(&b.zone))
            });
        }

        let rules = Arc::new(Rules { zones, chunks: map });
        let stats = rules.stats();
        *self.rules.write() = rules;
        tracing::debug!(world = %self.world, zones = stats.zones, chunks = stats.chunks, "rebuilt spawn rule cache");
        Ok(stats)
    }

    /// Drop every rule.
    pub fn clear(&self) {
        *self.rules.write() = Arc::default();
    }

    fn snapshot(&self) -> Arc<Rules> {
        Arc::clone(&self.rules.read())
    }

    /// Spans at `pos` whose boundary contains it, in evaluation order.
    fn for_each_containing(&self, pos: Position, mut visit: impl FnMut(&CachedSpan) -> bool) {
        let rules = self.snapshot();
        let Some(spans) = rules.chunks.get(&pos.chunk()) else {
            return;
        };
        for span in spans {
            if span.boundary.contains(pos) && !visit(span) {
                return;
            }
        }
    }

    /// Whether a spawn at `pos` is blocked.
    ///
    /// The first span that decides wins: BLOCK blocks, DENY blocks a matching
    /// spawn, ALLOW blocks a non-matching spawn and permits a matching one.
    #[must_use]
    pub fn should_block(&self, pos: Position, ctx: &SpawnContext) -> bool {
        let y = pos.block_y();
        let mut blocked = false;
        self.for_each_containing(pos, |span| match span.mode {
            ZoneMode::Block => {
                blocked = true;
                false
            }
            ZoneMode::Deny if span.filter.matches(ctx, y) => {
                blocked = true;
                false
            }
            ZoneMode::Allow => {
                blocked = !span.filter.matches(ctx, y);
                false
            }
            _ => true,
        });
        blocked
    }

    /// Product of the multipliers of every matching MODIFY span at `pos`.
    #[must_use]
    pub fn rate_multiplier(&self, pos: Position, ctx: &SpawnContext) -> f64 {
        let y = pos.block_y();
        let mut product = 1.0;
        self.for_each_containing(pos, |span| {
            if span.mode == ZoneMode::Modify && span.filter.matches(ctx, y) {
                product *= span.rate_multiplier;
            }
            true
        });
        product
    }

    /// Substitute of the first matching REPLACE span at `pos`.
    #[must_use]
    pub fn substitute_for(&self, pos: Position, ctx: &SpawnContext) -> Option<Arc<str>> {
        let y = pos.block_y();
        let mut found = None;
        self.for_each_containing(pos, |span| {
            if span.mode == ZoneMode::Replace && span.filter.matches(ctx, y) {
                if let Some(substitute) = &span.substitute {
                    found = Some(Arc::clone(substitute));
                    return false;
                }
            }
            true
        });
        found
    }

    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.snapshot().stats()
    }
}

impl Rules {
    fn stats(&self) -> CacheStats {
        CacheStats {
            zones: self.zones,
            chunks: self.chunks.len(),
            spans: self.chunks.values().map(SmallVec::len).sum(),
        }
    }
}
