//! The spawn zone entity.

use std::sync::Arc;

use spawnward_spatial::{Boundary, Position};
use uuid::Uuid;

use crate::error::ZoneError;
use crate::filter::{CompiledFilter, RoleResolver, ZoneFilter};
use crate::mode::ZoneMode;

/// Upper bound for a zone's rate multiplier.
pub const MAX_RATE_MULTIPLIER: f64 = 10.0;

/// Clamp a rate multiplier into `[0, MAX_RATE_MULTIPLIER]`. NaN becomes 1.
#[must_use]
pub fn clamp_rate_multiplier(value: f64) -> f64 {
    if value.is_nan() { 1.0 } else { value.clamp(0.0, MAX_RATE_MULTIPLIER) }
}

/// A named region of one world that influences spawning.
///
/// Zones held by the registry are immutable snapshots behind `Arc`; every
/// mutation goes through [`crate::ZoneRegistry`], which swaps in an updated copy.
#[derive(Debug, Clone)]
pub struct SpawnZone {
    pub(crate) id: Uuid,
    pub(crate) name: String,
    pub(crate) world: String,
    pub(crate) boundary: Boundary,
    pub(crate) mode: ZoneMode,
    pub(crate) filter: ZoneFilter,
    pub(crate) compiled: Option<Arc<CompiledFilter>>,
    pub(crate) priority: i32,
    pub(crate) enabled: bool,
    pub(crate) rate_multiplier: f64,
    pub(crate) substitute: Option<String>,
}

impl SpawnZone {
    /// New zone with a fresh random id and default settings.
    pub fn new(name: impl Into<String>, world: impl Into<String>, boundary: Boundary) -> Self {
        Self::with_id(Uuid::new_v4(), name, world, boundary)
    }

    /// Zone with a known id, e.g. when restoring from disk.
    pub fn with_id(id: Uuid, name: impl Into<String>, world: impl Into<String>, boundary: Boundary) -> Self {
        Self {
            id,
            name: name.into(),
            world: world.into(),
            boundary,
            mode: ZoneMode::default(),
            filter: ZoneFilter::new(),
            compiled: None,
            priority: 0,
            enabled: true,
            rate_multiplier: 1.0,
            substitute: None,
        }
    }

    pub fn with_mode(mut self, mode: ZoneMode) -> Self {
        self.mode = mode;
        self
    }

    /// Replace the filter. The zone must be compiled again afterwards.
    pub fn with_filter(mut self, filter: ZoneFilter) -> Self {
        self.filter = filter;
        self.compiled = None;
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_rate_multiplier(mut self, multiplier: f64) -> Self {
        self.rate_multiplier = clamp_rate_multiplier(multiplier);
        self
    }

    pub fn with_substitute(mut self, substitute: Option<String>) -> Self {
        self.substitute = substitute;
        self
    }

    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn world(&self) -> &str {
        &self.world
    }

    #[must_use]
    pub const fn boundary(&self) -> &Boundary {
        &self.boundary
    }

    #[must_use]
    pub const fn mode(&self) -> ZoneMode {
        self.mode
    }

    #[must_use]
    pub const fn filter(&self) -> &ZoneFilter {
        &self.filter
    }

    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.priority
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    #[must_use]
    pub const fn rate_multiplier(&self) -> f64 {
        self.rate_multiplier
    }

    #[must_use]
    pub fn substitute(&self) -> Option<&str> {
        self.substitute.as_deref()
    }

    #[must_use]
    pub const fn is_compiled(&self) -> bool {
        self.compiled.is_some()
    }

    /// Compiled filter, or [`ZoneError::FilterNotCompiled`] if the filter changed since the last compile.
    pub fn compiled_filter(&self) -> Result<&Arc<CompiledFilter>, ZoneError> {
        self.compiled
            .as_ref()
            .ok_or_else(|| ZoneError::FilterNotCompiled(self.name.clone()))
    }

    /// Compile the filter in place.
    pub fn compile_filter(&mut self, resolver: &dyn RoleResolver) {
        self.compiled = Some(Arc::new(self.filter.compile(resolver)));
    }

    /// Compile and return the zone, builder style.
    pub fn compiled_with(mut self, resolver: &dyn RoleResolver) -> Self {
        self.compile_filter(resolver);
        self
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, pos: Position) -> bool {
        self.boundary.contains(pos)
    }

    /// Inclusive integer height range covered by the boundary.
    #[must_use]
    pub fn y_range(&self) -> (i32, i32) {
        self.boundary.block_y_range()
    }
}
