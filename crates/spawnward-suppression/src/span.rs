//! Suppression spans and per-chunk entries.

use spawnward_zone::{RoleIndex, RoleSet};

use crate::id::SuppressorId;

/// One writer's suppression rule inside a chunk column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuppressionSpan {
    pub suppressor: SuppressorId,
    /// Lowest suppressed block height (inclusive).
    pub min_y: i32,
    /// Highest suppressed block height (inclusive).
    pub max_y: i32,
    pub roles: RoleSet,
}

impl SuppressionSpan {
    #[must_use]
    pub const fn new(suppressor: SuppressorId, min_y: i32, max_y: i32, roles: RoleSet) -> Self {
        Self {
            suppressor,
            min_y,
            max_y,
            roles,
        }
    }

    /// Whether this span stops `role` from spawning at height `y`.
    #[must_use]
    pub fn suppresses(&self, role: RoleIndex, y: i32) -> bool {
        y >= self.min_y && y <= self.max_y && self.roles.contains(role)
    }
}

/// Everything the store holds for one chunk, ordered by ascending `min_y`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppressionEntry {
    spans: Vec<SuppressionSpan>,
}

impl SuppressionEntry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entry holding `spans`, sorted by `min_y` (stable).
    #[must_use]
    pub fn from_spans(mut spans: Vec<SuppressionSpan>) -> Self {
        spans.sort_by_key(|span| span.min_y);
        Self { spans }
    }

    #[must_use]
    pub fn spans(&self) -> &[SuppressionSpan] {
        &self.spans
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Add spans and restore the ordering. Spans with equal `min_y` keep insertion order.
    pub fn extend(&mut self, spans: impl IntoIterator<Item = SuppressionSpan>) {
        self.spans.extend(spans);
        self.spans.sort_by_key(|span| span.min_y);
    }

    /// Drop every span `remove` selects. Returns how many were dropped.
    pub fn remove_where(&mut self, mut remove: impl FnMut(&SuppressionSpan) -> bool) -> usize {
        let before = self.spans.len();
        self.spans.retain(|span| !remove(span));
        before - self.spans.len()
    }

    /// Whether any span stops `role` at height `y`.
    #[must_use]
    pub fn suppresses(&self, role: RoleIndex, y: i32) -> bool {
        self.spans.iter().any(|span| span.suppresses(role, y))
    }
}
