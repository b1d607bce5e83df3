//! Zone filters and filter compilation.
//!
//! A [`ZoneFilter`] is the declarative form an operator edits: role names,
//! role group names and environment bounds. Before a zone takes part in spawn
//! decisions its filter is compiled against a [`RoleResolver`] into a
//! [`CompiledFilter`], which answers role membership with a hash lookup and the
//! environment test with a handful of comparisons and bit tests.
//!
//! Role compilation keeps two empty states apart:
//!
//! ```text
//!   no role or group criteria        ──► RoleSet::All      (matches every role)
//!   criteria, none of them resolve   ──► RoleSet::Only({}) (matches no role)
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use hashbrown::HashSet;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};

use crate::error::{FilterError, ParseError};

/// Index of an entity role in the host's catalog.
pub type RoleIndex = u32;

/// Set of resolved role indices.
pub type RoleIndexSet = HashSet<RoleIndex, FxBuildHasher>;

/// Highest valid light level.
pub const MAX_LIGHT: u8 = 15;

/// Number of moon phases.
pub const MOON_PHASES: u8 = 8;

/// Resolves role and role group names to catalog indices.
///
/// Implemented by the host environment. Both lookups must be pure: the same
/// name resolves the same way until the catalog is reloaded.
pub trait RoleResolver: Send + Sync {
    /// Index of a single role, if the name is known.
    fn resolve_role(&self, name: &str) -> Option<RoleIndex>;

    /// Member indices of a role group, if the group is known.
    fn resolve_group(&self, name: &str) -> Option<Vec<RoleIndex>>;
}

/// Phase of the day cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Day,
    Night,
    Dawn,
    Dusk,
}

impl TimeOfDay {
    pub const ALL: [Self; 4] = [Self::Day, Self::Night, Self::Dawn, Self::Dusk];

    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Night => "night",
            Self::Dawn => "dawn",
            Self::Dusk => "dusk",
        }
    }

    #[inline]
    const fn bit(self) -> u8 {
        1 << (self as u8)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for TimeOfDay {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|time| time.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseError {
                kind: "time of day",
                value: s.to_owned(),
            })
    }
}

/// Declarative spawn filter. Absent criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneFilter {
    roles: BTreeSet<String>,
    groups: BTreeSet<String>,
    min_light: Option<u8>,
    max_light: Option<u8>,
    min_y: Option<i32>,
    max_y: Option<i32>,
    times: BTreeSet<TimeOfDay>,
    moon_phases: BTreeSet<u8>,
}

impl ZoneFilter {
    /// Filter with no criteria.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> ZoneFilterBuilder {
        ZoneFilterBuilder::default()
    }

    /// Builder seeded with this filter's criteria.
    #[must_use]
    pub fn to_builder(&self) -> ZoneFilterBuilder {
        ZoneFilterBuilder { filter: self.clone() }
    }

    /// True when no criterion of any kind is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        !self.has_role_criteria() && !self.has_environment_criteria()
    }

    #[must_use]
    pub fn has_role_criteria(&self) -> bool {
        !self.roles.is_empty() || !self.groups.is_empty()
    }

    #[must_use]
    pub fn has_environment_criteria(&self) -> bool {
        self.min_light.is_some()
            || self.max_light.is_some()
            || self.min_y.is_some()
            || self.max_y.is_some()
            || !self.times.is_empty()
            || !self.moon_phases.is_empty()
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.roles.iter().map(String::as_str)
    }

    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().map(String::as_str)
    }

    #[must_use]
    pub const fn min_light(&self) -> Option<u8> {
        self.min_light
    }

    #[must_use]
    pub const fn max_light(&self) -> Option<u8> {
        self.max_light
    }

    #[must_use]
    pub const fn min_y(&self) -> Option<i32> {
        self.min_y
    }

    #[must_use]
    pub const fn max_y(&self) -> Option<i32> {
        self.max_y
    }

    pub fn times(&self) -> impl Iterator<Item = TimeOfDay> + '_ {
        self.times.iter().copied()
    }

    pub fn moon_phases(&self) -> impl Iterator<Item = u8> + '_ {
        self.moon_phases.iter().copied()
    }

    /// Resolve names and pack environment criteria.
    ///
    /// Unknown role and group names are dropped. Compiling the same filter
    /// against the same resolver always yields an equal result.
    #[must_use]
    pub fn compile(&self, resolver: &dyn RoleResolver) -> CompiledFilter {
        let roles = if self.has_role_criteria() {
            let mut resolved = RoleIndexSet::default();
            for name in &self.roles {
                if let Some(index) = resolver.resolve_role(name) {
                    resolved.insert(index);
                } else {
                    tracing::debug!(role = %name, "unknown role dropped from filter");
                }
            }
            for name in &self.groups {
                if let Some(members) = resolver.resolve_group(name) {
                    resolved.extend(members);
                } else {
                    tracing::debug!(group = %name, "unknown role group dropped from filter");
                }
            }
            RoleSet::Only(Arc::new(resolved))
        } else {
            RoleSet::All
        };

        CompiledFilter {
            roles,
            min_light: self.min_light,
            max_light: self.max_light,
            min_y: self.min_y,
            max_y: self.max_y,
            times: self.times.iter().fold(0, |mask, time| mask | time.bit()),
            moon_phases: self.moon_phases.iter().fold(0, |mask, &phase| mask | (1_u8 << phase)),
        }
    }
}

/// Builder for [`ZoneFilter`].
#[derive(Debug, Clone, Default)]
pub struct ZoneFilterBuilder {
    filter: ZoneFilter,
}

impl ZoneFilterBuilder {
    pub fn role(mut self, name: impl Into<String>) -> Self {
        self.filter.roles.insert(name.into());
        self
    }

    pub fn roles<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.roles.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn group(mut self, name: impl Into<String>) -> Self {
        self.filter.groups.insert(name.into());
        self
    }

    pub fn groups<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filter.groups.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn min_light(mut self, level: u8) -> Self {
        self.filter.min_light = Some(level);
        self
    }

    pub fn max_light(mut self, level: u8) -> Self {
        self.filter.max_light = Some(level);
        self
    }

    pub fn min_y(mut self, y: i32) -> Self {
        self.filter.min_y = Some(y);
        self
    }

    pub fn max_y(mut self, y: i32) -> Self {
        self.filter.max_y = Some(y);
        self
    }

    pub fn time(mut self, time: TimeOfDay) -> Self {
        self.filter.times.insert(time);
        self
    }

    pub fn times(mut self, times: impl IntoIterator<Item = TimeOfDay>) -> Self {
        self.filter.times.extend(times);
        self
    }

    pub fn moon_phase(mut self, phase: u8) -> Self {
        self.filter.moon_phases.insert(phase);
        self
    }

    pub fn moon_phases(mut self, phases: impl IntoIterator<Item = u8>) -> Self {
        self.filter.moon_phases.extend(phases);
        self
    }

    /// Drop every role and group criterion.
    pub fn clear_roles(mut self) -> Self {
        self.filter.roles.clear();
        self.filter.groups.clear();
        self
    }

    /// Validate ranges and produce the filter.
    pub fn build(self) -> Result<ZoneFilter, FilterError> {
        let filter = self.filter;
        for level in [filter.min_light, filter.max_light].into_iter().flatten() {
            if level > MAX_LIGHT {
                return Err(FilterError::LightOutOfRange(level));
            }
        }
        if let Some(&phase) = filter.moon_phases.iter().find(|&&phase| phase >= MOON_PHASES) {
            return Err(FilterError::MoonPhaseOutOfRange(phase));
        }
        Ok(filter)
    }
}

/// Resolved role criterion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleSet {
    /// Matches every role.
    All,
    /// Matches exactly the listed roles. May be empty.
    Only(Arc<RoleIndexSet>),
}

impl RoleSet {
    pub fn only(indices: impl IntoIterator<Item = RoleIndex>) -> Self {
        Self::Only(Arc::new(indices.into_iter().collect()))
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, role: RoleIndex) -> bool {
        match self {
            Self::All => true,
            Self::Only(set) => set.contains(&role),
        }
    }

    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// True for an explicit set with no members.
    #[must_use]
    pub fn is_nothing(&self) -> bool {
        matches!(self, Self::Only(set) if set.is_empty())
    }

    /// Members in ascending order, or `None` for [`RoleSet::All`].
    #[must_use]
    pub fn sorted(&self) -> Option<Vec<RoleIndex>> {
        match self {
            Self::All => None,
            Self::Only(set) => {
                let mut members: Vec<_> = set.iter().copied().collect();
                members.sort_unstable();
                Some(members)
            }
        }
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sorted() {
            None => f.write_str("ALL"),
            Some(members) => write!(f, "{members:?}"),
        }
    }
}

/// Conditions of a single spawn attempt, apart from its position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnContext {
    pub role: RoleIndex,
    pub light: u8,
    pub time: TimeOfDay,
    pub moon_phase: u8,
}

impl SpawnContext {
    #[must_use]
    pub const fn new(role: RoleIndex, light: u8, time: TimeOfDay, moon_phase: u8) -> Self {
        Self {
            role,
            light,
            time,
            moon_phase,
        }
    }
}

/// Runtime form of a [`ZoneFilter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    roles: RoleSet,
    min_light: Option<u8>,
    max_light: Option<u8>,
    min_y: Option<i32>,
    max_y: Option<i32>,
    /// Bit per [`TimeOfDay`]; zero means any time.
    times: u8,
    /// Bit per moon phase; zero means any phase.
    moon_phases: u8,
}

impl CompiledFilter {
    /// Filter that matches every role in every environment.
    #[must_use]
    pub const fn match_all() -> Self {
        Self {
            roles: RoleSet::All,
            min_light: None,
            max_light: None,
            min_y: None,
            max_y: None,
            times: 0,
            moon_phases: 0,
        }
    }

    #[must_use]
    pub const fn roles(&self) -> &RoleSet {
        &self.roles
    }

    #[inline]
    #[must_use]
    pub fn matches_role(&self, role: RoleIndex) -> bool {
        self.roles.contains(role)
    }

    /// Conjunction of every environment criterion that is set.
    #[inline]
    #[must_use]
    pub fn matches_environment(&self, light: u8, y: i32, time: TimeOfDay, moon_phase: u8) -> bool {
        if self.min_light.is_some_and(|min| light < min) || self.max_light.is_some_and(|max| light > max) {
            return false;
        }
        if self.min_y.is_some_and(|min| y < min) || self.max_y.is_some_and(|max| y > max) {
            return false;
        }
        if self.times != 0 && self.times & time.bit() == 0 {
            return false;
        }
        if self.moon_phases != 0 && (moon_phase >= MOON_PHASES || self.moon_phases & (1 << moon_phase) == 0) {
            return false;
        }
        true
    }

    /// Role and environment test for a spawn at height `y`.
    #[inline]
    #[must_use]
    pub fn matches(&self, ctx: &SpawnContext, y: i32) -> bool {
        self.matches_role(ctx.role) && self.matches_environment(ctx.light, y, ctx.time, ctx.moon_phase)
    }

    /// True when no criterion restricts anything.
    #[must_use]
    pub fn is_match_all(&self) -> bool {
        *self == Self::match_all()
    }
}

#[cfg(test)]
mod tests {
    use hashbrown::HashMap;

    use super::*;

    struct TestCatalog {
        roles: HashMap<&'static str, RoleIndex>,
        groups: HashMap<&'static str, Vec<RoleIndex>>,
    }

    impl TestCatalog {
        fn new() -> Self {
            let roles = [("zombie", 3), ("creeper", 7), ("cow", 12)].into_iter().collect();
            let groups = [("hostile", vec![3, 7]), ("passive", vec![12])].into_iter().collect();
            Self { roles, groups }
        }
    }

    impl RoleResolver for TestCatalog {
        fn resolve_role(&self, name: &str) -> Option<RoleIndex> {
            self.roles.get(name).copied()
        }

        fn resolve_group(&self, name: &str) -> Option<Vec<RoleIndex>> {
            self.groups.get(name).cloned()
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = ZoneFilter::new();
        assert!(filter.is_empty());

        let compiled = filter.compile(&TestCatalog::new());
        assert!(compiled.roles().is_all());
        assert!(compiled.is_match_all());
        assert!(compiled.matches_role(99));
        assert!(compiled.matches_environment(0, -64, TimeOfDay::Night, 4));
        assert!(compiled.matches_environment(15, 320, TimeOfDay::Day, 0));
    }

    #[test]
    fn test_unresolvable_role_matches_nothing() {
        let filter = ZoneFilter::builder().role("dragon").build().unwrap();
        let compiled = filter.compile(&TestCatalog::new());
        assert!(compiled.roles().is_nothing());
        assert!(!compiled.matches_role(3));
        assert!(!compiled.is_match_all());
    }

    #[test]
    fn test_groups_and_roles_union() {
        let filter = ZoneFilter::builder()
            .group("hostile")
            .role("cow")
            .role("dragon")
            .build()
            .unwrap();
        let compiled = filter.compile(&TestCatalog::new());
        assert_eq!(compiled.roles().sorted(), Some(vec![3, 7, 12]));
        assert_eq!(compiled.roles().to_string(), "[3, 7, 12]");
    }

    #[test]
    fn test_environment_only_filter_keeps_all_roles() {
        let filter = ZoneFilter::builder().max_light(7).build().unwrap();
        assert!(!filter.is_empty());
        assert!(!filter.has_role_criteria());

        let compiled = filter.compile(&TestCatalog::new());
        assert!(compiled.roles().is_all());
        assert!(compiled.matches_environment(7, 0, TimeOfDay::Day, 0));
        assert!(!compiled.matches_environment(8, 0, TimeOfDay::Day, 0));
    }

    #[test]
    fn test_environment_criteria_are_conjunctive() {
        let filter = ZoneFilter::builder()
            .min_light(2)
            .max_light(9)
            .min_y(0)
            .max_y(64)
            .time(TimeOfDay::Night)
            .time(TimeOfDay::Dusk)
            .moon_phases([0, 4])
            .build()
            .unwrap();
        let compiled = filter.compile(&TestCatalog::new());

        assert!(compiled.matches_environment(5, 32, TimeOfDay::Night, 4));
        assert!(compiled.matches_environment(2, 0, TimeOfDay::Dusk, 0));
        assert!(compiled.matches_environment(9, 64, TimeOfDay::Night, 0));

        assert!(!compiled.matches_environment(1, 32, TimeOfDay::Night, 4));
        assert!(!compiled.matches_environment(10, 32, TimeOfDay::Night, 4));
        assert!(!compiled.matches_environment(5, -1, TimeOfDay::Night, 4));
        assert!(!compiled.matches_environment(5, 65, TimeOfDay::Night, 4));
        assert!(!compiled.matches_environment(5, 32, TimeOfDay::Day, 4));
        assert!(!compiled.matches_environment(5, 32, TimeOfDay::Night, 3));
        assert!(!compiled.matches_environment(5, 32, TimeOfDay::Night, 200));
    }

    #[test]
    fn test_compile_is_idempotent() {
        let catalog = TestCatalog::new();
        let filter = ZoneFilter::builder().group("hostile").time(TimeOfDay::Night).build().unwrap();
        assert_eq!(filter.compile(&catalog), filter.compile(&catalog));
    }

    #[test]
    fn test_recompile_follows_catalog() {
        let mut catalog = TestCatalog::new();
        let filter = ZoneFilter::builder().group("hostile").build().unwrap();
        assert!(filter.compile(&catalog).matches_role(7));

        catalog.groups.insert("hostile", vec![3, 50]);
        let compiled = filter.compile(&catalog);
        assert!(!compiled.matches_role(7));
        assert!(compiled.matches_role(50));
    }

    #[test]
    fn test_builder_rejects_out_of_range() {
        assert_eq!(
            ZoneFilter::builder().max_light(16).build(),
            Err(FilterError::LightOutOfRange(16))
        );
        assert_eq!(
            ZoneFilter::builder().moon_phase(8).build(),
            Err(FilterError::MoonPhaseOutOfRange(8))
        );
    }

    #[test]
    fn test_matches_uses_context() {
        let compiled = ZoneFilter::builder()
            .role("zombie")
            .max_y(40)
            .build()
            .unwrap()
            .compile(&TestCatalog::new());
        let ctx = SpawnContext::new(3, 0, TimeOfDay::Night, 0);
        assert!(compiled.matches(&ctx, 40));
        assert!(!compiled.matches(&ctx, 41));
        assert!(!compiled.matches(&SpawnContext { role: 7, ..ctx }, 0));
    }

    #[test]
    fn test_time_of_day_parse() {
        assert_eq!("Night".parse::<TimeOfDay>(), Ok(TimeOfDay::Night));
        assert!("noon".parse::<TimeOfDay>().is_err());
    }
}
