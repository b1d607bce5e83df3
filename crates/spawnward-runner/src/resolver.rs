//! Role catalog built from configuration.

use hashbrown::HashMap;
use rustc_hash::FxBuildHasher;
use spawnward_zone::{RoleIndex, RoleResolver};

use crate::config::SpawnwardConfig;

/// Static role resolver. Names are matched case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct CatalogRoleResolver {
    roles: HashMap<String, RoleIndex, FxBuildHasher>,
    groups: HashMap<String, Vec<RoleIndex>, FxBuildHasher>,
}

impl CatalogRoleResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Roles first, then groups over those roles.
    #[must_use]
    pub fn from_config(config: &SpawnwardConfig) -> Self {
        let mut catalog = Self::new();
        for (name, &index) in &config.roles {
            catalog = catalog.with_role(name, index);
        }
        for (name, members) in &config.groups {
            catalog = catalog.with_group(name, members);
        }
        tracing::debug!(roles = catalog.roles.len(), groups = catalog.groups.len(), "built role catalog");
        catalog
    }

    pub fn with_role(mut self, name: &str, index: RoleIndex) -> Self {
        self.roles.insert(name.to_lowercase(), index);
        self
    }

    /// Add a group whose members are role names already in the catalog.
    /// Unknown members are dropped.
    pub fn with_group<I, S>(mut self, name: &str, members: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut indices = Vec::new();
        for member in members {
            let member = member.as_ref();
            match self.resolve_role(member) {
                Some(index) => indices.push(index),
                None => tracing::warn!(group = name, role = member, "unknown role in group"),
            }
        }
        indices.sort_unstable();
        indices.dedup();
        self.groups.insert(name.to_lowercase(), indices);
        self
    }

    #[must_use]
    pub fn role_count(&self) -> usize {
        self.roles.len()
    }

    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl RoleResolver for CatalogRoleResolver {
    fn resolve_role(&self, name: &str) -> Option<RoleIndex> {
        self.roles.get(&name.to_lowercase()).copied()
    }

    fn resolve_group(&self, name: &str) -> Option<Vec<RoleIndex>> {
        self.groups.get(&name.to_lowercase()).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_ignores_case() {
        let catalog = CatalogRoleResolver::new()
            .with_role("Zombie", 3)
            .with_group("HOSTILE", ["zombie"]);
        assert_eq!(catalog.resolve_role("ZOMBIE"), Some(3));
        assert_eq!(catalog.resolve_group("hostile"), Some(vec![3]));
        assert_eq!(catalog.resolve_role("pig"), None);
        assert_eq!(catalog.resolve_group("passive"), None);
    }

    #[test]
    fn test_group_members_are_resolved_and_deduplicated() {
        let catalog = CatalogRoleResolver::new()
            .with_role("creeper", 7)
            .with_role("zombie", 3)
            .with_group("hostile", ["creeper", "zombie", "ghost", "zombie"]);
        assert_eq!(catalog.resolve_group("hostile"), Some(vec![3, 7]));
    }

    #[test]
    fn test_from_config() {
        let mut config = SpawnwardConfig::default();
        config.roles.insert("zombie".to_owned(), 3);
        config.roles.insert("creeper".to_owned(), 7);
        config
            .groups
            .insert("hostile".to_owned(), vec!["zombie".to_owned(), "creeper".to_owned()]);

        let catalog = CatalogRoleResolver::from_config(&config);
        assert_eq!(catalog.role_count(), 2);
        assert_eq!(catalog.group_count(), 1);
        assert_eq!(catalog.resolve_group("hostile"), Some(vec![3, 7]));
    }
}
