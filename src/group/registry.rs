//! Name → group lookup.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::info;

use super::{Group, GroupConfig};
use crate::domain::ports::SourceLoader;

static GLOBAL: Lazy<GroupRegistry> = Lazy::new(GroupRegistry::new);

/// Registry of groups served by this process
#[derive(Default)]
pub struct GroupRegistry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry, for callers that do not pass one around
    pub fn global() -> &'static GroupRegistry {
        &GLOBAL
    }

    /// Create a group with a byte budget and no eviction observer.
    ///
    /// Replaces any group already registered under `name`.
    pub fn new_group(
        &self,
        name: impl Into<String>,
        max_bytes: u64,
        loader: Arc<dyn SourceLoader>,
    ) -> Arc<Group> {
        self.new_group_with_config(name, GroupConfig::new(max_bytes), loader)
    }

    /// Create a group from a full config, replacing any same-name group
    pub fn new_group_with_config(
        &self,
        name: impl Into<String>,
        config: GroupConfig,
        loader: Arc<dyn SourceLoader>,
    ) -> Arc<Group> {
        let name = name.into();
        let max_bytes = config.max_bytes;
        let group = Arc::new(Group::new(name.clone(), config, loader));

        if self
            .groups
            .write()
            .insert(name.clone(), Arc::clone(&group))
            .is_some()
        {
            info!(group = %name, "replaced existing group");
        } else {
            info!(group = %name, max_bytes, "created group");
        }
        group
    }

    /// Get a group by name
    pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Remove a group; callers holding it keep a working handle
    pub fn remove_group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.write().remove(name)
    }

    /// Registered group names, sorted
    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.groups.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.read().is_empty()
    }
}

impl std::fmt::Debug for GroupRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupRegistry")
            .field("groups", &self.group_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::loader_fn;
    use bytes::Bytes;

    fn echo() -> Arc<dyn SourceLoader> {
        loader_fn(|key: String| async move { Ok(Bytes::from(key.into_bytes())) })
    }

    #[test]
    fn test_new_and_get_group() {
        let registry = GroupRegistry::new();
        let group = registry.new_group("scores", 2 << 10, echo());

        let found = registry.get_group("scores").unwrap();
        assert!(Arc::ptr_eq(&group, &found));
        assert_eq!(found.name(), "scores");
        assert_eq!(found.cache_stats().max_bytes, 2048);
        assert!(registry.get_group("missing").is_none());
    }

    #[tokio::test]
    async fn test_same_name_replaces_group() {
        let registry = GroupRegistry::new();
        let old = registry.new_group("scores", 0, echo());
        old.get("warm").await.unwrap();

        let new = registry.new_group("scores", 0, echo());
        assert!(!Arc::ptr_eq(&old, &new));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get_group("scores").unwrap().cache_stats().entries, 0);
    }

    #[test]
    fn test_remove_and_names() {
        let registry = GroupRegistry::new();
        registry.new_group("b", 0, echo());
        registry.new_group("a", 0, echo());

        assert_eq!(registry.group_names(), vec!["a".to_string(), "b".to_string()]);
        assert!(registry.remove_group("a").is_some());
        assert!(registry.remove_group("a").is_none());
        assert_eq!(registry.group_names(), vec!["b".to_string()]);
    }

    #[test]
    fn test_global_registry_is_shared() {
        GroupRegistry::global().new_group("registry-global-test", 0, echo());
        assert!(GroupRegistry::global()
            .get_group("registry-global-test")
            .is_some());
        GroupRegistry::global().remove_group("registry-global-test");
    }
}
