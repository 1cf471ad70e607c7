//! In-memory monitor and maintenance registries.

use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use uptime::types::{MaintenanceId, MonitorId};
use uptime::{MaintenanceWindow, Monitor};

/// Live monitor handles by ID
pub type MonitorRegistry = Registry<MonitorId, Monitor>;

/// Live maintenance window handles by ID
pub type MaintenanceRegistry = Registry<MaintenanceId, MaintenanceWindow>;

/// Concurrent ID -> handle map.
///
/// Unordered. Readers during [`Registry::replace_all`] may briefly observe a
/// mix of old and new entries.
pub struct Registry<K, V> {
    entries: DashMap<K, Arc<V>>,
}

impl<K, V> Registry<K, V>
where
    K: Eq + Hash + Clone,
{
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert or replace a handle, returning the previous one
    pub fn insert(&self, id: K, value: V) -> Option<Arc<V>> {
        self.entries.insert(id, Arc::new(value))
    }

    /// Remove a handle
    pub fn remove(&self, id: &K) -> Option<Arc<V>> {
        self.entries.remove(id).map(|(_, value)| value)
    }

    /// Look up a handle
    pub fn get(&self, id: &K) -> Option<Arc<V>> {
        self.entries.get(id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn contains(&self, id: &K) -> bool {
        self.entries.contains_key(id)
    }

    /// All registered IDs, unordered
    pub fn ids(&self) -> Vec<K> {
        self.entries.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Replace the whole contents with `entries`
    pub fn replace_all(&self, entries: impl IntoIterator<Item = (K, V)>) {
        let mut keep = std::collections::HashSet::new();
        for (id, value) in entries {
            keep.insert(id.clone());
            self.entries.insert(id, Arc::new(value));
        }
        self.entries.retain(|id, _| keep.contains(id));
    }
}

impl<K, V> Default for Registry<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_get_remove() {
        let registry: Registry<u64, String> = Registry::new();
        assert!(registry.insert(1, "one".to_string()).is_none());
        assert_eq!(
            registry.insert(1, "uno".to_string()).as_deref().map(String::as_str),
            Some("one")
        );

        assert_eq!(registry.get(&1).as_deref().map(String::as_str), Some("uno"));
        assert!(registry.contains(&1));
        assert!(registry.remove(&1).is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn test_replace_all_drops_missing_ids() {
        let registry: Registry<u64, &str> = Registry::new();
        registry.insert(1, "a");
        registry.insert(2, "b");

        registry.replace_all([(2, "b2"), (3, "c")]);

        let mut ids = registry.ids();
        ids.sort();
        assert_eq!(ids, vec![2, 3]);
        assert_eq!(registry.get(&2).map(|v| *v), Some("b2"));
    }
}
