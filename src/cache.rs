//! Type-erased, process-wide cache store shared by queries and mutations.
//!
//! The store maps a cache key to the last value written for it. Values are
//! stored behind `dyn Any`, and every read names the type it expects, so a
//! reader never sees a value of the wrong shape: a mismatch reads as a miss.

use std::any::Any;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::time::Instant;
use tracing::warn;

/// A cached value together with the instant it was written.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub data: T,
    /// When `data` was written.
    pub updated_at: Instant,
}

impl<T> CacheEntry<T> {
    /// Creates a new cache entry stamped with the current instant.
    pub fn new(data: T) -> Self {
        Self {
            data,
            updated_at: Instant::now(),
        }
    }
}

/// Shared key-value store with last-writer-wins semantics.
///
/// Cloning a `CacheStore` is cheap and every clone points at the same map.
/// Entries live until the store itself is dropped; there is no eviction.
///
/// # Example
///
/// ```
/// use stale_query::cache::CacheStore;
///
/// let store = CacheStore::new();
/// store.set(&"todos", vec![1, 2, 3]);
///
/// assert_eq!(store.get::<Vec<i32>>("todos"), Some(vec![1, 2, 3]));
/// // Reading with a different type is a miss, not a panic.
/// assert_eq!(store.get::<String>("todos"), None);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CacheStore {
    entries: Arc<DashMap<String, Box<dyn Any + Send + Sync>>>,
}

impl CacheStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a clone of the value stored under `key`, if it is a `T`.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        self.entry::<T>(key).map(|entry| entry.data)
    }

    /// Returns the full entry stored under `key`, if it is a `T`.
    pub fn entry<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<CacheEntry<T>> {
        let slot = self.entries.get(key)?;
        let entry = slot.downcast_ref::<CacheEntry<T>>().cloned();
        if entry.is_none() {
            warn!(
                key,
                expected = std::any::type_name::<T>(),
                "cached value has a different type, treating as absent"
            );
        }
        entry
    }

    /// Stores `value` under `key`, replacing whatever was there.
    pub fn set<T: Clone + Send + Sync + 'static>(&self, key: &impl ToString, value: T) {
        self.entries
            .insert(key.to_string(), Box::new(CacheEntry::new(value)));
    }

    /// Returns `true` if any value is stored under `key`, whatever its type.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns `true` if a `T` is stored under `key`, without cloning it.
    #[must_use]
    pub fn contains_as<T: Send + Sync + 'static>(&self, key: &str) -> bool {
        self.entries
            .get(key)
            .is_some_and(|slot| slot.is::<CacheEntry<T>>())
    }

    /// Number of keys currently holding a value.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no key holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_new_store_is_empty() {
        let store = CacheStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert!(store.get::<i32>("missing").is_none());
    }

    #[test]
    fn test_set_then_get() {
        let store = CacheStore::new();
        store.set(&"key1", 42);

        assert_eq!(store.get::<i32>("key1"), Some(42));
        assert!(store.contains("key1"));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let store = CacheStore::new();
        store.set(&"key1", 1);
        store.set(&"key1", 2);

        assert_eq!(store.get::<i32>("key1"), Some(2));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_type_mismatch_reads_as_absent() {
        let store = CacheStore::new();
        store.set(&"todos", "not a list".to_string());

        assert!(store.get::<Vec<u32>>("todos").is_none());
        assert!(!store.contains_as::<Vec<u32>>("todos"));
        assert!(store.contains_as::<String>("todos"));
        // The slot is still occupied, only the typed read misses.
        assert!(store.contains("todos"));
        assert_eq!(store.get::<String>("todos").as_deref(), Some("not a list"));
    }

    #[test]
    fn test_overwrite_with_other_type() {
        let store = CacheStore::new();
        store.set(&"key", 1_u8);
        store.set(&"key", "one".to_string());

        assert!(store.get::<u8>("key").is_none());
        assert_eq!(store.get::<String>("key").as_deref(), Some("one"));
    }

    #[test]
    fn test_clones_share_entries() {
        let store = CacheStore::new();
        let other = store.clone();
        other.set(&"shared", vec!["a".to_string()]);

        assert_eq!(
            store.get::<Vec<String>>("shared"),
            Some(vec!["a".to_string()])
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entry_age() {
        let store = CacheStore::new();
        store.set(&"key", 7);

        tokio::time::advance(Duration::from_millis(150)).await;

        let entry = store.entry::<i32>("key").expect("entry should exist");
        assert_eq!(entry.data, 7);
        assert!(entry.updated_at.elapsed() >= Duration::from_millis(150));
    }
}
