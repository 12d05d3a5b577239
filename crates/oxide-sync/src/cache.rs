//! Immutable table and view caches.
//!
//! Every update builds a new map and the runner swaps it in after the batch
//! has run, so a failed batch leaves the previous map untouched.

use std::collections::BTreeMap;
use std::sync::Arc;

use oxide_ddl::{Table, View};

/// Objects stored in a [`SchemaCache`].
pub trait Cached: Clone {
    /// Key identifying the object, its `schema.name` path.
    fn cache_key(&self) -> String;
}

impl Cached for Table {
    fn cache_key(&self) -> String {
        self.path()
    }
}

impl Cached for View {
    fn cache_key(&self) -> String {
        self.path()
    }
}

/// Persistent map from object path to definition.
#[derive(Debug)]
pub struct SchemaCache<T> {
    entries: Arc<BTreeMap<String, T>>,
}

impl<T> Clone for SchemaCache<T> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<T> Default for SchemaCache<T> {
    fn default() -> Self {
        Self {
            entries: Arc::new(BTreeMap::new()),
        }
    }
}

impl<T: Cached> SchemaCache<T> {
    /// Returns the definition cached under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&T> {
        self.entries.get(key)
    }

    /// Returns true when `key` is cached.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns a map with `value` added or replaced under its own key.
    #[must_use]
    pub fn insert(&self, value: T) -> Self {
        let mut entries = (*self.entries).clone();
        entries.insert(value.cache_key(), value);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Returns a map with the entry at `old_key` replaced by `value`, which
    /// may live under a different key.
    #[must_use]
    pub fn replace(&self, old_key: &str, value: T) -> Self {
        let mut entries = (*self.entries).clone();
        entries.remove(old_key);
        entries.insert(value.cache_key(), value);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Returns a map without `key`.
    #[must_use]
    pub fn remove(&self, key: &str) -> Self {
        if !self.contains(key) {
            return self.clone();
        }
        let mut entries = (*self.entries).clone();
        entries.remove(key);
        Self {
            entries: Arc::new(entries),
        }
    }

    /// Number of cached objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true when nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Cached keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Cached definitions in key order.
    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.values()
    }
}
