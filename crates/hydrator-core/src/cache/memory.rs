//! Unbounded in-memory cache with process lifetime.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::BoxFuture;

use super::ContextCache;

/// Plain map cache. No TTL; entries live until [`ContextCache::clear`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Vec<String>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached keys.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is cached, without cloning its value.
    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    // Writes replace whole values, so a poisoned map is still consistent.
    fn entries(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<String>>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn entries_mut(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<String>>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ContextCache for MemoryCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Vec<String>>> {
        Box::pin(async move { self.entries().get(key).cloned() })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<String>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            self.entries_mut().insert(key.to_string(), value);
        })
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move { self.entries_mut().clear() })
    }
}
