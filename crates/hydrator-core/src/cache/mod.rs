//! Context caches.
//!
//! Two independent caches share the [`ContextCache`] contract:
//!
//! - [`MemoryCache`]: process-wide, unbounded map used by the hydrator to
//!   memoize resolved entities for the life of the process.
//! - [`TtlCache`]: Redis-backed cache with per-entry expiry, used for the
//!   more expensive website lookups. Falls back to an in-process map with
//!   the same TTL whenever Redis is unreachable.
//!
//! Values are ordered lists of rendered snippet strings. A key always holds
//! the result of the most recent successful fetch; values are replaced whole.

pub mod memory;
pub mod ttl;

pub use memory::MemoryCache;
pub use ttl::TtlCache;

use crate::BoxFuture;

/// Errors from the cache backing store.
///
/// These never reach callers of [`ContextCache`]; the TTL cache logs them and
/// serves the operation from its in-memory fallback instead.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("backing store error: {0}")]
    Store(#[from] redis::RedisError),

    #[error("failed to encode cached value: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("backing store did not answer within {0:?}")]
    Timeout(std::time::Duration),
}

/// Key/value store for rendered context snippets.
pub trait ContextCache: Send + Sync {
    /// Look up `key`. `None` if absent or expired.
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Vec<String>>>;

    /// Store `value` under `key`, replacing any previous value.
    fn set<'a>(&'a self, key: &'a str, value: Vec<String>) -> BoxFuture<'a, ()>;

    /// Remove every entry.
    fn clear(&self) -> BoxFuture<'_, ()>;
}
