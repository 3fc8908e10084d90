//! Redis-backed TTL cache with an in-memory fallback.
//!
//! Values are stored in Redis as JSON arrays with `SETEX`. When Redis is not
//! reachable at startup the cache runs memory-only for the life of the
//! process. When a single operation fails later on, that operation is served
//! by the fallback map and a warning is logged.

use std::time::Duration;

use hydrator_config::CacheConfig;
use moka::sync::Cache;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use tracing::{info, warn};

use crate::BoxFuture;

use super::{CacheError, ContextCache};

/// How long to wait for Redis at startup and per operation.
const STORE_TIMEOUT: Duration = Duration::from_secs(2);

/// TTL cache backed by Redis.
pub struct TtlCache {
    store: Option<ConnectionManager>,
    fallback: Cache<String, Vec<String>>,
    ttl: Duration,
}

impl TtlCache {
    /// Connect to Redis at `redis_url`.
    ///
    /// Never fails: an invalid URL or an unreachable server logs one warning
    /// and yields a memory-only cache.
    pub async fn connect(redis_url: &str, ttl: Duration) -> Self {
        match open_store(redis_url).await {
            Ok(store) => {
                info!(url = %redis_url, ttl_secs = ttl.as_secs(), "Connected to Redis cache");
                Self {
                    store: Some(store),
                    ..Self::memory_only(ttl)
                }
            }
            Err(e) => {
                warn!(url = %redis_url, error = %e, "Redis unavailable, using in-memory cache");
                Self::memory_only(ttl)
            }
        }
    }

    /// Build from the `[cache]` config section.
    pub async fn from_config(config: &CacheConfig) -> Self {
        let ttl = Duration::from_secs(config.ttl_secs);
        if config.enabled {
            Self::connect(&config.redis_url, ttl).await
        } else {
            info!("Redis cache disabled, using in-memory cache");
            Self::memory_only(ttl)
        }
    }

    /// A cache that never talks to Redis.
    pub fn memory_only(ttl: Duration) -> Self {
        Self {
            store: None,
            fallback: Cache::builder().time_to_live(ttl).build(),
            ttl,
        }
    }

    /// Whether a Redis connection was established.
    pub fn is_backed(&self) -> bool {
        self.store.is_some()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    async fn store_get(
        mut conn: ConnectionManager,
        key: &str,
    ) -> Result<Option<Vec<String>>, CacheError> {
        let raw: Option<String> = bounded(conn.get(key)).await?;
        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn store_set(
        mut conn: ConnectionManager,
        key: &str,
        value: &[String],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let json = serde_json::to_string(value)?;
        let secs = ttl.as_secs().max(1);
        let _: () = bounded(conn.set_ex(key, json, secs)).await?;
        Ok(())
    }

    async fn store_clear(mut conn: ConnectionManager) -> Result<(), CacheError> {
        let _: () = bounded(redis::cmd("FLUSHDB").query_async(&mut conn)).await?;
        Ok(())
    }
}

impl ContextCache for TtlCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Option<Vec<String>>> {
        Box::pin(async move {
            if let Some(conn) = &self.store {
                match Self::store_get(conn.clone(), key).await {
                    Ok(value) => return value,
                    Err(e) => warn!(key, error = %e, "Redis get failed, using in-memory cache"),
                }
            }
            self.fallback.get(key)
        })
    }

    fn set<'a>(&'a self, key: &'a str, value: Vec<String>) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            if let Some(conn) = &self.store {
                match Self::store_set(conn.clone(), key, &value, self.ttl).await {
                    Ok(()) => return,
                    Err(e) => warn!(key, error = %e, "Redis set failed, using in-memory cache"),
                }
            }
            self.fallback.insert(key.to_string(), value);
        })
    }

    fn clear(&self) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if let Some(conn) = &self.store {
                match Self::store_clear(conn.clone()).await {
                    Ok(()) => info!("Redis cache cleared"),
                    Err(e) => warn!(error = %e, "Redis clear failed"),
                }
            }
            self.fallback.invalidate_all();
        })
    }
}

async fn open_store(redis_url: &str) -> Result<ConnectionManager, CacheError> {
    let client = redis::Client::open(redis_url)?;
    let mut conn = bounded(client.get_connection_manager()).await?;
    let _: String = bounded(redis::cmd("PING").query_async(&mut conn)).await?;
    Ok(conn)
}

async fn bounded<T>(
    op: impl std::future::Future<Output = redis::RedisResult<T>>,
) -> Result<T, CacheError> {
    tokio::time::timeout(STORE_TIMEOUT, op)
        .await
        .map_err(|_| CacheError::Timeout(STORE_TIMEOUT))?
        .map_err(CacheError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_only_round_trip() {
        let cache = TtlCache::memory_only(Duration::from_secs(300));
        assert!(!cache.is_backed());
        assert_eq!(cache.get("website:https://a.example").await, None);

        cache
            .set("website:https://a.example", vec!["<snippet/>".to_string()])
            .await;
        assert_eq!(
            cache.get("website:https://a.example").await,
            Some(vec!["<snippet/>".to_string()])
        );
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let cache = TtlCache::memory_only(Duration::from_millis(100));
        cache.set("k", vec!["v".to_string()]).await;
        assert!(cache.get("k").await.is_some());

        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_clear_empties_fallback() {
        let cache = TtlCache::memory_only(Duration::from_secs(60));
        cache.set("a", vec!["1".to_string()]).await;
        cache.clear().await;
        assert_eq!(cache.get("a").await, None);
    }

    #[test_log::test(tokio::test)]
    async fn test_invalid_url_falls_back() {
        let cache = TtlCache::connect("not a redis url", Duration::from_secs(60)).await;
        assert!(!cache.is_backed());

        cache.set("k", vec!["v".to_string()]).await;
        assert_eq!(cache.get("k").await, Some(vec!["v".to_string()]));
    }

    #[test_log::test(tokio::test)]
    async fn test_unreachable_server_falls_back() {
        let cache = TtlCache::connect("redis://127.0.0.1:1", Duration::from_secs(60)).await;
        assert!(!cache.is_backed());
        assert_eq!(cache.ttl(), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_disabled_config_is_memory_only() {
        let config = CacheConfig {
            enabled: false,
            ttl_secs: 42,
            ..CacheConfig::default()
        };
        let cache = TtlCache::from_config(&config).await;
        assert!(!cache.is_backed());
        assert_eq!(cache.ttl(), Duration::from_secs(42));
    }
}
