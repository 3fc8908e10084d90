//! Context providers: turn one extracted key into rendered snippets.
//!
//! Two providers feed the hydrator: a website provider for links, and the
//! [`CommandRegistry`](crate::commands::CommandRegistry) for bang commands.
//!
//! ```text
//!               ┌──────────────────┐
//!  ChatHydrator │ ContextProvider  │  (trait)
//!        ──────▶└────────┬─────────┘
//!                        │
//!        ┌───────────────┼────────────────┐
//!        ▼               ▼                ▼
//! ┌──────────────┐ ┌────────────┐ ┌─────────────────┐
//! │CachedProvider│ │StubWebsite │ │ CommandRegistry │
//! │ └ Ingest     │ │ Provider   │ │ (bang commands) │
//! └──────────────┘ └────────────┘ └─────────────────┘
//! ```

pub mod website;

pub use website::{IngestProvider, StubWebsiteProvider};

use std::sync::Arc;

use hydrator_config::{WebsiteConfig, WebsiteProviderKind};
use tracing::debug;

use crate::BoxFuture;
use crate::cache::ContextCache;
use crate::snippet::SnippetError;

/// Errors from context providers.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(String),

    #[error("upstream error: {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("request timed out")]
    Timeout,

    #[error(transparent)]
    Render(#[from] SnippetError),
}

/// Source of context snippets for one kind of key.
///
/// Implementations must be `Send + Sync`; the hydrator holds them as
/// `Arc<dyn ContextProvider>`.
pub trait ContextProvider: Send + Sync {
    /// Provider display name, used in logs.
    fn name(&self) -> &str;

    /// Resolve `key` into an ordered list of rendered snippets.
    fn get_context<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>, ProviderError>>;
}

/// Memoizes another provider's results in a cache under a key prefix.
pub struct CachedProvider {
    inner: Arc<dyn ContextProvider>,
    cache: Arc<dyn ContextCache>,
    prefix: String,
}

impl CachedProvider {
    pub fn new(
        inner: Arc<dyn ContextProvider>,
        cache: Arc<dyn ContextCache>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            inner,
            cache,
            prefix: prefix.into(),
        }
    }
}

impl ContextProvider for CachedProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get_context<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async move {
            let cache_key = format!("{}{key}", self.prefix);
            if let Some(hit) = self.cache.get(&cache_key).await {
                debug!(key = %cache_key, provider = self.inner.name(), "TTL cache hit");
                return Ok(hit);
            }
            let snippets = self.inner.get_context(key).await?;
            self.cache.set(&cache_key, snippets.clone()).await;
            Ok(snippets)
        })
    }
}

/// Key prefix for website results in the TTL cache.
pub const WEBSITE_CACHE_PREFIX: &str = "website:";

/// Create the website provider selected by the `[website]` config section.
///
/// The ingest provider is wrapped in a [`CachedProvider`] over `cache`.
pub fn create_website_provider(
    config: &WebsiteConfig,
    cache: Arc<dyn ContextCache>,
) -> Arc<dyn ContextProvider> {
    match config.provider {
        WebsiteProviderKind::Ingest => {
            let ingest = IngestProvider::new(&config.ingest_url)
                .with_timeout(std::time::Duration::from_secs(config.timeout_secs));
            Arc::new(CachedProvider::new(
                Arc::new(ingest),
                cache,
                WEBSITE_CACHE_PREFIX,
            ))
        }
        WebsiteProviderKind::Stub => Arc::new(StubWebsiteProvider::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::cache::MemoryCache;

    struct Counting {
        calls: AtomicUsize,
    }

    impl ContextProvider for Counting {
        fn name(&self) -> &str {
            "Counting"
        }

        fn get_context<'a>(
            &'a self,
            key: &'a str,
        ) -> BoxFuture<'a, Result<Vec<String>, ProviderError>> {
            Box::pin(async move {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(vec![format!("ctx:{key}")])
            })
        }
    }

    #[tokio::test]
    async fn test_cached_provider_memoizes_under_prefix() {
        let inner = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(MemoryCache::new());
        let provider = CachedProvider::new(inner.clone(), cache.clone(), "website:");

        let first = provider.get_context("https://a.example").await.unwrap();
        let second = provider.get_context("https://a.example").await.unwrap();

        assert_eq!(first, vec!["ctx:https://a.example".to_string()]);
        assert_eq!(first, second);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
        assert!(cache.contains("website:https://a.example"));
        assert_eq!(provider.name(), "Counting");
    }

    #[test]
    fn test_create_stub_provider() {
        let config = WebsiteConfig {
            provider: WebsiteProviderKind::Stub,
            ..WebsiteConfig::default()
        };
        let provider = create_website_provider(&config, Arc::new(MemoryCache::new()));
        assert_eq!(provider.name(), "StubWebsite");
    }

    #[test]
    fn test_create_ingest_provider() {
        let provider =
            create_website_provider(&WebsiteConfig::default(), Arc::new(MemoryCache::new()));
        assert_eq!(provider.name(), "Ingest");
    }
}
