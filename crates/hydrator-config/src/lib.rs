#![deny(unsafe_code)]

//! Configuration loading and validation for the context hydrator.
//!
//! Loads TOML configuration files, layers the supported environment
//! variables on top, and validates the result. [`AppConfig`] is the
//! central configuration structure shared by the proxy, the caches, the
//! website providers and the bang-command registry.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Environment variable overriding [`CacheConfig::redis_url`].
pub const ENV_REDIS_URL: &str = "REDIS_URL";
/// Environment variable overriding [`BooksConfig::dir`].
pub const ENV_BOOKS_DIR: &str = "BOOKS_DIR_PATH";
/// Environment variable overriding [`ProxyConfig::upstream_url`].
pub const ENV_UPSTREAM_URL: &str = "UPSTREAM_URL";
/// Environment variable overriding [`WebsiteConfig::ingest_url`].
pub const ENV_INGEST_URL: &str = "INGEST_API_URL";

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Forwarding proxy configuration.
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// TTL cache configuration.
    #[serde(default)]
    pub cache: CacheConfig,

    /// Local document (book) store configuration.
    #[serde(default)]
    pub books: BooksConfig,

    /// Website context provider configuration.
    #[serde(default)]
    pub website: WebsiteConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Configuration for the forwarding proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    /// Address the proxy listens on.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Port the proxy listens on.
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,

    /// Base URL of the downstream model endpoint.
    #[serde(default = "default_upstream_url")]
    pub upstream_url: String,

    /// Timeout for a forwarded request, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            listen_port: default_listen_port(),
            upstream_url: default_upstream_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_listen_port() -> u16 {
    9000
}

fn default_upstream_url() -> String {
    "http://127.0.0.1:30001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

/// Configuration for the TTL cache and its Redis backing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether to try the Redis backing store at all. When disabled the
    /// TTL cache runs purely in memory.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Redis connection string.
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Entry lifetime in seconds.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            redis_url: default_redis_url(),
            ttl_secs: default_ttl_secs(),
        }
    }
}

fn default_cache_enabled() -> bool {
    true
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_ttl_secs() -> u64 {
    300
}

/// Configuration for the local book directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BooksConfig {
    /// Directory scanned once at startup for `.txt` documents.
    #[serde(default = "default_books_dir")]
    pub dir: String,
}

impl Default for BooksConfig {
    fn default() -> Self {
        Self {
            dir: default_books_dir(),
        }
    }
}

fn default_books_dir() -> String {
    "./context/books/".to_string()
}

/// Which website provider resolves URL references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WebsiteProviderKind {
    /// Remote resource-ingestion API.
    #[default]
    Ingest,
    /// Deterministic offline stub.
    Stub,
}

/// Configuration for the website context provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebsiteConfig {
    /// Provider implementation to use.
    #[serde(default)]
    pub provider: WebsiteProviderKind,

    /// Base URL of the resource-ingestion API.
    #[serde(default = "default_ingest_url")]
    pub ingest_url: String,

    /// Timeout for one ingestion request, in seconds.
    #[serde(default = "default_ingest_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebsiteConfig {
    fn default() -> Self {
        Self {
            provider: WebsiteProviderKind::default(),
            ingest_url: default_ingest_url(),
            timeout_secs: default_ingest_timeout_secs(),
        }
    }
}

fn default_ingest_url() -> String {
    "http://127.0.0.1:8000".to_string()
}

fn default_ingest_timeout_secs() -> u64 {
    180
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    ///
    /// Environment overrides are applied before validation.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let mut config: AppConfig = toml::from_str(&content)?;
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string. No environment overrides.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Default configuration with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = AppConfig::default();
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables using the given lookup.
    ///
    /// Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get(ENV_REDIS_URL) {
            debug!(var = ENV_REDIS_URL, "Overriding cache.redis_url from environment");
            self.cache.redis_url = url;
        }
        if let Some(dir) = get(ENV_BOOKS_DIR) {
            debug!(var = ENV_BOOKS_DIR, "Overriding books.dir from environment");
            self.books.dir = dir;
        }
        if let Some(url) = get(ENV_UPSTREAM_URL) {
            debug!(var = ENV_UPSTREAM_URL, "Overriding proxy.upstream_url from environment");
            self.proxy.upstream_url = url;
        }
        if let Some(url) = get(ENV_INGEST_URL) {
            debug!(var = ENV_INGEST_URL, "Overriding website.ingest_url from environment");
            self.website.ingest_url = url;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.proxy.listen_port == 0 {
            return Err(ConfigError::Validation(
                "proxy.listen_port must be non-zero".to_string(),
            ));
        }
        if self.proxy.listen_addr.is_empty() {
            return Err(ConfigError::Validation(
                "proxy.listen_addr must not be empty".to_string(),
            ));
        }
        check_http_url("proxy.upstream_url", &self.proxy.upstream_url)?;
        if self.proxy.request_timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "proxy.request_timeout_secs must be non-zero".to_string(),
            ));
        }

        if self.cache.ttl_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.ttl_secs must be non-zero".to_string(),
            ));
        }
        if self.cache.enabled && !self.cache.redis_url.starts_with("redis") {
            return Err(ConfigError::Validation(format!(
                "cache.redis_url must be a redis:// or rediss:// URL, got {:?}",
                self.cache.redis_url
            )));
        }

        if self.books.dir.is_empty() {
            return Err(ConfigError::Validation(
                "books.dir must not be empty".to_string(),
            ));
        }

        if self.website.provider == WebsiteProviderKind::Ingest {
            check_http_url("website.ingest_url", &self.website.ingest_url)?;
        }
        if self.website.timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "website.timeout_secs must be non-zero".to_string(),
            ));
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}

fn check_http_url(field: &str, url: &str) -> Result<(), ConfigError> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{field} must be an http:// or https:// URL, got {url:?}"
        )))
    }
}
