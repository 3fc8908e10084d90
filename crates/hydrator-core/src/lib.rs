#![deny(unsafe_code)]

//! Context hydrator core.
//!
//! Scans user-authored chat messages for web links and bang commands
//! (`!books`, `!book <title>`, …), resolves each reference through a
//! pluggable [`ContextProvider`], and splices the serialized result back
//! into the message before the request is forwarded to the model endpoint.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌────────────────────────────┐
//! │  Proxy   │──▶│ ChatHydrator │──▶│ extract ─▶ cache/provider  │
//! │ (axum)   │   └──────┬───────┘   │          ─▶ snippet markup │
//! └────┬─────┘          │           └────────────────────────────┘
//!      │                ▼
//!      │     ┌─────────────────────┐   ┌──────────────────────┐
//!      │     │ WebsiteProvider     │   │ CommandRegistry      │
//!      │     │ (ingest API / stub) │   │ testcmd, books, book │
//!      │     └─────────────────────┘   └──────────────────────┘
//!      ▼
//!  upstream model endpoint
//! ```

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future. Return type for async trait
/// methods that are called through `Arc<dyn Trait>`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Context caches: process-wide entity memo and the Redis-backed TTL cache.
pub mod cache;
/// Chat and message types as they travel through the proxy.
pub mod chat;
/// Bang-command registry and built-in handlers.
pub mod commands;
/// URL and bang-command extraction from message text.
pub mod extract;
/// Per-key single-flight gate.
pub mod flight;
/// The hydration orchestrator.
pub mod hydrator;
/// Context provider trait and website providers.
pub mod provider;
/// Forwarding proxy in front of the model endpoint.
pub mod proxy;
/// Context snippet types and their markup serialization.
pub mod snippet;

pub use cache::{ContextCache, MemoryCache, TtlCache};
pub use chat::{Chat, Message, MessageContent, Role};
pub use commands::{BookLibrary, CommandHandler, CommandRegistry};
pub use hydrator::{ChatHydrator, HydrateError};
pub use provider::{CachedProvider, ContextProvider, IngestProvider, ProviderError, StubWebsiteProvider};
pub use snippet::{CommandResult, ContextSnippet, WebsiteContent};
