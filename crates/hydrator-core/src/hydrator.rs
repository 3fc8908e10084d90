//! The hydration orchestrator.
//!
//! For every user message with text content, [`ChatHydrator`] extracts links
//! and bang commands, resolves each one through the entity cache or its
//! provider, and appends the rendered snippets to the message:
//!
//! ```text
//! <original text>\n
//! \n
//! <snippet 1>\n
//! \n
//! <snippet 2>
//! ```
//!
//! Link snippets come first, then command snippets, each in the order they
//! appear in the text. Messages are processed in order and keys one at a
//! time. A provider error aborts the whole call; keys resolved before the
//! failure stay cached.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::ContextCache;
use crate::chat::{Chat, Message};
use crate::extract::{extract_bang_commands, extract_urls};
use crate::flight::SingleFlight;
use crate::provider::{ContextProvider, ProviderError};

/// Errors from hydrating a chat.
#[derive(Debug, thiserror::Error)]
pub enum HydrateError {
    #[error("failed to resolve context for '{key}': {source}")]
    Provider {
        key: String,
        #[source]
        source: ProviderError,
    },

    #[error("failed to encode hydrated chat: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Enriches chat messages with context from providers.
pub struct ChatHydrator {
    cache: Arc<dyn ContextCache>,
    website: Option<Arc<dyn ContextProvider>>,
    commands: Option<Arc<dyn ContextProvider>>,
    flight: SingleFlight,
}

impl ChatHydrator {
    /// A hydrator with no providers, memoizing into `cache`.
    pub fn new(cache: Arc<dyn ContextCache>) -> Self {
        Self {
            cache,
            website: None,
            commands: None,
            flight: SingleFlight::new(),
        }
    }

    /// Resolve links with `provider`.
    pub fn with_website_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.website = Some(provider);
        self
    }

    /// Resolve bang commands with `provider`.
    pub fn with_command_provider(mut self, provider: Arc<dyn ContextProvider>) -> Self {
        self.commands = Some(provider);
        self
    }

    /// Hydrate every message of `chat`, returning a new chat.
    pub async fn hydrate(&self, chat: &Chat) -> Result<Chat, HydrateError> {
        let mut messages = Vec::with_capacity(chat.messages.len());
        for message in &chat.messages {
            messages.push(self.hydrate_message(message).await?);
        }
        Ok(Chat {
            messages,
            extra: chat.extra.clone(),
        })
    }

    /// Hydrate a raw JSON request body.
    ///
    /// A bare array is taken as the message list and the result is wrapped
    /// as `{"messages": [...]}`. Bodies without a `messages` array are
    /// returned unchanged. Within the array, entries that are not message
    /// objects and messages that gain no context are left byte-for-byte as
    /// they were.
    pub async fn hydrate_value(&self, body: Value) -> Result<Value, HydrateError> {
        let mut body = match body {
            Value::Array(messages) => {
                let mut wrapped = serde_json::Map::new();
                wrapped.insert("messages".to_string(), Value::Array(messages));
                Value::Object(wrapped)
            }
            other => other,
        };

        if !matches!(body.get("messages"), Some(Value::Array(_))) {
            warn!("Request body has no messages array, leaving it unchanged");
            return Ok(body);
        }
        if let Some(Value::Array(messages)) = body.get_mut("messages") {
            for (index, slot) in messages.iter_mut().enumerate() {
                let message: Message = match serde_json::from_value(slot.clone()) {
                    Ok(message) => message,
                    Err(e) => {
                        warn!(index, error = %e, "Skipping entry that is not a message");
                        continue;
                    }
                };
                let hydrated = self.hydrate_message(&message).await?;
                if hydrated != message {
                    *slot = serde_json::to_value(hydrated)?;
                }
            }
        }
        Ok(body)
    }

    async fn hydrate_message(&self, message: &Message) -> Result<Message, HydrateError> {
        if !message.is_user() {
            return Ok(message.clone());
        }
        let Some(text) = message.text() else {
            return Ok(message.clone());
        };

        let mut snippets = Vec::new();
        if let Some(provider) = &self.website {
            for url in extract_urls(text) {
                snippets.extend(self.resolve(provider.as_ref(), &url, &url).await?);
            }
        }
        if let Some(provider) = &self.commands {
            for command in extract_bang_commands(text) {
                let cache_key = format!("!{command}");
                snippets.extend(self.resolve(provider.as_ref(), &cache_key, &command).await?);
            }
        }

        if snippets.is_empty() {
            return Ok(message.clone());
        }
        debug!(count = snippets.len(), "Splicing context snippets into message");
        Ok(message.with_text(splice(text, &snippets)))
    }

    async fn resolve(
        &self,
        provider: &dyn ContextProvider,
        cache_key: &str,
        key: &str,
    ) -> Result<Vec<String>, HydrateError> {
        if let Some(hit) = self.cache.get(cache_key).await {
            debug!(key = %cache_key, "Entity cache hit");
            return Ok(hit);
        }

        let _flight = self.flight.acquire(cache_key).await;
        if let Some(hit) = self.cache.get(cache_key).await {
            debug!(key = %cache_key, "Entity cache filled while waiting");
            return Ok(hit);
        }

        info!(key = %cache_key, provider = provider.name(), "Fetching context");
        let snippets = provider
            .get_context(key)
            .await
            .map_err(|source| HydrateError::Provider {
                key: cache_key.to_string(),
                source,
            })?;
        self.cache.set(cache_key, snippets.clone()).await;
        Ok(snippets)
    }
}

/// Append `snippets` to `text`, separated by a blank line.
fn splice(text: &str, snippets: &[String]) -> String {
    let mut out = String::from(text);
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    out.push_str(&snippets.join("\n\n"));
    out
}
