//! Website providers.
//!
//! [`IngestProvider`] submits a link to the resource-ingestion API and
//! renders the extracted page. It never fails on transport problems: any
//! network, HTTP or decode error yields a fallback snippet instead.
//!
//! [`StubWebsiteProvider`] returns canned content and never touches the
//! network.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::BoxFuture;
use crate::snippet::{ContextSnippet, WebsiteContent};

use super::{ContextProvider, ProviderError};

const RESOURCES_PATH: &str = "/api/v1/resources";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(180);

/// Body posted to the ingestion API.
#[derive(Debug, Serialize)]
struct ResourceSubmission<'a> {
    url: &'a str,
    /// Content type hint; always left to the service to detect.
    r#type: Option<&'a str>,
    title: String,
}

/// The subset of the ingestion API's resource we render.
#[derive(Debug, Deserialize)]
struct Resource {
    url: String,
    title: String,
    content: String,
}

/// Website provider backed by the resource-ingestion API.
pub struct IngestProvider {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl IngestProvider {
    /// Create a provider for the ingestion API at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self) -> String {
        format!("{}{RESOURCES_PATH}", self.base_url)
    }

    async fn fetch(&self, key: &str) -> Result<WebsiteContent, ProviderError> {
        let submission = ResourceSubmission {
            url: key,
            r#type: None,
            title: format!("Content from {key}"),
        };
        let endpoint = self.endpoint();
        debug!(endpoint = %endpoint, url = %key, "Submitting resource");

        let resp = self
            .client
            .post(&endpoint)
            .timeout(self.timeout)
            .json(&submission)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let resource: Resource = resp
            .json()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))?;

        Ok(WebsiteContent {
            url: resource.url,
            text_content: resource.content,
            title: Some(resource.title),
        })
    }
}

/// Snippet served when the ingestion API cannot be used.
fn fallback_content(key: &str) -> WebsiteContent {
    WebsiteContent {
        url: key.to_string(),
        text_content: format!("API request failed. This is fallback content for {key}"),
        title: Some(format!("Fallback content for {key}")),
    }
}

impl ContextProvider for IngestProvider {
    fn name(&self) -> &str {
        "Ingest"
    }

    fn get_context<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async move {
            info!(url = %key, "Getting website context via ingestion API");
            let content = match self.fetch(key).await {
                Ok(content) => content,
                Err(e) => {
                    warn!(url = %key, error = %e, "Ingestion failed, using fallback content");
                    fallback_content(key)
                }
            };
            Ok(vec![ContextSnippet::Website(content).to_markup()?])
        })
    }
}

/// Canned page text served by [`StubWebsiteProvider`].
pub const STUB_TEXT: &str =
    "Did you know bunnies always have 31 toes on each foot?? True story! More facts at bunny.com";

/// Offline website provider with deterministic content.
#[derive(Debug, Default)]
pub struct StubWebsiteProvider;

impl StubWebsiteProvider {
    pub fn new() -> Self {
        Self
    }
}

impl ContextProvider for StubWebsiteProvider {
    fn name(&self) -> &str {
        "StubWebsite"
    }

    fn get_context<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Vec<String>, ProviderError>> {
        Box::pin(async move {
            let snippet = ContextSnippet::Website(WebsiteContent {
                url: key.to_string(),
                text_content: STUB_TEXT.to_string(),
                title: Some(format!("Content from {key}")),
            });
            Ok(vec![snippet.to_markup()?])
        })
    }
}
