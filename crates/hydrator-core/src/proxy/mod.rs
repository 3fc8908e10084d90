//! Forwarding proxy in front of the model endpoint.
//!
//! Every request is relayed to the upstream. Chat completion requests
//! (non-GET, path ending in `/v1/chat/completions`) are hydrated first; a
//! body that is not JSON, or fails to hydrate, is relayed byte for byte.
//! Responses are streamed back as they arrive, so streaming completions
//! keep working.

pub mod types;

use std::sync::Arc;
use std::time::Duration;

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::{Request, State};
use axum::http::header::{self, HeaderMap, HeaderName};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use hydrator_config::ProxyConfig;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::hydrator::ChatHydrator;

use self::types::{ErrorResponse, HealthResponse};

/// Path suffix of requests that get hydrated.
pub const CHAT_COMPLETIONS_SUFFIX: &str = "/v1/chat/completions";

/// Largest request body the proxy will buffer.
const MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

/// Response headers that describe the upstream connection, not the payload.
const HOP_BY_HOP: [HeaderName; 8] = [
    header::CONNECTION,
    HeaderName::from_static("keep-alive"),
    header::PROXY_AUTHENTICATE,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
];

/// Errors from running the proxy.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),

    #[error("failed to read request body: {0}")]
    Body(#[from] axum::Error),

    #[error("Error connecting to upstream: {0}")]
    Upstream(#[from] reqwest::Error),
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = match &self {
            ProxyError::Body(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::BAD_GATEWAY,
        };
        (status, Json(ErrorResponse::proxy_error(self.to_string()))).into_response()
    }
}

/// Shared state for the proxy handlers.
pub struct ProxyState {
    pub hydrator: Arc<ChatHydrator>,
    pub client: reqwest::Client,
    pub upstream_url: String,
    pub request_timeout: Duration,
}

impl ProxyState {
    pub fn new(hydrator: Arc<ChatHydrator>, upstream_url: impl Into<String>) -> Self {
        Self {
            hydrator,
            client: reqwest::Client::new(),
            upstream_url: upstream_url.into().trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }

    /// Build from the `[proxy]` config section.
    pub fn from_config(config: &ProxyConfig, hydrator: Arc<ChatHydrator>) -> Self {
        Self::new(hydrator, &config.upstream_url)
            .with_request_timeout(Duration::from_secs(config.request_timeout_secs))
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Build the axum router: `/health` plus a catch-all forwarder.
pub fn router(state: Arc<ProxyState>) -> axum::Router {
    axum::Router::new()
        .route("/health", get(handle_health))
        .fallback(handle_forward)
        .with_state(state)
}

/// Serve the proxy on `listen_addr:listen_port` until `shutdown` resolves.
pub async fn serve(
    config: &ProxyConfig,
    state: Arc<ProxyState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), ProxyError> {
    let addr = format!("{}:{}", config.listen_addr, config.listen_port);
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ProxyError::Bind {
            addr: addr.clone(),
            source,
        })?;
    info!(addr = %addr, upstream = %state.upstream_url, "Proxy listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Proxy stopped");
    Ok(())
}

// ── Route handlers ──────────────────────────────────────────────────────

async fn handle_health(State(state): State<Arc<ProxyState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: crate::build_info::VERSION.to_string(),
        git_hash: crate::build_info::GIT_HASH.to_string(),
        build_profile: crate::build_info::BUILD_PROFILE.to_string(),
        upstream_url: state.upstream_url.clone(),
    })
}

async fn handle_forward(State(state): State<Arc<ProxyState>>, req: Request) -> Response {
    match forward(&state, req).await {
        Ok(resp) => resp,
        Err(e) => {
            error!(error = %e, "Proxy request failed");
            e.into_response()
        }
    }
}

async fn forward(state: &ProxyState, req: Request) -> Result<Response, ProxyError> {
    let (parts, body) = req.into_parts();
    let body = axum::body::to_bytes(body, MAX_BODY_BYTES).await?;

    let path = parts.uri.path();
    let body = if parts.method != Method::GET && path.ends_with(CHAT_COMPLETIONS_SUFFIX) {
        hydrate_body(state, body).await
    } else {
        body
    };

    let mut url = format!("{}{path}", state.upstream_url);
    if let Some(query) = parts.uri.query() {
        url.push('?');
        url.push_str(query);
    }

    let mut headers = parts.headers;
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    debug!(method = %parts.method, url = %url, "Forwarding request");
    let upstream = state
        .client
        .request(parts.method, &url)
        .headers(headers)
        .body(body)
        .timeout(state.request_timeout)
        .send()
        .await?;

    let status = upstream.status();
    let headers = response_headers(upstream.headers());
    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Hydrate a chat completion body, or return it unchanged.
async fn hydrate_body(state: &ProxyState, body: Bytes) -> Bytes {
    let value: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(e) => {
            debug!(error = %e, "Chat completion body is not JSON, forwarding as-is");
            return body;
        }
    };

    let hydrated = match state.hydrator.hydrate_value(value).await {
        Ok(hydrated) => hydrated,
        Err(e) => {
            warn!(error = %e, "Hydration failed, forwarding original body");
            return body;
        }
    };

    match serde_json::to_vec(&hydrated) {
        Ok(bytes) => Bytes::from(bytes),
        Err(e) => {
            warn!(error = %e, "Failed to encode hydrated body, forwarding original body");
            body
        }
    }
}

fn response_headers(upstream: &HeaderMap) -> HeaderMap {
    let mut headers = upstream.clone();
    for name in &HOP_BY_HOP {
        headers.remove(name);
    }
    headers.remove(header::CONTENT_LENGTH);
    headers
}
