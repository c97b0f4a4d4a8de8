//! Browser-facing proxy for the bridge.
//!
//! Provides:
//! - `/ws` - Opaque WebSocket relay to the gateway
//! - `/assets/*` - Content-hashed static files with long-lived caching
//! - Everything else - Static files, then the server-render fallback

use std::{future::Future, sync::Arc};

use axum::{Router, handler::Handler, http::header::CACHE_CONTROL, routing::get};
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};

pub mod assets;
pub mod config;
pub mod relay;

pub use config::ProxyConfig;

/// Proxy error.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("Upstream WebSocket failed: {0}")]
    Upstream(Box<tungstenite::Error>),
    #[error("Gateway token is not a valid header value")]
    InvalidToken,
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Failed to read request body: {0}")]
    Body(String),
}

impl From<tungstenite::Error> for ProxyError {
    fn from(e: tungstenite::Error) -> Self {
        Self::Upstream(Box::new(e))
    }
}

/// Proxy state.
pub struct ProxyState {
    pub config: ProxyConfig,
    http: reqwest::Client,
}

impl ProxyState {
    /// Create state for `config`.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: ProxyConfig) -> Result<Self, ProxyError> {
        let http = reqwest::Client::builder().build()?;
        Ok(Self { config, http })
    }
}

/// Create the proxy router.
#[must_use]
pub fn create_router(state: Arc<ProxyState>) -> Router {
    let static_dir = state.config.static_dir.clone();

    let hashed_assets = ServiceBuilder::new()
        .layer(SetResponseHeaderLayer::overriding(
            CACHE_CONTROL,
            assets::immutable_cache,
        ))
        .service(ServeDir::new(static_dir.join("assets")));

    let files = ServeDir::new(&static_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(assets::render_fallback.with_state(Arc::clone(&state)));

    Router::new()
        .route("/ws", get(relay::ws_handler))
        .nest_service(assets::ASSET_PREFIX, hashed_assets)
        .fallback_service(files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the proxy on `listener` until `shutdown` resolves.
///
/// # Errors
/// Returns error if accepting connections fails.
pub async fn serve<F>(listener: TcpListener, state: Arc<ProxyState>, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!(
            gateway = %state.config.gateway_url,
            static_dir = %state.config.static_dir.display(),
            "Web proxy listening on http://{addr}"
        );
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
