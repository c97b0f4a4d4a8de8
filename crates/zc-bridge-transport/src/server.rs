//! Gateway WebSocket endpoint.

use std::{future::Future, sync::Arc};

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    response::IntoResponse,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::{connection::handle_socket, state::BridgeState};

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<BridgeState>>,
) -> impl IntoResponse {
    ws.on_failed_upgrade(|e| tracing::error!("WebSocket upgrade failed: {e}"))
        .on_upgrade(move |socket| handle_socket(socket, state))
}

/// Create the gateway router. Every path accepts the upgrade.
#[must_use]
pub fn create_router(state: Arc<BridgeState>) -> Router {
    Router::new()
        .fallback(ws_handler)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the gateway on `listener` until `shutdown` resolves.
///
/// # Errors
/// Returns error if accepting connections fails.
pub async fn serve<F>(
    listener: TcpListener,
    state: Arc<BridgeState>,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        tracing::info!("zc-bridge listening on {addr}");
    }
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}
