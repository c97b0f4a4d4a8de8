//! Gateway bridge.
//!
//! Run with: cargo run -p zc-bridge
//!
//! Configure with `ZEROCLAW_URL`, `ZEROCLAW_BEARER_TOKEN` and
//! `ZEROCLAW_TIMEOUT_SECS`.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zc_bridge_core::BridgeConfig;
use zc_bridge_transport::BridgeState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = BridgeConfig::from_env()?;
    tracing::info!(
        webhook = %config.webhook_url,
        timeout = ?config.forward_timeout,
        "Forwarding unhandled calls"
    );

    let state = Arc::new(BridgeState::from_config(&config)?);
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;

    zc_bridge_transport::serve(listener, state, shutdown_signal()).await?;
    tracing::info!("zc-bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
