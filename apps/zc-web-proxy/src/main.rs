//! Browser-facing proxy.
//!
//! Run with: cargo run -p zc-web-proxy
//!
//! Configure with `GATEWAY_URL`, `GATEWAY_TOKEN`, `PROXY_ADDR`,
//! `STATIC_DIR` and `SSR_ORIGIN`.

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use zc_bridge_proxy::{ProxyConfig, ProxyState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ProxyConfig::from_env()?;
    let addr = config.listen_addr;
    let state = Arc::new(ProxyState::new(config)?);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    zc_bridge_proxy::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
            std::future::pending::<()>().await;
        }
    })
    .await?;
    Ok(())
}
