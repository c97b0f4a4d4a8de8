//! Opaque WebSocket relay between a browser and the gateway.
//!
//! Text and binary frames are copied verbatim in both directions. Nothing
//! is parsed. When either side closes or errors, both sides are closed.

use std::sync::Arc;

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream,
    tungstenite::{
        Message as UpstreamMessage,
        client::IntoClientRequest,
        http::{HeaderValue, header::AUTHORIZATION},
    },
};
use tracing::Instrument;
use uuid::Uuid;

use crate::{ProxyError, ProxyState, config::ProxyConfig};

type Upstream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What to do with one frame read from either side.
#[derive(Debug, PartialEq)]
enum Relay<T> {
    Forward(T),
    Skip,
    Close,
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<ProxyState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| {
        let span = tracing::info_span!("relay", conn = %Uuid::new_v4());
        relay(socket, state).instrument(span)
    })
}

/// Open the upstream socket, adding the bearer token when configured.
async fn connect_upstream(config: &ProxyConfig) -> Result<Upstream, ProxyError> {
    let mut request = config.gateway_url.as_str().into_client_request()?;
    if let Some(token) = &config.gateway_token {
        let value =
            HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ProxyError::InvalidToken)?;
        request.headers_mut().insert(AUTHORIZATION, value);
    }
    let (upstream, _) = tokio_tungstenite::connect_async(request).await?;
    Ok(upstream)
}

async fn relay(mut browser: WebSocket, state: Arc<ProxyState>) {
    let upstream = match connect_upstream(&state.config).await {
        Ok(upstream) => upstream,
        Err(e) => {
            tracing::warn!("Failed to reach gateway at {}: {e}", state.config.gateway_url);
            let _ = browser.send(Message::Close(None)).await;
            return;
        }
    };
    tracing::info!("Relay opened");

    let (mut browser_tx, mut browser_rx) = browser.split();
    let (mut upstream_tx, mut upstream_rx) = upstream.split();

    let mut to_upstream = tokio::spawn(
        async move {
            while let Some(msg) = browser_rx.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!("Browser read failed: {e}");
                        break;
                    }
                };
                match browser_to_upstream(msg) {
                    Relay::Forward(msg) => {
                        if let Err(e) = upstream_tx.send(msg).await {
                            tracing::debug!("Upstream write failed: {e}");
                            break;
                        }
                    }
                    Relay::Skip => {}
                    Relay::Close => break,
                }
            }
            let _ = upstream_tx.close().await;
        }
        .in_current_span(),
    );

    let mut to_browser = tokio::spawn(
        async move {
            while let Some(msg) = upstream_rx.next().await {
                let msg = match msg {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!("Upstream read failed: {e}");
                        break;
                    }
                };
                match upstream_to_browser(msg) {
                    Relay::Forward(msg) => {
                        if let Err(e) = browser_tx.send(msg).await {
                            tracing::debug!("Browser write failed: {e}");
                            break;
                        }
                    }
                    Relay::Skip => {}
                    Relay::Close => break,
                }
            }
            let _ = browser_tx.close().await;
        }
        .in_current_span(),
    );

    // Whichever direction ends first tears down the other.
    tokio::select! {
        _ = &mut to_upstream => to_browser.abort(),
        _ = &mut to_browser => to_upstream.abort(),
    }
    tracing::info!("Relay closed");
}

fn browser_to_upstream(msg: Message) -> Relay<UpstreamMessage> {
    match msg {
        Message::Text(text) => Relay::Forward(UpstreamMessage::text(text.as_str().to_owned())),
        Message::Binary(data) => Relay::Forward(UpstreamMessage::Binary(data)),
        Message::Close(_) => Relay::Close,
        Message::Ping(_) | Message::Pong(_) => Relay::Skip,
    }
}

fn upstream_to_browser(msg: UpstreamMessage) -> Relay<Message> {
    match msg {
        UpstreamMessage::Text(text) => Relay::Forward(Message::Text(text.as_str().to_owned().into())),
        UpstreamMessage::Binary(data) => Relay::Forward(Message::Binary(data)),
        UpstreamMessage::Close(_) => Relay::Close,
        UpstreamMessage::Ping(_) | UpstreamMessage::Pong(_) | UpstreamMessage::Frame(_) => {
            Relay::Skip
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::body::Bytes;

    use super::*;

    #[test]
    fn test_frames_pass_through_verbatim() {
        let raw = r#"{"type":"req","id":"1","method":"connect"}"#;
        assert_eq!(
            browser_to_upstream(Message::Text(raw.to_owned().into())),
            Relay::Forward(UpstreamMessage::text(raw.to_owned()))
        );
        assert_eq!(
            upstream_to_browser(UpstreamMessage::Binary(Bytes::from_static(b"\x00\x01"))),
            Relay::Forward(Message::Binary(Bytes::from_static(b"\x00\x01")))
        );
    }

    #[test]
    fn test_control_frames_are_not_relayed() {
        assert_eq!(browser_to_upstream(Message::Ping(Bytes::new())), Relay::Skip);
        assert_eq!(upstream_to_browser(UpstreamMessage::Pong(Bytes::new())), Relay::Skip);
        assert_eq!(browser_to_upstream(Message::Close(None)), Relay::Close);
        assert_eq!(upstream_to_browser(UpstreamMessage::Close(None)), Relay::Close);
    }
}
