//! Lifecycle of one gateway connection.
//!
//! `Connecting -> AwaitingHandshake -> Authenticated -> Closed`:
//! the challenge goes out as soon as the socket is upgraded, frames are
//! discarded until a `connect` request arrives, and from then on every
//! request is dispatched on its own task. Any read failure closes the
//! connection.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Bytes,
    extract::ws::{Message, WebSocket},
};
use chrono::Utc;
use futures::{
    StreamExt,
    stream::{SplitSink, SplitStream},
};
use tokio::{
    task::{JoinHandle, JoinSet},
    time::{Instant, MissedTickBehavior},
};
use tracing::Instrument;
use uuid::Uuid;
use zc_bridge_core::{Event, Frame, Request, Response};

use crate::{
    dispatch::dispatch,
    state::BridgeState,
    writer::{ControlKind, FrameWriter},
};

/// Writer over the send half of an axum WebSocket.
pub type GatewayWriter = FrameWriter<SplitSink<WebSocket, Message>>;

type GatewayReader = SplitStream<WebSocket>;

/// Drive one upgraded socket until it closes.
pub async fn handle_socket(socket: WebSocket, state: Arc<BridgeState>) {
    let conn_id = Uuid::new_v4();
    let span = tracing::info_span!("gateway", conn = %conn_id);
    run(socket, state).instrument(span).await;
}

async fn run(socket: WebSocket, state: Arc<BridgeState>) {
    let (sink, mut reader) = socket.split();
    let writer = FrameWriter::new(sink);
    tracing::info!("Client connected");

    if let Err(e) = writer.send(Event::challenge(challenge_nonce())).await {
        tracing::debug!("Failed to send challenge: {e}");
    }

    let Some(connect) = await_handshake(&mut reader).await else {
        tracing::info!("Client disconnected before handshake");
        return;
    };
    if let Err(e) = writer.send(Response::ok(connect.id, None)).await {
        tracing::debug!("Failed to acknowledge connect: {e}");
    }
    tracing::info!("Gateway authenticated");

    let heartbeat = spawn_heartbeat(
        writer.clone(),
        state.heartbeat_interval(),
        state.ping_deadline(),
    );
    let mut dispatches = JoinSet::new();

    loop {
        tokio::select! {
            frame = read_frame(&mut reader) => match frame {
                Some(Frame::Request(req)) => {
                    let state = Arc::clone(&state);
                    let writer = writer.clone();
                    dispatches.spawn(respond(state, writer, req).in_current_span());
                }
                Some(other) => {
                    tracing::trace!(kind = ?other.frame_type(), "Ignoring non-request frame");
                }
                None => break,
            },
            Some(joined) = dispatches.join_next(), if !dispatches.is_empty() => {
                if let Err(e) = joined {
                    tracing::error!("Dispatch task failed: {e}");
                }
            }
        }
    }

    // Closed: nothing in flight may outlive the connection.
    heartbeat.abort();
    let in_flight = dispatches.len();
    dispatches.abort_all();
    tracing::info!(in_flight, "Gateway disconnected");
}

/// Nanosecond timestamp; a marker, not a secret.
fn challenge_nonce() -> i64 {
    Utc::now().timestamp_nanos_opt().unwrap_or_default()
}

/// Discard frames until a `connect` request. `None` if the socket closed first.
async fn await_handshake(reader: &mut GatewayReader) -> Option<Request> {
    loop {
        match read_frame(reader).await? {
            Frame::Request(req) if req.is_connect() => return Some(req),
            other => {
                tracing::debug!(kind = ?other.frame_type(), "Discarding frame before handshake");
            }
        }
    }
}

/// Next decoded frame, or `None` once the connection must close.
///
/// Control messages are skipped. A malformed frame is treated like a
/// transport failure.
async fn read_frame(reader: &mut GatewayReader) -> Option<Frame> {
    while let Some(msg) = reader.next().await {
        let decoded = match msg {
            Ok(Message::Text(text)) => Frame::decode(text.as_str().as_bytes()),
            Ok(Message::Binary(data)) => Frame::decode(&data),
            Ok(Message::Close(_)) => return None,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!("WebSocket read failed: {e}");
                return None;
            }
        };
        return match decoded {
            Ok(frame) => Some(frame),
            Err(e) => {
                tracing::warn!("Closing connection on malformed frame: {e}");
                None
            }
        };
    }
    None
}

/// Dispatch one request and write its response, then the session update if any.
async fn respond(state: Arc<BridgeState>, writer: GatewayWriter, req: Request) {
    let id = req.id.clone();
    let outcome = dispatch(&state, req).await;

    if let Err(e) = writer.send(outcome.response).await {
        tracing::debug!(%id, "Dropped response: {e}");
    }
    if let Some(payload) = outcome.update {
        if let Err(e) = writer
            .send_sequenced(Event::session_updated(payload), &state.sequence)
            .await
        {
            tracing::debug!(%id, "Dropped session update: {e}");
        }
    }
}

/// Ping the peer every `interval` until aborted. Failed pings are not fatal.
fn spawn_heartbeat(writer: GatewayWriter, interval: Duration, deadline: Duration) -> JoinHandle<()> {
    tokio::spawn(
        async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = writer
                    .send_control(ControlKind::Ping, Bytes::from_static(b"ping"), deadline)
                    .await
                {
                    tracing::debug!("Heartbeat ping failed: {e}");
                }
            }
        }
        .in_current_span(),
    )
}
