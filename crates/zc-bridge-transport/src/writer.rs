//! Serialized writes to one WebSocket.

use std::{fmt::Display, sync::Arc, time::Duration};

use axum::{body::Bytes, extract::ws::Message};
use futures::{Sink, SinkExt};
use tokio::sync::Mutex;
use zc_bridge_core::{Event, Frame, FrameError, Sequence};

/// Write error.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] FrameError),
    #[error("WebSocket write failed: {0}")]
    Transport(String),
    #[error("Write deadline of {0:?} exceeded")]
    Timeout(Duration),
}

/// Protocol-level control frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    Ping,
    Pong,
}

impl ControlKind {
    fn into_message(self, payload: Bytes) -> Message {
        match self {
            Self::Ping => Message::Ping(payload),
            Self::Pong => Message::Pong(payload),
        }
    }
}

/// Shared handle that serializes every write to one connection.
///
/// Data frames and control frames go through the same lock, so two
/// concurrent writers never interleave on the wire. The lock covers the
/// write only; a failed write releases it like a successful one.
pub struct FrameWriter<S> {
    sink: Arc<Mutex<S>>,
}

impl<S> Clone for FrameWriter<S> {
    fn clone(&self) -> Self {
        Self {
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<S> FrameWriter<S>
where
    S: Sink<Message> + Unpin + Send,
    S::Error: Display,
{
    /// Wrap the write half of a connection.
    #[must_use]
    pub fn new(sink: S) -> Self {
        Self {
            sink: Arc::new(Mutex::new(sink)),
        }
    }

    /// Write one data frame.
    ///
    /// # Errors
    /// Returns error if encoding or the underlying write fails.
    pub async fn send(&self, frame: impl Into<Frame>) -> Result<(), WriteError> {
        let text = frame.into().encode()?;
        let mut sink = self.sink.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))
    }

    /// Stamp `event` with the next value of `sequence` and write it.
    ///
    /// The value is drawn under the write lock, so values on one
    /// connection appear on the wire in increasing order.
    /// Encoding the stamped frame also happens under the lock.
    ///
    /// # Errors
    /// Returns error if encoding or the underlying write fails.
    pub async fn send_sequenced(&self, event: Event, sequence: &Sequence) -> Result<u64, WriteError> {
        let mut sink = self.sink.lock().await;
        let seq = sequence.next();
        let text = Frame::from(event.with_seq(seq)).encode()?;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| WriteError::Transport(e.to_string()))?;
        Ok(seq)
    }

    /// Write a control frame, giving up after `deadline`.
    ///
    /// # Errors
    /// Returns error if the write fails or does not finish in time.
    pub async fn send_control(
        &self,
        kind: ControlKind,
        payload: Bytes,
        deadline: Duration,
    ) -> Result<(), WriteError> {
        let mut sink = self.sink.lock().await;
        match tokio::time::timeout(deadline, sink.send(kind.into_message(payload))).await {
            Ok(result) => result.map_err(|e| WriteError::Transport(e.to_string())),
            Err(_) => Err(WriteError::Timeout(deadline)),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::{StreamExt, channel::mpsc};
    use serde_json::{Value, json};

    use super::*;
    use zc_bridge_core::Response;

    fn text_json(msg: &Message) -> Value {
        match msg {
            Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
            other => panic!("Expected text message, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_send_writes_whole_frames() {
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let writer = FrameWriter::new(tx);

        let mut tasks = Vec::new();
        for i in 0..50 {
            let writer = writer.clone();
            tasks.push(tokio::spawn(async move {
                writer
                    .send(Response::ok(i.to_string(), Some(json!({ "n": i }))))
                    .await
            }));
        }
        for task in tasks {
            tokio_test::assert_ok!(task.await.unwrap());
        }
        drop(writer);

        let mut ids = Vec::new();
        while let Some(msg) = rx.next().await {
            let frame = text_json(&msg);
            assert_eq!(frame["payload"]["n"].to_string(), frame["id"].as_str().unwrap());
            ids.push(frame["id"].as_str().unwrap().to_string());
        }
        assert_eq!(ids.len(), 50);
    }

    #[tokio::test]
    async fn test_sequenced_events_are_increasing() {
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let writer = FrameWriter::new(tx);
        let sequence = Arc::new(Sequence::new());

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let writer = writer.clone();
            let sequence = Arc::clone(&sequence);
            tasks.push(tokio::spawn(async move {
                writer
                    .send_sequenced(Event::session_updated(json!({})), &sequence)
                    .await
                    .unwrap()
            }));
        }
        for task in tasks {
            task.await.unwrap();
        }
        drop(writer);

        let mut last = 0;
        while let Some(msg) = rx.next().await {
            let seq = text_json(&msg)["seq"].as_u64().unwrap();
            assert!(seq > last, "seq {seq} after {last}");
            last = seq;
        }
        assert_eq!(last, 20);
    }

    #[tokio::test]
    async fn test_control_frame() {
        let (tx, mut rx) = mpsc::unbounded::<Message>();
        let writer = FrameWriter::new(tx);
        writer
            .send_control(ControlKind::Ping, Bytes::from_static(b"ping"), Duration::from_secs(1))
            .await
            .unwrap();
        match rx.next().await {
            Some(Message::Ping(payload)) => assert_eq!(&payload[..], b"ping"),
            other => panic!("Expected ping, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_is_reported_and_lock_released() {
        let (tx, rx) = mpsc::unbounded::<Message>();
        drop(rx);
        let writer = FrameWriter::new(tx);

        let first = writer.send(Response::ok("1", None)).await;
        assert!(matches!(first, Err(WriteError::Transport(_))));
        let second = writer
            .send_control(ControlKind::Ping, Bytes::new(), Duration::from_secs(1))
            .await;
        assert!(matches!(second, Err(WriteError::Transport(_))));
    }

    #[tokio::test]
    async fn test_control_deadline() {
        // Nobody drains the channel, so the second write never flushes.
        let (tx, _rx) = mpsc::channel::<Message>(1);
        let writer = FrameWriter::new(tx);
        writer.send(Response::ok("1", None)).await.unwrap();

        let result = writer
            .send_control(ControlKind::Ping, Bytes::new(), Duration::from_millis(50))
            .await;
        assert!(matches!(result, Err(WriteError::Timeout(_))));
    }
}
