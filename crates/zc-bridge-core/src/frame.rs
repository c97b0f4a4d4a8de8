//! Wire envelope for the gateway protocol.
//!
//! Every message in either direction is one JSON object tagged by `type`.
//! On the wire the envelope is flat; in memory it is split by role so a
//! frame can only ever carry the fields that belong to its kind.

use serde::{Deserialize, Serialize};
use serde_json::{Value, value::RawValue};

/// Method name of the handshake request.
pub const CONNECT_METHOD: &str = "connect";
/// Event sent right after the upgrade.
pub const CHALLENGE_EVENT: &str = "connect.challenge";
/// Event emitted after every forwarded call.
pub const SESSION_UPDATED_EVENT: &str = "session.updated";
/// Error code for forwarding failures.
pub const BRIDGE_ERROR: &str = "bridge_error";

/// Frame decode error.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid frame JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed frame: {0}")]
    Malformed(&'static str),
}

/// Discriminant of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameType {
    Req,
    Res,
    Event,
}

/// Error body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorShape {
    pub code: String,
    pub message: String,
}

/// An RPC call. `params` is kept as raw JSON and never interpreted.
#[derive(Debug, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    pub params: Option<Box<RawValue>>,
}

impl Request {
    /// Create a request without params.
    #[must_use]
    pub fn new(id: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            method: method.into(),
            params: None,
        }
    }

    /// Attach raw params.
    #[must_use]
    pub fn with_params(mut self, params: Box<RawValue>) -> Self {
        self.params = Some(params);
        self
    }

    #[must_use]
    pub fn is_connect(&self) -> bool {
        self.method == CONNECT_METHOD
    }
}

impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.method == other.method
            && self.params.as_deref().map(RawValue::get) == other.params.as_deref().map(RawValue::get)
    }
}

/// Answer to a [`Request`], correlated by `id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    pub id: String,
    pub ok: bool,
    pub payload: Option<Value>,
    pub error: Option<ErrorShape>,
}

impl Response {
    /// Successful response.
    #[must_use]
    pub fn ok(id: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            id: id.into(),
            ok: true,
            payload,
            error: None,
        }
    }

    /// Failed response with an error body.
    #[must_use]
    pub fn error(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ok: false,
            payload: None,
            error: Some(ErrorShape {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Server-initiated notification.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub event: String,
    pub payload: Option<Value>,
    pub seq: Option<u64>,
}

impl Event {
    #[must_use]
    pub fn new(event: impl Into<String>, payload: Option<Value>) -> Self {
        Self {
            event: event.into(),
            payload,
            seq: None,
        }
    }

    /// The handshake challenge carrying `nonce`.
    #[must_use]
    pub fn challenge(nonce: i64) -> Self {
        Self::new(CHALLENGE_EVENT, Some(serde_json::json!({ "nonce": nonce })))
    }

    /// A `session.updated` event; `seq` is stamped at send time.
    #[must_use]
    pub fn session_updated(payload: Value) -> Self {
        Self::new(SESSION_UPDATED_EVENT, Some(payload))
    }

    #[must_use]
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = Some(seq);
        self
    }
}

/// A decoded protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "WireFrame", try_from = "WireFrame")]
pub enum Frame {
    Request(Request),
    Response(Response),
    Event(Event),
}

impl Frame {
    /// Decode one frame from wire bytes.
    ///
    /// # Errors
    /// Returns `FrameError::Json` if the bytes are not a JSON envelope and
    /// `FrameError::Malformed` if a field required by `type` is missing.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        let wire: WireFrame = serde_json::from_slice(bytes)?;
        Self::try_from(wire)
    }

    /// Encode to the JSON wire form.
    ///
    /// # Errors
    /// Returns error if a payload fails to serialize.
    pub fn encode(&self) -> Result<String, FrameError> {
        Ok(serde_json::to_string(self)?)
    }

    #[must_use]
    pub const fn frame_type(&self) -> FrameType {
        match self {
            Self::Request(_) => FrameType::Req,
            Self::Response(_) => FrameType::Res,
            Self::Event(_) => FrameType::Event,
        }
    }
}

impl From<Request> for Frame {
    fn from(req: Request) -> Self {
        Self::Request(req)
    }
}

impl From<Response> for Frame {
    fn from(res: Response) -> Self {
        Self::Response(res)
    }
}

impl From<Event> for Frame {
    fn from(event: Event) -> Self {
        Self::Event(event)
    }
}

/// Flat envelope as it appears on the wire. Absent fields stay `None`.
#[derive(Debug, Default, Serialize, Deserialize)]
struct WireFrame {
    #[serde(rename = "type")]
    kind: Option<FrameType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    params: Option<Box<RawValue>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ok: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    payload: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error: Option<ErrorShape>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    event: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq: Option<u64>,
}

impl TryFrom<WireFrame> for Frame {
    type Error = FrameError;

    fn try_from(wire: WireFrame) -> Result<Self, Self::Error> {
        match wire.kind.ok_or(FrameError::Malformed("missing type"))? {
            FrameType::Req => Ok(Self::Request(Request {
                id: wire.id.ok_or(FrameError::Malformed("req frame missing id"))?,
                method: wire
                    .method
                    .ok_or(FrameError::Malformed("req frame missing method"))?,
                params: wire.params,
            })),
            FrameType::Res => Ok(Self::Response(Response {
                id: wire.id.ok_or(FrameError::Malformed("res frame missing id"))?,
                ok: wire.ok.unwrap_or(false),
                payload: wire.payload,
                error: wire.error,
            })),
            FrameType::Event => Ok(Self::Event(Event {
                event: wire
                    .event
                    .ok_or(FrameError::Malformed("event frame missing event name"))?,
                payload: wire.payload,
                seq: wire.seq,
            })),
        }
    }
}

impl From<Frame> for WireFrame {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Request(req) => Self {
                kind: Some(FrameType::Req),
                id: Some(req.id),
                method: Some(req.method),
                params: req.params,
                ..Self::default()
            },
            Frame::Response(res) => Self {
                kind: Some(FrameType::Res),
                id: Some(res.id),
                ok: Some(res.ok),
                payload: res.payload,
                error: res.error,
                ..Self::default()
            },
            Frame::Event(event) => Self {
                kind: Some(FrameType::Event),
                event: Some(event.event),
                payload: event.payload,
                seq: event.seq,
                ..Self::default()
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn to_value(frame: impl Into<Frame>) -> Value {
        serde_json::from_str(&frame.into().encode().unwrap()).unwrap()
    }

    #[test]
    fn test_decode_connect_request() {
        let frame = Frame::decode(br#"{"type":"req","id":"1","method":"connect"}"#).unwrap();
        let Frame::Request(req) = frame else {
            panic!("Wrong frame type");
        };
        assert_eq!(req.id, "1");
        assert!(req.is_connect());
        assert!(req.params.is_none());
    }

    #[test]
    fn test_params_stay_raw() {
        let frame =
            Frame::decode(br#"{"type":"req","id":"7","method":"chat.send","params":{"b":1, "a":[2]}}"#)
                .unwrap();
        let Frame::Request(req) = frame else {
            panic!("Wrong frame type");
        };
        assert_eq!(req.params.unwrap().get(), r#"{"b":1, "a":[2]}"#);
    }

    #[test]
    fn test_ok_response_shape() {
        assert_eq!(
            to_value(Response::ok("1", None)),
            json!({"type": "res", "id": "1", "ok": true})
        );
        assert_eq!(
            to_value(Response::ok("2", Some(json!({"models": ["kimi-k2.5"]})))),
            json!({"type": "res", "id": "2", "ok": true, "payload": {"models": ["kimi-k2.5"]}})
        );
    }

    #[test]
    fn test_error_response_keeps_ok_false() {
        assert_eq!(
            to_value(Response::error("9", BRIDGE_ERROR, "connection refused")),
            json!({
                "type": "res",
                "id": "9",
                "ok": false,
                "error": {"code": "bridge_error", "message": "connection refused"}
            })
        );
    }

    #[test]
    fn test_null_payload_is_emitted() {
        assert_eq!(
            to_value(Response::ok("3", Some(Value::Null))),
            json!({"type": "res", "id": "3", "ok": true, "payload": null})
        );
    }

    #[test]
    fn test_event_shapes() {
        assert_eq!(
            to_value(Event::challenge(42)),
            json!({"type": "event", "event": "connect.challenge", "payload": {"nonce": 42}})
        );
        assert_eq!(
            to_value(Event::session_updated(json!({"k": "v"})).with_seq(5)),
            json!({"type": "event", "event": "session.updated", "payload": {"k": "v"}, "seq": 5})
        );
    }

    #[test]
    fn test_absent_optional_fields() {
        let Frame::Response(res) = Frame::decode(br#"{"type":"res","id":"x"}"#).unwrap() else {
            panic!("Wrong frame type");
        };
        assert!(!res.ok);
        assert!(res.payload.is_none());
        assert!(res.error.is_none());

        let Frame::Event(event) = Frame::decode(br#"{"type":"event","event":"tick"}"#).unwrap()
        else {
            panic!("Wrong frame type");
        };
        assert_eq!(event.seq, None);
    }

    #[test]
    fn test_missing_required_fields_are_malformed() {
        for raw in [
            r#"{"id":"1","method":"connect"}"#,
            r#"{"type":"req","method":"connect"}"#,
            r#"{"type":"req","id":"1"}"#,
            r#"{"type":"res","ok":true}"#,
            r#"{"type":"event","payload":{}}"#,
        ] {
            assert!(
                matches!(Frame::decode(raw.as_bytes()), Err(FrameError::Malformed(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn test_invalid_json_is_rejected() {
        assert!(matches!(Frame::decode(b"not json"), Err(FrameError::Json(_))));
        assert!(matches!(
            Frame::decode(br#"{"type":"bogus","id":"1"}"#),
            Err(FrameError::Json(_))
        ));
    }

    #[test]
    fn test_foreign_role_fields_are_dropped() {
        let frame =
            Frame::decode(br#"{"type":"req","id":"1","method":"m","ok":true,"seq":3}"#).unwrap();
        assert_eq!(
            to_value(frame),
            json!({"type": "req", "id": "1", "method": "m"})
        );
    }
}
