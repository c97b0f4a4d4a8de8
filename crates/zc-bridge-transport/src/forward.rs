//! Forwarding of unhandled calls to the backend webhook.

use std::error::Error as _;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Value, value::RawValue};
use zc_bridge_core::{BridgeConfig, Request, Response, frame::BRIDGE_ERROR};

use crate::dispatch::Outcome;

/// Forwarding error.
#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("Failed to build webhook client")]
    Client(#[source] reqwest::Error),
    #[error("Webhook request failed")]
    Transport(#[from] reqwest::Error),
}

impl ForwardError {
    /// Message including every error source, as shown to the gateway.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut text = self.to_string();
        let mut source = self.source();
        while let Some(inner) = source {
            text.push_str(": ");
            text.push_str(&inner.to_string());
            source = inner.source();
        }
        text
    }
}

/// Receiver of calls the bridge does not handle itself.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute `method` and return the reply payload.
    async fn call(&self, method: &str, params: Option<&RawValue>) -> Result<Value, ForwardError>;
}

#[derive(Serialize)]
struct ForwardBody<'a> {
    method: &'a str,
    params: Option<&'a RawValue>,
}

/// HTTP webhook backend.
#[derive(Debug, Clone)]
pub struct WebhookBackend {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl WebhookBackend {
    /// Build a backend from bridge configuration.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn new(config: &BridgeConfig) -> Result<Self, ForwardError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.forward_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(ForwardError::Client)?;
        Ok(Self::with_client(
            http,
            config.webhook_url.clone(),
            config.bearer_token.clone(),
        ))
    }

    #[must_use]
    pub const fn with_client(http: reqwest::Client, url: String, token: Option<String>) -> Self {
        Self { http, url, token }
    }
}

#[async_trait]
impl Backend for WebhookBackend {
    async fn call(&self, method: &str, params: Option<&RawValue>) -> Result<Value, ForwardError> {
        let mut request = self
            .http
            .post(&self.url)
            .json(&ForwardBody { method, params });
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        // The status is not interpreted; whatever body came back is forwarded.
        match response.bytes().await {
            Ok(body) => {
                tracing::debug!(%status, bytes = body.len(), "Webhook replied");
                Ok(decode_payload(&body))
            }
            Err(e) => {
                tracing::debug!(%status, "Failed to read webhook body: {e}");
                Ok(Value::Null)
            }
        }
    }
}

/// First JSON value in `body`, or `null` when there is none.
#[must_use]
pub fn decode_payload(body: &[u8]) -> Value {
    serde_json::Deserializer::from_slice(body)
        .into_iter::<Value>()
        .next()
        .and_then(Result::ok)
        .unwrap_or(Value::Null)
}

/// Forward `req` and turn the reply into a response plus a session update.
pub async fn forward(backend: &dyn Backend, req: Request) -> Outcome {
    match backend.call(&req.method, req.params.as_deref()).await {
        Ok(payload) => Outcome {
            response: Response::ok(req.id, Some(payload.clone())),
            update: Some(payload),
        },
        Err(e) => {
            let message = e.describe();
            tracing::warn!(id = %req.id, method = %req.method, "Forwarding failed: {message}");
            Outcome {
                response: Response::error(req.id, BRIDGE_ERROR, message),
                update: None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_decode_payload() {
        assert_eq!(decode_payload(br#"{"ok":1}"#), json!({"ok": 1}));
        assert_eq!(decode_payload(b"  [1, 2]\n"), json!([1, 2]));
        assert_eq!(decode_payload(br#"{"first":true} {"second":true}"#), json!({"first": true}));
    }

    #[test]
    fn test_undecodable_body_is_null() {
        assert_eq!(decode_payload(b""), Value::Null);
        assert_eq!(decode_payload(b"<html>oops</html>"), Value::Null);
        assert_eq!(decode_payload(br#"{"truncated":"#), Value::Null);
    }

    #[test]
    fn test_forward_body_passes_params_through() {
        let params = RawValue::from_string(r#"{"text":"hi"}"#.to_string()).unwrap();
        let body = serde_json::to_string(&ForwardBody {
            method: "chat.send",
            params: Some(&params),
        })
        .unwrap();
        assert_eq!(body, r#"{"method":"chat.send","params":{"text":"hi"}}"#);

        let body = serde_json::to_string(&ForwardBody {
            method: "status",
            params: None,
        })
        .unwrap();
        assert_eq!(body, r#"{"method":"status","params":null}"#);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_bridge_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let backend = WebhookBackend::with_client(
            reqwest::Client::new(),
            format!("http://{addr}/webhook"),
            None,
        );
        let outcome = forward(&backend, Request::new("x", "chat.send")).await;

        assert_eq!(outcome.response.id, "x");
        assert!(!outcome.response.ok);
        let error = outcome.response.error.unwrap();
        assert_eq!(error.code, "bridge_error");
        assert!(error.message.starts_with("Webhook request failed"));
        assert!(outcome.update.is_none());
    }

    #[tokio::test]
    async fn test_invalid_url_is_bridge_error() {
        let backend =
            WebhookBackend::with_client(reqwest::Client::new(), "not a url".to_string(), None);
        let outcome = forward(&backend, Request::new("y", "chat.send")).await;
        assert_eq!(outcome.response.error.unwrap().code, "bridge_error");
        assert!(outcome.update.is_none());
    }
}
