//! Routing of authenticated requests.

use serde_json::{Value, json};
use zc_bridge_core::{Request, Response};

use crate::{forward, state::BridgeState};

/// Models advertised by `models.list`.
pub const MODEL_CATALOG: &[&str] = &["kimi-k2.5"];

/// Result of dispatching one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome {
    /// The response answering the request.
    pub response: Response,
    /// Payload for a follow-up `session.updated` event, written after the response.
    pub update: Option<Value>,
}

impl Outcome {
    const fn reply(response: Response) -> Self {
        Self {
            response,
            update: None,
        }
    }
}

/// Where a method is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    SessionsList,
    ModelsList,
    Forward,
}

impl Route {
    /// Exact-match routing on the method name.
    #[must_use]
    pub fn of(method: &str) -> Self {
        match method {
            "sessions.list" => Self::SessionsList,
            "models.list" => Self::ModelsList,
            _ => Self::Forward,
        }
    }
}

/// Handle one request. Built-in methods never fail; everything else goes
/// to the backend.
pub async fn dispatch(state: &BridgeState, req: Request) -> Outcome {
    match Route::of(&req.method) {
        Route::SessionsList => {
            let sessions = state.sessions.snapshot();
            Outcome::reply(Response::ok(req.id, Some(json!({ "sessions": sessions }))))
        }
        Route::ModelsList => {
            Outcome::reply(Response::ok(req.id, Some(json!({ "models": MODEL_CATALOG }))))
        }
        Route::Forward => forward::forward(state.backend(), req).await,
    }
}
