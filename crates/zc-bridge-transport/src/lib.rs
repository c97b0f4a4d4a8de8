//! Gateway endpoint for the bridge.
//!
//! Provides:
//! - `FrameWriter` - Serialized writes to one WebSocket
//! - Connection lifecycle (challenge, handshake, heartbeat, dispatch)
//! - Request routing and webhook forwarding
//! - Axum router and server entry point

pub mod connection;
pub mod dispatch;
pub mod forward;
pub mod server;
pub mod state;
pub mod writer;

pub use forward::{Backend, ForwardError, WebhookBackend};
pub use server::{create_router, serve};
pub use state::BridgeState;
pub use writer::{ControlKind, FrameWriter, WriteError};
