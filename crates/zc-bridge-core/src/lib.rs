//! Core building blocks for the gateway bridge.
//!
//! This crate provides:
//! - `Frame` - The JSON wire envelope (`req` / `res` / `event`)
//! - `SessionRegistry` - Process-wide session metadata
//! - `Sequence` - Send-order counter stamped on `session.updated` events
//! - `BridgeConfig` - Environment configuration

pub mod config;
pub mod frame;
pub mod sequence;
pub mod session;

pub use config::{BridgeConfig, ConfigError};
pub use frame::{ErrorShape, Event, Frame, FrameError, Request, Response};
pub use sequence::Sequence;
pub use session::{Session, SessionRegistry};
