//! State shared by every gateway connection of one bridge.

use std::{sync::Arc, time::Duration};

use zc_bridge_core::{
    BridgeConfig, Sequence, SessionRegistry,
    config::{HEARTBEAT_INTERVAL, PING_DEADLINE},
};

use crate::forward::{Backend, ForwardError, WebhookBackend};

/// Bridge state.
///
/// One instance is shared by all connections: the session registry and the
/// sequence counter are process-wide, not per gateway.
pub struct BridgeState {
    /// Session metadata served by `sessions.list`.
    pub sessions: SessionRegistry,
    /// Counter stamped on `session.updated` events.
    pub sequence: Sequence,
    backend: Arc<dyn Backend>,
    heartbeat_interval: Duration,
    ping_deadline: Duration,
}

impl BridgeState {
    /// Create state around `backend` with default heartbeat timings.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            sessions: SessionRegistry::new(),
            sequence: Sequence::new(),
            backend,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            ping_deadline: PING_DEADLINE,
        }
    }

    /// Create state forwarding to the configured webhook.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be built.
    pub fn from_config(config: &BridgeConfig) -> Result<Self, ForwardError> {
        let backend = WebhookBackend::new(config)?;
        Ok(Self::new(Arc::new(backend))
            .with_heartbeat(config.heartbeat_interval, config.ping_deadline))
    }

    /// Override heartbeat timings.
    #[must_use]
    pub fn with_heartbeat(mut self, interval: Duration, ping_deadline: Duration) -> Self {
        self.heartbeat_interval = interval;
        self.ping_deadline = ping_deadline;
        self
    }

    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    #[must_use]
    pub const fn ping_deadline(&self) -> Duration {
        self.ping_deadline
    }
}
