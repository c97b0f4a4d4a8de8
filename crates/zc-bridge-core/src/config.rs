//! Environment configuration for the bridge.

use std::{net::SocketAddr, time::Duration};

/// Default webhook of the automation backend.
pub const DEFAULT_WEBHOOK_URL: &str = "http://zeroclaw:3000/webhook";
/// Default deadline for one forwarded call.
pub const DEFAULT_FORWARD_TIMEOUT: Duration = Duration::from_secs(120);
/// Interval between heartbeat pings.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);
/// Write deadline for one heartbeat ping.
pub const PING_DEADLINE: Duration = Duration::from_secs(2);

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Bridge settings.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Webhook receiving forwarded calls.
    pub webhook_url: String,
    /// Bearer token for the webhook. `None` omits the header.
    pub bearer_token: Option<String>,
    /// Deadline for one forwarded call. `None` waits indefinitely.
    pub forward_timeout: Option<Duration>,
    /// Gateway listen address.
    pub listen_addr: SocketAddr,
    pub heartbeat_interval: Duration,
    pub ping_deadline: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            webhook_url: DEFAULT_WEBHOOK_URL.to_string(),
            bearer_token: None,
            forward_timeout: Some(DEFAULT_FORWARD_TIMEOUT),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 18789)),
            heartbeat_interval: HEARTBEAT_INTERVAL,
            ping_deadline: PING_DEADLINE,
        }
    }
}

impl BridgeConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns error if a variable holds an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`. Empty values count as unset.
    ///
    /// Recognized keys: `ZEROCLAW_URL`, `ZEROCLAW_BEARER_TOKEN`,
    /// `ZEROCLAW_TIMEOUT_SECS` (`0` disables the deadline).
    ///
    /// # Errors
    /// Returns error if a variable holds an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("ZEROCLAW_URL") {
            config.webhook_url = url;
        }
        config.bearer_token = get("ZEROCLAW_BEARER_TOKEN");

        if let Some(raw) = get("ZEROCLAW_TIMEOUT_SECS") {
            let secs: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "ZEROCLAW_TIMEOUT_SECS",
                value: raw.clone(),
            })?;
            config.forward_timeout = (secs > 0).then_some(Duration::from_secs(secs));
        }

        tracing::debug!(
            webhook_url = %config.webhook_url,
            has_token = config.bearer_token.is_some(),
            "Loaded bridge configuration"
        );
        Ok(config)
    }
}
