//! Environment configuration for the browser-facing proxy.

use std::{net::SocketAddr, path::PathBuf};

use zc_bridge_core::ConfigError;

/// Default upstream gateway.
pub const DEFAULT_GATEWAY_URL: &str = "ws://zc-bridge:18789/";
/// Default directory of built client assets.
pub const DEFAULT_STATIC_DIR: &str = "build/client";

/// Proxy settings.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Gateway WebSocket every browser connection is relayed to.
    pub gateway_url: String,
    /// Bearer token sent on the upstream handshake.
    pub gateway_token: Option<String>,
    pub listen_addr: SocketAddr,
    /// Root of the static files.
    pub static_dir: PathBuf,
    /// Origin answering requests no static file matches.
    pub ssr_origin: Option<String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            gateway_token: None,
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            ssr_origin: None,
        }
    }
}

impl ProxyConfig {
    /// Load from the process environment.
    ///
    /// # Errors
    /// Returns error if a variable holds an unparsable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through `lookup`. Empty values count as unset.
    ///
    /// Recognized keys: `GATEWAY_URL`, `GATEWAY_TOKEN`, `PROXY_ADDR`,
    /// `STATIC_DIR`, `SSR_ORIGIN`.
    ///
    /// # Errors
    /// Returns error if a variable holds an unparsable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(url) = get("GATEWAY_URL") {
            config.gateway_url = url;
        }
        config.gateway_token = get("GATEWAY_TOKEN");
        if let Some(raw) = get("PROXY_ADDR") {
            config.listen_addr = raw.parse().map_err(|_| ConfigError::InvalidValue {
                key: "PROXY_ADDR",
                value: raw.clone(),
            })?;
        }
        if let Some(dir) = get("STATIC_DIR") {
            config.static_dir = PathBuf::from(dir);
        }
        config.ssr_origin = get("SSR_ORIGIN");

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ProxyConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ProxyConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.gateway_url, DEFAULT_GATEWAY_URL);
        assert!(config.gateway_token.is_none());
        assert_eq!(config.listen_addr.port(), 3000);
        assert_eq!(config.static_dir, PathBuf::from("build/client"));
        assert!(config.ssr_origin.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("GATEWAY_URL", "ws://127.0.0.1:18789/"),
            ("GATEWAY_TOKEN", "tok"),
            ("PROXY_ADDR", "127.0.0.1:8080"),
            ("STATIC_DIR", "/srv/www"),
            ("SSR_ORIGIN", "http://127.0.0.1:3001"),
        ])
        .unwrap();
        assert_eq!(config.gateway_url, "ws://127.0.0.1:18789/");
        assert_eq!(config.gateway_token.as_deref(), Some("tok"));
        assert_eq!(config.listen_addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
        assert_eq!(config.ssr_origin.as_deref(), Some("http://127.0.0.1:3001"));
    }

    #[test]
    fn test_invalid_addr() {
        assert!(matches!(
            load(&[("PROXY_ADDR", "localhost")]),
            Err(ConfigError::InvalidValue { key: "PROXY_ADDR", .. })
        ));
    }
}
