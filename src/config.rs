//! Client configuration.
//!
//! The only setting is the authority's endpoint address.

use serde::Deserialize;
use thiserror::Error;

/// Endpoint used when nothing else is configured.
pub const DEFAULT_ENDPOINT: &str = "https://xo-game-client-1.onrender.com/";

/// Environment variable overriding the endpoint.
pub const ENDPOINT_ENV: &str = "TICTACTOE_ENDPOINT";

const SUPPORTED_SCHEMES: &[&str] = &["http", "https", "ws", "wss"];

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("endpoint is empty")]
    EmptyEndpoint,

    #[error("endpoint `{0}` has no scheme")]
    MissingScheme(String),

    #[error("unsupported scheme `{0}`")]
    UnsupportedScheme(String),

    #[error("endpoint `{0}` has no host")]
    MissingHost(String),
}

/// Configuration for a client session.
///
/// # Example
///
/// ```
/// use tictactoe_session::config::ClientConfig;
///
/// let config = ClientConfig::new("wss://play.example.com/socket");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClientConfig {
    /// Address of the game authority.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }

    /// Read the endpoint from `TICTACTOE_ENDPOINT`, falling back to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = match std::env::var(ENDPOINT_ENV) {
            Ok(endpoint) if !endpoint.trim().is_empty() => Self::new(endpoint.trim()),
            _ => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Check the endpoint is an absolute http(s)/ws(s) address.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::EmptyEndpoint);
        }

        let (scheme, rest) = endpoint
            .split_once("://")
            .ok_or_else(|| ConfigError::MissingScheme(endpoint.to_string()))?;

        let scheme = scheme.to_ascii_lowercase();
        if !SUPPORTED_SCHEMES.contains(&scheme.as_str()) {
            return Err(ConfigError::UnsupportedScheme(scheme));
        }

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(ConfigError::MissingHost(endpoint.to_string()));
        }

        Ok(())
    }
}
