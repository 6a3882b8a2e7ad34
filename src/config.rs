//! Channel configuration.
//!
//! The reconnect policy constants live here rather than as literals in the
//! state machine so tests can run with small values.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Configuration for the messaging channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Base endpoint for the channel connection (e.g. "wss://host/ws").
    pub endpoint: String,
    /// Maximum automatic reconnect attempts before giving up.
    pub max_reconnect_attempts: u32,
    /// Delay between automatic reconnect attempts (milliseconds).
    /// Constant backoff, not exponential.
    pub retry_interval_ms: u64,
    /// Delay before a caller-initiated reconnect (milliseconds).
    pub manual_reconnect_delay_ms: u64,
    /// Age after which a typing indicator is considered stale (milliseconds).
    pub typing_ttl_ms: u64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080/ws".to_string(),
            max_reconnect_attempts: 5,
            retry_interval_ms: 5_000,
            manual_reconnect_delay_ms: 1_000,
            typing_ttl_ms: 10_000,
        }
    }
}

impl ChannelConfig {
    /// Create a config for the given endpoint with default retry policy.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Self::default()
        }
    }

    /// Delay between automatic reconnect attempts.
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// Delay before a caller-initiated reconnect.
    pub fn manual_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.manual_reconnect_delay_ms)
    }

    /// Age after which a typing indicator is swept.
    pub fn typing_ttl(&self) -> Duration {
        Duration::from_millis(self.typing_ttl_ms)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.endpoint) {
            Ok(parsed) if parsed.scheme() == "ws" || parsed.scheme() == "wss" => {}
            Ok(parsed) => {
                return Err(ConfigError::InvalidValue {
                    key: "endpoint".to_string(),
                    message: format!("unsupported scheme \"{}\"", parsed.scheme()),
                });
            }
            Err(e) => {
                return Err(ConfigError::InvalidValue {
                    key: "endpoint".to_string(),
                    message: e.to_string(),
                });
            }
        }
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "retry_interval_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        if self.typing_ttl_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "typing_ttl_ms".to_string(),
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }
}
