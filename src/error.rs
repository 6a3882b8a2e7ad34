//! Error types for talkwire.
//!
//! The markup parser has no error type on purpose: every malformed or
//! unterminated construct degrades to a best-effort block. Errors here
//! cover configuration, the channel transport, and the wire protocol.

/// Top-level error type for the crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Channel transport errors.
///
/// These never surface to callers mid-flow; they are captured as
/// connection state and drive the retry policy.
#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("Failed to open connection to {endpoint}: {reason}")]
    ConnectFailed { endpoint: String, reason: String },

    #[error("Failed to send frame: {reason}")]
    SendFailed { reason: String },

    #[error("Connection closed with code {code}")]
    Closed { code: u16 },

    #[error("Channel is not connected")]
    NotConnected,

    #[error("Invalid endpoint URL: {0}")]
    InvalidEndpoint(#[from] url::ParseError),
}

/// Wire protocol errors. Logged and discarded per frame, never propagated.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("Unrecognized message type: {0}")]
    UnknownKind(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_error_display() {
        let err = ChannelError::Closed { code: 1006 };
        assert_eq!(err.to_string(), "Connection closed with code 1006");
    }

    #[test]
    fn test_protocol_error_from_serde() {
        let parse_err = serde_json::from_str::<serde_json::Value>("{nope")
            .expect_err("should fail");
        let err: ProtocolError = parse_err.into();
        assert!(err.to_string().starts_with("Malformed frame"));
    }

    #[test]
    fn test_top_level_wrapping() {
        let err: Error = ConfigError::InvalidValue {
            key: "retry_interval_ms".to_string(),
            message: "must be positive".to_string(),
        }
        .into();
        assert!(err.to_string().contains("retry_interval_ms"));
    }
}
