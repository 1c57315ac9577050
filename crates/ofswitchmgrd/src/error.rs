//! Error types for the switch manager.
//!
//! All errors implement `std::error::Error` via `thiserror`.

use std::io;

use ofagent_types::{DeviceId, NetworkId, ParseError};
use thiserror::Error;

/// Result type alias for switch manager operations.
pub type SwitchMgrResult<T> = Result<T, SwitchMgrError>;

/// Errors that can occur in the switch manager.
#[derive(Debug, Error)]
pub enum SwitchMgrError {
    /// A device identifier does not encode a datapath id.
    #[error("Invalid device identifier '{device}': {reason}")]
    InvalidIdentifier {
        /// The offending device identifier.
        device: DeviceId,
        /// Why it was rejected.
        reason: String,
    },

    /// An agent operation was rejected by the agent store.
    #[error("Agent for network {network}: {message}")]
    Agent {
        /// The agent's virtual network.
        network: NetworkId,
        /// Error message.
        message: String,
    },

    /// Configuration file could not be read or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The manager was used before `start()`.
    #[error("Switch manager is not started")]
    NotStarted,

    /// `start()` was called twice.
    #[error("Switch manager is already started")]
    AlreadyStarted,

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Internal error (unexpected state).
    #[error("Internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl SwitchMgrError {
    /// Creates an invalid identifier error.
    pub fn invalid_identifier(device: DeviceId, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            device,
            reason: reason.into(),
        }
    }

    /// Creates an agent error.
    pub fn agent(network: NetworkId, message: impl Into<String>) -> Self {
        Self::Agent {
            network,
            message: message.into(),
        }
    }

    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on retry.
    ///
    /// Malformed identifiers and configuration are never retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SwitchMgrError::Io(_))
    }

    pub(crate) fn from_parse(device: &DeviceId, err: ParseError) -> Self {
        match err {
            ParseError::InvalidIdentifier { reason, .. } => {
                Self::invalid_identifier(device.clone(), reason)
            }
            other => Self::invalid_identifier(device.clone(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SwitchMgrError::invalid_identifier(DeviceId::new("of:01"), "too short");
        assert_eq!(err.to_string(), "Invalid device identifier 'of:01': too short");
    }

    #[test]
    fn test_config_error() {
        let err = SwitchMgrError::config("connect_timeout_ms must be non-zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: connect_timeout_ms must be non-zero"
        );
    }

    #[test]
    fn test_from_parse_keeps_reason() {
        let device = DeviceId::new("of:xyz");
        let parse = ParseError::InvalidIdentifier {
            id: "of:xyz".to_string(),
            reason: "expected 16 hex characters, found 3".to_string(),
        };
        match SwitchMgrError::from_parse(&device, parse) {
            SwitchMgrError::InvalidIdentifier { device: d, reason } => {
                assert_eq!(d, device);
                assert!(reason.contains("found 3"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_agent_error() {
        let err = SwitchMgrError::agent(NetworkId::new(3), "no such agent");
        assert_eq!(err.to_string(), "Agent for network 3: no such agent");
    }

    #[test]
    fn test_is_retryable() {
        let io = SwitchMgrError::from(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
        assert!(io.is_retryable());
        assert!(!SwitchMgrError::invalid_identifier(DeviceId::new("x"), "bad").is_retryable());
        assert!(!SwitchMgrError::internal("bug").is_retryable());
    }
}
