//! Custom error types for the HAL.
//!
//! This module defines the primary error type, `HalError`, for the entire
//! crate. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the failure modes of fragile vendor firmware:
//! unreachable hosts, dead sessions, scraped responses that no longer match
//! the expected shape, and caller mistakes.
//!
//! ## Error Hierarchy
//!
//! - **`Connection`**: the host was unreachable or the credential handshake
//!   did not complete. Connect failures are reported, never retried by this
//!   layer; retry policy belongs to the caller.
//! - **`SessionLost`**: a liveness check failed and the single permitted
//!   reconnect attempt did not restore the session. Fatal to the in-flight
//!   operation.
//! - **`Parse`**: a parse anchor was missing from a device response, or the
//!   text between the anchors was not a value. A missing anchor means the
//!   firmware returned an unexpected or error response, so this is always
//!   surfaced, never swallowed into a default reading.
//! - **`UnrecognizedMode`**: a mode code or mode label outside the closed
//!   set of operating modes.
//! - **`InvalidParameter`** / **`UnsupportedOperation`** /
//!   **`ConflictingTargets`**: caller and data errors, always reported.
//! - **`Timeout`**: a bounded wait for an anchor, prompt, or terminal marker
//!   was exceeded. The session is left usable; the caller decides whether to
//!   force a reconnect.
//!
//! By using `#[from]`, `HalError` can be seamlessly created from underlying
//! I/O and configuration errors, simplifying error handling throughout the
//! crate with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, HalError>;

#[derive(Error, Debug)]
pub enum HalError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Session lost: {0}")]
    SessionLost(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unrecognized operating mode {0:?}")]
    UnrecognizedMode(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{device} does not support {operation}")]
    UnsupportedOperation { device: String, operation: String },

    #[error("Conflicting targets: {0}")]
    ConflictingTargets(String),

    #[error("Device reports mode {actual} after requesting {requested}")]
    ModeNotConfirmed { requested: String, actual: String },

    #[error("Timed out waiting for {0}")]
    Timeout(String),

    #[error("Transport not connected")]
    NotConnected,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HalError {
    /// Helper for the common "this vendor has no register for that" case.
    pub fn unsupported(device: impl Into<String>, operation: impl Into<String>) -> Self {
        HalError::UnsupportedOperation {
            device: device.into(),
            operation: operation.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = HalError::Connection("10.10.0.1:2001 unreachable".to_string());
        assert_eq!(err.to_string(), "Connection error: 10.10.0.1:2001 unreachable");
    }

    #[test]
    fn test_unsupported_display() {
        let err = HalError::unsupported("edfa17", "output_enabled");
        assert_eq!(err.to_string(), "edfa17 does not support output_enabled");
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: HalError = io.into();
        assert!(matches!(err, HalError::Io(_)));
    }
}
