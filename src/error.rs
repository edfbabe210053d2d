//! Custom error types for the instrument drivers.
//!
//! This module defines the primary error type, `InstrumentError`, shared by every layer of the
//! crate. Using the `thiserror` crate, it gives one consistent taxonomy for failures that can
//! occur between a caller and a physical instrument.
//!
//! ## Error Hierarchy
//!
//! - **`Connection`**: The endpoint could not be opened (missing device, wrong address,
//!   permission denied, or the endpoint already has an open session).
//! - **`Timeout`**: A read, or the operation-complete handshake that follows every write,
//!   did not finish before the session timeout. Never retried automatically.
//! - **`Configuration`**: A composite setup operation received a mutually exclusive or
//!   incomplete parameter combination. Raised before anything is written.
//! - **`InvalidChoice`**: A label outside a closed set, or a label the selected driver has no
//!   token for. Raised before anything is written.
//! - **`ClosedResource`**: Any operation on a session after `close()`, including a second close.
//! - **`Parse`**: The instrument replied with text that does not parse as the expected type.
//! - **`Io`** / **`Config`**: Wrapped lower-level failures.
//! - **`FeatureNotEnabled`**: A transport backend that was not compiled in.
//!
//! Nothing in the crate suppresses these; all of them surface to the immediate caller.

use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, InstrumentError>;

/// Every failure a session, driver or transport can report.
#[derive(Error, Debug)]
pub enum InstrumentError {
    /// The endpoint could not be opened.
    #[error("Cannot open '{endpoint}': {reason}")]
    Connection {
        /// Address that was being opened.
        endpoint: String,
        /// Underlying cause as reported by the transport.
        reason: String,
    },

    /// A read or completion handshake exceeded the session timeout.
    #[error("Timed out after {timeout:?} waiting for {operation} on '{endpoint}'")]
    Timeout {
        /// Address of the session that timed out.
        endpoint: String,
        /// What was being waited for.
        operation: String,
        /// Session timeout in effect.
        timeout: Duration,
    },

    /// Mutually exclusive or incomplete parameters passed to a composite operation.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value outside its enumerated set.
    #[error("'{value}' is not a valid {kind}")]
    InvalidChoice {
        /// Name of the enumerated set, e.g. "multimeter range".
        kind: &'static str,
        /// The rejected label.
        value: String,
    },

    /// Operation attempted after `close()`.
    #[error("Resource '{0}' is closed")]
    ClosedResource(String),

    /// Instrument reply could not be interpreted.
    #[error("Unexpected reply to '{command}': '{reply}'")]
    Parse {
        /// Query that produced the reply.
        command: String,
        /// Raw reply text.
        reply: String,
    },

    /// Transport-level I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or failed validation.
    #[error(transparent)]
    Config(#[from] crate::config::ConfigError),

    #[error("{backend} support not enabled. Rebuild with --features {feature}")]
    FeatureNotEnabled {
        /// Transport backend that was requested.
        backend: &'static str,
        /// Cargo feature that provides it.
        feature: &'static str,
    },

    /// Another thread panicked while holding the session lock.
    #[error("Session lock poisoned for '{0}'")]
    SessionPoisoned(String),
}

impl InstrumentError {
    /// Shorthand for an [`InstrumentError::InvalidChoice`].
    pub fn invalid_choice(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidChoice {
            kind,
            value: value.into(),
        }
    }

    /// Shorthand for an [`InstrumentError::Parse`].
    pub fn parse(command: impl Into<String>, reply: impl Into<String>) -> Self {
        Self::Parse {
            command: command.into(),
            reply: reply.into(),
        }
    }

    /// True for errors raised before any byte reached the wire.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::InvalidChoice { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_display_names_endpoint_and_operation() {
        let err = InstrumentError::Timeout {
            endpoint: "ASRL11::INSTR".to_string(),
            operation: "read".to_string(),
            timeout: Duration::from_millis(50),
        };
        let msg = err.to_string();
        assert!(msg.contains("ASRL11::INSTR"));
        assert!(msg.contains("read"));
        assert!(msg.contains("50ms"));
    }

    #[test]
    fn invalid_choice_display() {
        let err = InstrumentError::invalid_choice("multimeter range", "42V");
        assert_eq!(err.to_string(), "'42V' is not a valid multimeter range");
        assert!(err.is_validation());
    }

    #[test]
    fn feature_not_enabled_mentions_flag() {
        let err = InstrumentError::FeatureNotEnabled {
            backend: "VISA",
            feature: "instrument_visa",
        };
        assert!(err.to_string().contains("--features instrument_visa"));
        assert!(!err.is_validation());
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe");
        let err: InstrumentError = io.into();
        assert!(matches!(err, InstrumentError::Io(_)));
    }
}
