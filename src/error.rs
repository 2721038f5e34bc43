//! Error types for channel-dl
//!
//! This module provides the error taxonomy of the acquisition pipeline:
//! - [`Error`] - the crate-wide error, one variant per failure class
//! - [`ClientError`] - what a [`ChannelClient`](crate::client::ChannelClient)
//!   implementation reports, translated into [`Error`] at the crate boundary
//! - Machine-readable error codes used in per-channel summaries

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for channel-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for channel-dl
///
/// Per-file and per-channel variants are isolated by the downloader and end up
/// in a [`ChannelSummary`](crate::types::ChannelSummary); only
/// [`Error::ConnectionBudgetExhausted`] ends a whole run with an error. An
/// interrupted run still returns `Ok`, with the unfinished files counted as
/// cancelled.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.batch_size")
        key: Option<String>,
    },

    /// Channel identifier could not be mapped to a channel
    #[error("cannot resolve channel {identifier}: {reason}")]
    Resolution {
        /// The identifier that was requested (numeric id or handle)
        identifier: String,
        /// Why resolution failed
        reason: String,
    },

    /// Listing the messages of a channel failed
    #[error("cannot list messages of {channel}: {reason}")]
    Enumeration {
        /// Channel title or identifier
        channel: String,
        /// Why the listing failed
        reason: String,
    },

    /// A single file transfer failed
    #[error("transfer of {file} failed: {reason}")]
    Transfer {
        /// Destination path of the failed transfer
        file: PathBuf,
        /// Why the transfer failed
        reason: String,
    },

    /// Transport-level failure talking to the remote service
    #[error("connection error: {0}")]
    Connection(String),

    /// Too many transport failures during one run
    #[error("connection error budget exhausted: {errors} errors (budget {budget})")]
    ConnectionBudgetExhausted {
        /// Number of connection errors observed
        errors: usize,
        /// Configured maximum
        budget: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Client failure outside the transport class, converted from [`ClientError`]
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Build a configuration error for a specific key
    pub fn config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Machine-readable error code, stable across releases
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::Resolution { .. } => "resolution_error",
            Error::Enumeration { .. } => "enumeration_error",
            Error::Transfer { .. } => "transfer_error",
            Error::Connection(_) => "connection_error",
            Error::ConnectionBudgetExhausted { .. } => "connection_budget_exhausted",
            Error::Io(_) => "io_error",
            Error::Serialization(_) => "serialization_error",
            Error::Other(_) => "internal_error",
        }
    }

    /// Whether this error was caused by the transport rather than the request
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Error::Connection(_))
    }
}

/// Errors reported by a [`ChannelClient`](crate::client::ChannelClient)
///
/// Client implementations map their native errors onto these four classes;
/// the downloader only cares which class a failure belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// The requested entity or message does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Transport failure (disconnect, timeout, reset)
    #[error("connection failed: {0}")]
    Connection(String),

    /// The media transfer itself failed
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Anything else the service reported
    #[error("{0}")]
    Other(String),
}

impl ClientError {
    /// Whether this is a transport-level failure
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, ClientError::Connection(_))
    }
}

impl From<ClientError> for Error {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Connection(msg) => Error::Connection(msg),
            other => Error::Other(other.to_string()),
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_are_snake_case_and_distinct() {
        let errors = [
            Error::config("download.batch_size", "must be positive"),
            Error::Resolution {
                identifier: "x".into(),
                reason: "not found".into(),
            },
            Error::Enumeration {
                channel: "x".into(),
                reason: "boom".into(),
            },
            Error::Transfer {
                file: PathBuf::from("a.zip"),
                reason: "reset".into(),
            },
            Error::Connection("reset".into()),
            Error::ConnectionBudgetExhausted {
                errors: 5,
                budget: 5,
            },
            Error::Io(std::io::Error::other("disk")),
            Error::Other("?".into()),
        ];

        let codes: Vec<&str> = errors.iter().map(Error::error_code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len(), "codes must be distinct");
        for code in codes {
            assert!(
                code.chars().all(|c| c.is_ascii_lowercase() || c == '_'),
                "code {code} should be snake_case"
            );
        }
    }

    #[test]
    fn client_connection_error_maps_to_connection_variant() {
        let err: Error = ClientError::Connection("timed out".into()).into();
        assert!(err.is_connection());
        assert_eq!(err.error_code(), "connection_error");
        assert!(err.to_string().contains("timed out"));
    }

    #[test]
    fn client_not_found_is_not_a_connection_error() {
        let err: Error = ClientError::NotFound("@nobody".into()).into();
        assert!(!err.is_connection());
        assert_eq!(err.error_code(), "internal_error");
        assert!(!ClientError::Transfer("x".into()).is_connection());
    }

    #[test]
    fn config_error_keeps_key() {
        match Error::config("layout.date_format", "must not be empty") {
            Error::Config { key, message } => {
                assert_eq!(key.as_deref(), Some("layout.date_format"));
                assert_eq!(message, "must not be empty");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
