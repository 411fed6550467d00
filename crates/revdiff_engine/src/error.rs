//! Error types for the comparison engine.

use revdiff_protocol::ProtocolError;
use thiserror::Error;

/// Result type for comparison operations.
pub type CompareResult<T> = Result<T, CompareError>;

/// Errors that can occur while comparing two stores.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompareError {
    /// Store unreachable or returned a transport-level failure.
    #[error("connection error: {message}")]
    Connection {
        /// Error message.
        message: String,
        /// HTTP status, when the store answered with one.
        status: Option<u16>,
    },

    /// Response body was not valid JSON or lacked the expected shape.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Bad configuration or store reference.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Overall run timeout elapsed before the batch finished.
    #[error("operation timed out")]
    Timeout,

    /// Batch task panicked or was cancelled.
    #[error("worker failed: {0}")]
    Worker(String),
}

impl CompareError {
    /// Creates a connection error without an HTTP status.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a connection error for a non-success HTTP status.
    pub fn http_status(status: u16, message: impl Into<String>) -> Self {
        Self::Connection {
            message: format!("HTTP {}: {}", status, message.into()),
            status: Some(status),
        }
    }

    /// Returns true if the error is recovered at the batch boundary
    /// rather than aborting the whole run.
    pub fn is_batch_local(&self) -> bool {
        match self {
            CompareError::Connection { .. }
            | CompareError::Protocol(_)
            | CompareError::Timeout
            | CompareError::Worker(_) => true,
            CompareError::InvalidArgument(_) => false,
        }
    }
}

impl From<ProtocolError> for CompareError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::Json(e) => CompareError::Protocol(e.to_string()),
            other => CompareError::Protocol(other.to_string()),
        }
    }
}
