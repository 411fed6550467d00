//! Error types for protocol encoding and validation.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while encoding, decoding or validating messages.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Body was not valid JSON or did not have the expected shape.
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    /// Revision id did not have the `<generation>-<hash>` form.
    #[error("invalid revision id {value:?}: {reason}")]
    InvalidRevision {
        /// The rejected value.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Document id was empty.
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),
}

impl ProtocolError {
    pub(crate) fn invalid_revision(value: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidRevision {
            value: value.into(),
            reason,
        }
    }
}
