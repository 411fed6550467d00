//! # revdiff Protocol
//!
//! Identifier types and JSON wire messages for revision-diff replication
//! checks.
//!
//! This crate provides:
//! - `DocumentId` and `RevisionId` value types
//! - `_revs_diff` request/response messages
//! - `_all_docs` listing pages
//! - JSON encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod ids;
mod messages;

pub use error::{ProtocolError, ProtocolResult};
pub use ids::{DocumentId, RevisionId};
pub use messages::{
    AllDocsPage, AllDocsRow, AllDocsValue, RevsDiffEntry, RevsDiffRequest, RevsDiffResponse,
};
