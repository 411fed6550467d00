//! Configuration for comparison runs.

use crate::error::{CompareError, CompareResult};
use revdiff_protocol::RevisionId;
use std::time::Duration;

/// Revision id used to discover a document's leaf revisions.
///
/// The generation is implausibly high, so no real revision tree holds it.
/// A `_revs_diff` request for it is always answered with the sentinel under
/// `missing` and the document's actual leaves under `possible_ancestors`,
/// which gives the full leaf set (conflicts included) without fetching the
/// document.
pub const DEFAULT_SENTINEL_REVISION: &str = "9999-a";

/// Default number of documents per `_revs_diff` request.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Default number of batches in flight per direction.
pub const DEFAULT_CONCURRENCY: usize = 16;

/// Default overall timeout for one direction of a run.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10 * 60 * 60);

/// Configuration for a comparison run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompareConfig {
    /// Maximum number of documents per diff batch.
    pub batch_size: usize,
    /// Maximum number of batches in flight at once.
    pub concurrency: usize,
    /// Overall timeout for each direction of the run.
    pub timeout: Duration,
    /// Sentinel revision for leaf discovery.
    pub sentinel: String,
    /// Timeout for a single HTTP request.
    pub request_timeout: Duration,
    /// Page size for `_all_docs` listings.
    pub page_size: usize,
}

impl CompareConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            timeout: DEFAULT_TIMEOUT,
            sentinel: DEFAULT_SENTINEL_REVISION.to_string(),
            request_timeout: Duration::from_secs(300),
            page_size: 10_000,
        }
    }

    /// Sets the batch size.
    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Sets the number of concurrent batches.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    /// Sets the overall run timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the sentinel revision.
    pub fn with_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.sentinel = sentinel.into();
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the `_all_docs` page size.
    pub fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = size;
        self
    }

    /// Checks the configuration, returning the parsed sentinel.
    pub fn validate(&self) -> CompareResult<RevisionId> {
        if self.batch_size == 0 {
            return Err(CompareError::InvalidArgument(
                "batch size must be positive".into(),
            ));
        }
        if self.concurrency == 0 {
            return Err(CompareError::InvalidArgument(
                "concurrency must be positive".into(),
            ));
        }
        if self.page_size == 0 {
            return Err(CompareError::InvalidArgument(
                "page size must be positive".into(),
            ));
        }
        RevisionId::parse(self.sentinel.as_str())
            .map_err(|e| CompareError::InvalidArgument(format!("sentinel: {}", e)))
    }
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self::new()
    }
}
