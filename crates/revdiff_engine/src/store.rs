//! Store abstraction for comparison runs.

use crate::error::{CompareError, CompareResult};
use async_trait::async_trait;
use reqwest::Url;
use revdiff_protocol::{DocumentId, RevsDiffRequest, RevsDiffResponse};
use std::fmt;

/// A document store that can be compared against a replica.
///
/// This trait abstracts the network layer, allowing for different
/// implementations (HTTP, in-memory for testing, etc.).
#[async_trait]
pub trait RevisionStore: Send + Sync {
    /// Lists the ids of every document in the store.
    async fn list_all_document_ids(&self) -> CompareResult<Vec<DocumentId>>;

    /// Submits a `_revs_diff` request to the store.
    async fn revs_diff(&self, request: &RevsDiffRequest) -> CompareResult<RevsDiffResponse>;

    /// Short human-readable name for logs and reports.
    fn describe(&self) -> String;
}

/// Address of one store: server base URL plus database name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRef {
    base_url: Url,
    database: String,
}

impl StoreRef {
    /// Creates a store reference.
    ///
    /// The URL must be absolute with an `http` or `https` scheme and the
    /// database name must not be empty.
    pub fn new(base_url: &str, database: impl Into<String>) -> CompareResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| {
            CompareError::InvalidArgument(format!("invalid store url {:?}: {}", base_url, e))
        })?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(CompareError::InvalidArgument(format!(
                "unsupported url scheme {:?}",
                base_url.scheme()
            )));
        }

        let database = database.into();
        if database.is_empty() {
            return Err(CompareError::InvalidArgument(
                "database name must not be empty".into(),
            ));
        }

        Ok(Self { base_url, database })
    }

    /// Returns the server base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Builds `<base>/<database>/<endpoint>`, percent-encoding the
    /// database name as a single path segment.
    pub fn endpoint(&self, endpoint: &str) -> Url {
        let mut url = self.base_url.clone();
        // http(s) urls always have a path, checked in `new`.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(&self.database).push(endpoint);
        }
        url
    }
}

impl fmt::Display for StoreRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            self.database
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls() {
        let store = StoreRef::new("https://couch.example.com", "orders").unwrap();
        assert_eq!(
            store.endpoint("_revs_diff").as_str(),
            "https://couch.example.com/orders/_revs_diff"
        );

        let store = StoreRef::new("http://localhost:5984/prefix/", "orders").unwrap();
        assert_eq!(
            store.endpoint("_all_docs").as_str(),
            "http://localhost:5984/prefix/orders/_all_docs"
        );
    }

    #[test]
    fn database_name_is_one_segment() {
        let store = StoreRef::new("http://localhost:5984", "team/orders").unwrap();
        assert_eq!(
            store.endpoint("_revs_diff").as_str(),
            "http://localhost:5984/team%2Forders/_revs_diff"
        );
    }

    #[test]
    fn rejects_malformed_refs() {
        assert!(matches!(
            StoreRef::new("not a url", "db"),
            Err(CompareError::InvalidArgument(_))
        ));
        assert!(matches!(
            StoreRef::new("ftp://host", "db"),
            Err(CompareError::InvalidArgument(_))
        ));
        assert!(matches!(
            StoreRef::new("http://host", ""),
            Err(CompareError::InvalidArgument(_))
        ));
    }

    #[test]
    fn display() {
        let store = StoreRef::new("http://localhost:5984/", "orders").unwrap();
        assert_eq!(store.to_string(), "http://localhost:5984/orders");
    }
}
