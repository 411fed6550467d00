//! HTTP store implementation.
//!
//! This module provides an HTTP-backed [`RevisionStore`]. The actual HTTP
//! client is abstracted via a trait so the wire path can be exercised
//! in-process (see [`LoopbackClient`]) as well as against a real server
//! (see [`ReqwestClient`]).

use crate::error::{CompareError, CompareResult};
use crate::store::{RevisionStore, StoreRef};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Url;
use revdiff_protocol::{AllDocsPage, DocumentId, ProtocolError, RevsDiffRequest, RevsDiffResponse};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. Bodies are
/// raw JSON bytes in both directions.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Sends a POST request with a JSON body and returns the response body.
    async fn post_json(&self, url: &Url, body: Vec<u8>) -> CompareResult<Vec<u8>>;

    /// Sends a GET request and returns the response body.
    async fn get_json(&self, url: &Url) -> CompareResult<Vec<u8>>;
}

/// HTTP-backed revision store.
pub struct HttpStore<C: HttpClient> {
    store: StoreRef,
    client: C,
    page_size: usize,
}

impl<C: HttpClient> HttpStore<C> {
    /// Creates a new HTTP store.
    pub fn new(store: StoreRef, client: C) -> Self {
        Self {
            store,
            client,
            page_size: 10_000,
        }
    }

    /// Sets the `_all_docs` page size.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn all_docs_url(&self, start_after: Option<&DocumentId>) -> CompareResult<Url> {
        let mut url = self.store.endpoint("_all_docs");
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("limit", &self.page_size.to_string());
            if let Some(last) = start_after {
                let startkey = serde_json::to_string(last.as_str()).map_err(ProtocolError::from)?;
                query.append_pair("startkey", &startkey);
                query.append_pair("skip", "1");
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl<C: HttpClient> RevisionStore for HttpStore<C> {
    async fn list_all_document_ids(&self) -> CompareResult<Vec<DocumentId>> {
        let mut ids = Vec::new();
        let mut start_after: Option<DocumentId> = None;

        loop {
            let url = self.all_docs_url(start_after.as_ref())?;
            let body = self.client.get_json(&url).await?;
            let page = AllDocsPage::from_json(&body)?;
            let page_ids = page.document_ids()?;

            let fetched = page_ids.len();
            start_after = page_ids.last().cloned();
            ids.extend(page_ids);
            debug!(store = %self.store, fetched, total = ids.len(), "Fetched _all_docs page");

            if fetched < self.page_size {
                break;
            }
        }

        Ok(ids)
    }

    async fn revs_diff(&self, request: &RevsDiffRequest) -> CompareResult<RevsDiffResponse> {
        let body = request.to_json()?;
        trace!(
            store = %self.store,
            request = %String::from_utf8_lossy(&body),
            "Posting _revs_diff"
        );

        let url = self.store.endpoint("_revs_diff");
        let response = self.client.post_json(&url, body).await?;
        Ok(RevsDiffResponse::from_json(&response)?)
    }

    fn describe(&self) -> String {
        self.store.to_string()
    }
}

/// [`HttpClient`] backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Builds a client with the given per-request timeout.
    pub fn new(request_timeout: Duration) -> CompareResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| CompareError::connection(format!("failed to build http client: {}", e)))?;
        Ok(Self { client })
    }

    async fn read_body(response: reqwest::Response) -> CompareResult<Vec<u8>> {
        let status = response.status();
        if !status.is_success() {
            let reason = response
                .text()
                .await
                .unwrap_or_else(|e| format!("unreadable error body: {}", e));
            return Err(CompareError::http_status(status.as_u16(), reason));
        }

        response
            .bytes()
            .await
            .map(|bytes| bytes.to_vec())
            .map_err(|e| CompareError::connection(e.to_string()))
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn post_json(&self, url: &Url, body: Vec<u8>) -> CompareResult<Vec<u8>> {
        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| CompareError::connection(e.to_string()))?;
        Self::read_body(response).await
    }

    async fn get_json(&self, url: &Url) -> CompareResult<Vec<u8>> {
        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| CompareError::connection(e.to_string()))?;
        Self::read_body(response).await
    }
}

/// Trait for servers that can handle loopback requests.
pub trait LoopbackServer: Send + Sync {
    /// Handles a POST request and returns the response body.
    fn handle_post(&self, path: &str, body: &[u8]) -> CompareResult<Vec<u8>>;

    /// Handles a GET request with decoded query parameters.
    fn handle_get(&self, path: &str, query: &[(String, String)]) -> CompareResult<Vec<u8>>;
}

/// A loopback HTTP client that routes requests directly to a server object.
///
/// Useful for testing the full JSON wire path without network overhead.
pub struct LoopbackClient<S: LoopbackServer> {
    server: Arc<S>,
}

impl<S: LoopbackServer> LoopbackClient<S> {
    /// Creates a new loopback client connected to the given server.
    pub fn new(server: Arc<S>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl<S: LoopbackServer> HttpClient for LoopbackClient<S> {
    async fn post_json(&self, url: &Url, body: Vec<u8>) -> CompareResult<Vec<u8>> {
        self.server.handle_post(url.path(), &body)
    }

    async fn get_json(&self, url: &Url) -> CompareResult<Vec<u8>> {
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        self.server.handle_get(url.path(), &query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use revdiff_protocol::{RevisionId, RevsDiffEntry};

    /// Records requests and replays canned bodies.
    struct TestClient {
        responses: Mutex<Vec<CompareResult<Vec<u8>>>>,
        requests: Mutex<Vec<(String, Option<Vec<u8>>)>>,
    }

    impl TestClient {
        fn new(responses: Vec<CompareResult<Vec<u8>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn next(&self) -> CompareResult<Vec<u8>> {
            self.responses
                .lock()
                .pop()
                .unwrap_or_else(|| Err(CompareError::connection("no response set")))
        }
    }

    #[async_trait]
    impl HttpClient for TestClient {
        async fn post_json(&self, url: &Url, body: Vec<u8>) -> CompareResult<Vec<u8>> {
            self.requests.lock().push((url.to_string(), Some(body)));
            self.next()
        }

        async fn get_json(&self, url: &Url) -> CompareResult<Vec<u8>> {
            self.requests.lock().push((url.to_string(), None));
            self.next()
        }
    }

    fn store_ref() -> StoreRef {
        StoreRef::new("http://couch.local:5984", "orders").unwrap()
    }

    #[tokio::test]
    async fn revs_diff_posts_json_to_endpoint() {
        let client = TestClient::new(vec![Ok(
            br#"{"d1":{"missing":["9999-a"],"possible_ancestors":["1-abc"]}}"#.to_vec(),
        )]);
        let store = HttpStore::new(store_ref(), client);

        let mut request = RevsDiffRequest::new();
        request.insert("d1".into(), vec![RevisionId::from_wire("9999-a")]);
        let response = store.revs_diff(&request).await.unwrap();

        assert_eq!(
            response.get("d1"),
            Some(&RevsDiffEntry {
                missing: vec![RevisionId::from_wire("9999-a")],
                possible_ancestors: vec![RevisionId::from_wire("1-abc")],
            })
        );

        let requests = store.client.requests.lock();
        assert_eq!(requests[0].0, "http://couch.local:5984/orders/_revs_diff");
        assert_eq!(requests[0].1.as_deref(), Some(&br#"{"d1":["9999-a"]}"#[..]));
    }

    #[tokio::test]
    async fn revs_diff_malformed_body_is_protocol_error() {
        let client = TestClient::new(vec![Ok(b"<html>oops</html>".to_vec())]);
        let store = HttpStore::new(store_ref(), client);

        let err = store.revs_diff(&RevsDiffRequest::new()).await.unwrap_err();
        assert!(matches!(err, CompareError::Protocol(_)));
    }

    #[tokio::test]
    async fn revs_diff_transport_error_passes_through() {
        let client = TestClient::new(vec![Err(CompareError::http_status(500, "boom"))]);
        let store = HttpStore::new(store_ref(), client);

        let err = store.revs_diff(&RevsDiffRequest::new()).await.unwrap_err();
        assert!(matches!(err, CompareError::Connection { status: Some(500), .. }));
    }

    #[tokio::test]
    async fn all_docs_paginates_with_startkey() {
        let client = TestClient::new(vec![
            Ok(br#"{"total_rows":3,"offset":0,"rows":[{"id":"a"},{"id":"b"}]}"#.to_vec()),
            Ok(br#"{"total_rows":3,"offset":2,"rows":[{"id":"c"}]}"#.to_vec()),
        ]);
        let store = HttpStore::new(store_ref(), client).with_page_size(2);

        let ids = store.list_all_document_ids().await.unwrap();
        assert_eq!(ids, vec!["a".into(), "b".into(), DocumentId::from("c")]);

        let requests = store.client.requests.lock();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].0,
            "http://couch.local:5984/orders/_all_docs?limit=2"
        );
        assert_eq!(
            requests[1].0,
            "http://couch.local:5984/orders/_all_docs?limit=2&startkey=%22b%22&skip=1"
        );
    }

    #[tokio::test]
    async fn all_docs_full_last_page_needs_one_more_request() {
        let client = TestClient::new(vec![
            Ok(br#"{"rows":[{"id":"a"},{"id":"b"}]}"#.to_vec()),
            Ok(br#"{"rows":[]}"#.to_vec()),
        ]);
        let store = HttpStore::new(store_ref(), client).with_page_size(2);

        let ids = store.list_all_document_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(store.client.requests.lock().len(), 2);
    }

    #[test]
    fn describe_names_the_store() {
        let store = HttpStore::new(store_ref(), TestClient::new(Vec::new()));
        assert_eq!(store.describe(), "http://couch.local:5984/orders");
    }
}
