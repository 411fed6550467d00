//! Integration tests for the comparator over the JSON wire path.

use revdiff_engine::{
    CompareConfig, CompareError, Comparator, Direction, HttpStore, LoopbackClient, MemoryStore,
    RevisionStore, StoreRef,
};
use revdiff_protocol::{DocumentId, RevisionId};
use std::sync::Arc;
use std::time::Duration;

fn doc(i: usize) -> String {
    format!("doc-{:03}", i)
}

fn rev(s: &str) -> RevisionId {
    RevisionId::from_wire(s)
}

/// Wraps a memory store in an HTTP store that talks to it in-process.
fn over_http(server: &Arc<MemoryStore>, name: &str, page_size: usize) -> Arc<dyn RevisionStore> {
    let store_ref = StoreRef::new(&format!("http://{}.test:5984", name), "replica").unwrap();
    Arc::new(
        HttpStore::new(store_ref, LoopbackClient::new(Arc::clone(server)))
            .with_page_size(page_size),
    )
}

/// 100 shared documents, a few exclusive ones and two divergent ones.
fn populated_pair() -> (Arc<MemoryStore>, Arc<MemoryStore>) {
    let a = Arc::new(MemoryStore::new("a"));
    let b = Arc::new(MemoryStore::new("b"));

    for i in 0..100 {
        a.put(&doc(i), "1-base", None);
        b.put(&doc(i), "1-base", None);
    }
    for i in 100..103 {
        a.put(&doc(i), "1-only", None);
    }
    b.put("zzz-only-b", "1-only", None);

    // A moved ahead on doc-010.
    a.put(&doc(10), "2-a10", Some("1-base"));
    // B carries a conflicting root on doc-020.
    b.put(&doc(20), "1-other", None);

    (a, b)
}

fn config() -> CompareConfig {
    CompareConfig::new()
        .with_batch_size(10)
        .with_concurrency(3)
        .with_timeout(Duration::from_secs(30))
}

#[tokio::test]
async fn compares_over_json_wire_path() {
    let (a, b) = populated_pair();
    let comparator = Comparator::new(over_http(&a, "a", 7), over_http(&b, "b", 7), config());

    let report = comparator.compare().await.unwrap();

    let only_in_a: Vec<&str> = report.only_in_a.iter().map(DocumentId::as_str).collect();
    assert_eq!(only_in_a, vec!["doc-100", "doc-101", "doc-102"]);
    assert!(report.only_in_b.contains("zzz-only-b"));
    assert_eq!(report.only_in_b.len(), 1);

    assert_eq!(report.missing_in_b.len(), 1);
    assert_eq!(report.missing_in_b.get("doc-010"), Some(&vec![rev("2-a10")]));
    assert_eq!(report.missing_in_a.len(), 1);
    assert_eq!(report.missing_in_a.get("doc-020"), Some(&vec![rev("1-other")]));

    assert!(report.is_complete());
    assert!(!report.is_consistent());

    // Ten batches, one probe and one diff request per batch per direction.
    assert_eq!(a.revs_diff_calls(), 20);
    assert_eq!(b.revs_diff_calls(), 20);
}

#[tokio::test]
async fn repeated_comparison_is_identical() {
    let (a, b) = populated_pair();
    let comparator = Comparator::new(over_http(&a, "a", 13), over_http(&b, "b", 13), config());

    let first = comparator.compare().await.unwrap();
    let second = comparator.compare().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn failed_batch_is_reported_per_direction() {
    let (a, b) = populated_pair();
    b.fail_revs_diff_for(&doc(55));
    let comparator = Comparator::new(over_http(&a, "a", 50), over_http(&b, "b", 50), config());

    let report = comparator.compare().await.unwrap();

    assert_eq!(report.failures.len(), 2);
    let directions: Vec<Direction> = report.failures.iter().map(|f| f.direction).collect();
    assert!(directions.contains(&Direction::AToB));
    assert!(directions.contains(&Direction::BToA));
    for failure in &report.failures {
        assert_eq!(failure.failure.index, 5);
        assert_eq!(failure.failure.documents.len(), 10);
        assert!(failure.failure.documents.contains(&DocumentId::new(doc(55))));
        assert!(matches!(
            failure.failure.error,
            CompareError::Connection {
                status: Some(503),
                ..
            }
        ));
    }

    // Other batches are unaffected.
    assert_eq!(report.missing_in_b.get("doc-010"), Some(&vec![rev("2-a10")]));
    assert_eq!(report.missing_in_a.get("doc-020"), Some(&vec![rev("1-other")]));
    assert!(!report.is_complete());
}

#[tokio::test]
async fn timeout_reports_every_outstanding_batch() {
    let (a, b) = populated_pair();
    b.set_latency(Duration::from_secs(30));
    let comparator = Comparator::new(
        a.clone(),
        b.clone(),
        config().with_timeout(Duration::from_millis(100)),
    );

    let report = comparator.compare().await.unwrap();

    assert_eq!(report.only_in_a.len(), 3);
    assert_eq!(report.failures.len(), 20);
    assert!(report
        .failures
        .iter()
        .all(|f| f.failure.error == CompareError::Timeout));
    assert!(report.missing_in_a.is_empty());
    assert!(report.missing_in_b.is_empty());
}

#[tokio::test]
async fn report_serializes_to_json() {
    let (a, b) = populated_pair();
    let comparator = Comparator::new(over_http(&a, "a", 100), over_http(&b, "b", 100), config());
    let report = comparator.compare().await.unwrap();

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["only_in_b"], serde_json::json!(["zzz-only-b"]));
    assert_eq!(json["missing_in_b"]["doc-010"], serde_json::json!(["2-a10"]));
    assert_eq!(json["failures"], serde_json::json!([]));
}

#[test]
fn from_refs_rejects_invalid_config() {
    let a = StoreRef::new("http://localhost:5984", "a").unwrap();
    let b = StoreRef::new("http://localhost:5984", "b").unwrap();

    let result = Comparator::from_refs(a.clone(), b.clone(), CompareConfig::new().with_concurrency(0));
    assert!(matches!(result, Err(CompareError::InvalidArgument(_))));

    let result = Comparator::from_refs(a, b, CompareConfig::new().with_sentinel("not-a-rev"));
    assert!(matches!(result, Err(CompareError::InvalidArgument(_))));
}

#[test]
fn store_ref_rejects_non_http_urls() {
    assert!(matches!(
        StoreRef::new("ftp://localhost", "db"),
        Err(CompareError::InvalidArgument(_))
    ));
    assert!(matches!(
        StoreRef::new("http://localhost:5984", ""),
        Err(CompareError::InvalidArgument(_))
    ));
}
