//! In-memory revision store.
//!
//! Holds one revision tree per document and answers `_revs_diff` the way a
//! replicating document server does. Also serves the JSON endpoints through
//! [`LoopbackServer`], and supports fault injection for tests.

use crate::error::{CompareError, CompareResult};
use crate::http::LoopbackServer;
use crate::store::RevisionStore;
use async_trait::async_trait;
use parking_lot::RwLock;
use revdiff_protocol::{
    AllDocsPage, AllDocsRow, AllDocsValue, DocumentId, RevisionId, RevsDiffEntry,
    RevsDiffRequest, RevsDiffResponse,
};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Revision tree of a single document.
#[derive(Debug, Clone, Default)]
struct RevisionTree {
    /// Every revision the store knows, leaves and ancestors.
    known: BTreeSet<RevisionId>,
    /// Current leaves; more than one means the document is in conflict.
    leaves: BTreeSet<RevisionId>,
    /// Leaves that are deletion tombstones.
    tombstones: BTreeSet<RevisionId>,
}

impl RevisionTree {
    fn add(&mut self, rev: RevisionId, parent: Option<RevisionId>, deleted: bool) {
        if let Some(parent) = parent {
            self.leaves.remove(&parent);
            self.tombstones.remove(&parent);
            self.known.insert(parent);
        }
        if deleted {
            self.tombstones.insert(rev.clone());
        }
        self.known.insert(rev.clone());
        self.leaves.insert(rev);
    }

    fn is_deleted(&self) -> bool {
        self.leaves.iter().all(|leaf| self.tombstones.contains(leaf))
    }

    fn winning_revision(&self) -> Option<&RevisionId> {
        self.leaves
            .iter()
            .filter(|leaf| !self.tombstones.contains(*leaf))
            .max_by(|a, b| {
                (a.generation().unwrap_or(0), a.as_str())
                    .cmp(&(b.generation().unwrap_or(0), b.as_str()))
            })
    }

    fn diff(&self, candidates: &[RevisionId]) -> Option<RevsDiffEntry> {
        let missing: Vec<RevisionId> = candidates
            .iter()
            .filter(|rev| !self.known.contains(*rev))
            .cloned()
            .collect();
        if missing.is_empty() {
            return None;
        }

        let newest_missing = missing.iter().filter_map(RevisionId::generation).max();
        let possible_ancestors = self
            .leaves
            .iter()
            .filter(|leaf| match (leaf.generation(), newest_missing) {
                (Some(leaf_gen), Some(missing_gen)) => leaf_gen < missing_gen,
                _ => false,
            })
            .cloned()
            .collect();

        Some(RevsDiffEntry {
            missing,
            possible_ancestors,
        })
    }
}

#[derive(Debug, Default)]
struct Faults {
    failing_documents: BTreeSet<DocumentId>,
    omitted_documents: BTreeSet<DocumentId>,
    fail_listing: bool,
    latency: Option<Duration>,
}

/// An in-memory document store with revision trees.
#[derive(Debug)]
pub struct MemoryStore {
    name: String,
    documents: RwLock<BTreeMap<DocumentId, RevisionTree>>,
    faults: RwLock<Faults>,
    revs_diff_calls: AtomicUsize,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            documents: RwLock::new(BTreeMap::new()),
            faults: RwLock::new(Faults::default()),
            revs_diff_calls: AtomicUsize::new(0),
        }
    }

    /// Adds a revision to a document's tree.
    ///
    /// With a `parent`, the parent stops being a leaf. Without one, the
    /// revision starts a new branch, which puts the document in conflict if
    /// it already has a leaf.
    pub fn put(&self, id: &str, rev: &str, parent: Option<&str>) {
        self.documents
            .write()
            .entry(DocumentId::from(id))
            .or_default()
            .add(
                RevisionId::from_wire(rev),
                parent.map(RevisionId::from_wire),
                false,
            );
    }

    /// Adds a linear history, oldest first, ending in one leaf.
    pub fn put_history(&self, id: &str, revs: &[&str]) {
        let mut parent = None;
        for rev in revs {
            self.put(id, rev, parent);
            parent = Some(*rev);
        }
    }

    /// Adds a deletion tombstone on top of `parent`.
    pub fn delete(&self, id: &str, rev: &str, parent: &str) {
        self.documents
            .write()
            .entry(DocumentId::from(id))
            .or_default()
            .add(
                RevisionId::from_wire(rev),
                Some(RevisionId::from_wire(parent)),
                true,
            );
    }

    /// Drops a document and its whole revision tree.
    pub fn purge(&self, id: &str) {
        self.documents.write().remove(id);
    }

    /// Returns the current leaves of a document.
    pub fn leaves(&self, id: &str) -> Vec<RevisionId> {
        self.documents
            .read()
            .get(id)
            .map(|tree| tree.leaves.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of live (non-deleted) documents.
    pub fn len(&self) -> usize {
        self.documents
            .read()
            .values()
            .filter(|tree| !tree.is_deleted())
            .count()
    }

    /// Returns true if there are no live documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of `_revs_diff` requests served so far.
    pub fn revs_diff_calls(&self) -> usize {
        self.revs_diff_calls.load(Ordering::SeqCst)
    }

    /// Fails every `_revs_diff` request that names `id`.
    pub fn fail_revs_diff_for(&self, id: &str) {
        self.faults.write().failing_documents.insert(DocumentId::from(id));
    }

    /// Leaves `id` out of every `_revs_diff` response.
    pub fn omit_from_revs_diff(&self, id: &str) {
        self.faults.write().omitted_documents.insert(DocumentId::from(id));
    }

    /// Makes document listing fail.
    pub fn fail_listing(&self) {
        self.faults.write().fail_listing = true;
    }

    /// Delays every `_revs_diff` answered through [`RevisionStore`].
    pub fn set_latency(&self, latency: Duration) {
        self.faults.write().latency = Some(latency);
    }

    /// Removes all injected faults.
    pub fn clear_faults(&self) {
        *self.faults.write() = Faults::default();
    }

    fn live_ids(&self) -> CompareResult<Vec<DocumentId>> {
        if self.faults.read().fail_listing {
            return Err(CompareError::connection(format!(
                "{}: listing unavailable",
                self.name
            )));
        }
        Ok(self
            .documents
            .read()
            .iter()
            .filter(|(_, tree)| !tree.is_deleted())
            .map(|(id, _)| id.clone())
            .collect())
    }

    fn answer_revs_diff(&self, request: &RevsDiffRequest) -> CompareResult<RevsDiffResponse> {
        self.revs_diff_calls.fetch_add(1, Ordering::SeqCst);

        let faults = self.faults.read();
        if let Some((id, _)) = request
            .iter()
            .find(|(id, _)| faults.failing_documents.contains(*id))
        {
            return Err(CompareError::http_status(
                503,
                format!("{}: injected failure for {}", self.name, id),
            ));
        }

        let documents = self.documents.read();
        let mut response = RevsDiffResponse::new();
        for (id, candidates) in request.iter() {
            if faults.omitted_documents.contains(id) {
                continue;
            }
            let entry = match documents.get(id) {
                Some(tree) => tree.diff(candidates),
                None => Some(RevsDiffEntry {
                    missing: candidates.clone(),
                    possible_ancestors: Vec::new(),
                }),
            };
            if let Some(entry) = entry {
                response.insert(id.clone(), entry);
            }
        }
        Ok(response)
    }

    fn all_docs_page(&self, query: &[(String, String)]) -> CompareResult<AllDocsPage> {
        let param = |name: &str| {
            query
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str())
        };
        let parse_count = |name: &str| -> CompareResult<Option<usize>> {
            param(name)
                .map(|value| {
                    value.parse::<usize>().map_err(|_| {
                        CompareError::http_status(400, format!("invalid {}: {}", name, value))
                    })
                })
                .transpose()
        };

        let limit = parse_count("limit")?.unwrap_or(usize::MAX);
        let skip = parse_count("skip")?.unwrap_or(0);
        let startkey: Option<String> = param("startkey")
            .map(|value| {
                serde_json::from_str(value).map_err(|_| {
                    CompareError::http_status(400, format!("invalid startkey: {}", value))
                })
            })
            .transpose()?;

        let ids = self.live_ids()?;
        let total_rows = ids.len() as u64;
        let first = startkey
            .map(|key| ids.partition_point(|id| id.as_str() < key.as_str()))
            .unwrap_or(0);

        let documents = self.documents.read();
        let rows = ids
            .iter()
            .skip(first + skip)
            .take(limit)
            .map(|id| AllDocsRow {
                id: id.clone(),
                key: Some(id.clone()),
                value: documents
                    .get(id)
                    .and_then(RevisionTree::winning_revision)
                    .map(|rev| AllDocsValue { rev: rev.clone() }),
            })
            .collect();

        Ok(AllDocsPage {
            total_rows: Some(total_rows),
            offset: Some((first + skip) as u64),
            rows,
        })
    }
}

#[async_trait]
impl RevisionStore for MemoryStore {
    async fn list_all_document_ids(&self) -> CompareResult<Vec<DocumentId>> {
        self.live_ids()
    }

    async fn revs_diff(&self, request: &RevsDiffRequest) -> CompareResult<RevsDiffResponse> {
        let latency = self.faults.read().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        self.answer_revs_diff(request)
    }

    fn describe(&self) -> String {
        format!("memory:{}", self.name)
    }
}

impl LoopbackServer for MemoryStore {
    fn handle_post(&self, path: &str, body: &[u8]) -> CompareResult<Vec<u8>> {
        if !path.ends_with("/_revs_diff") {
            return Err(CompareError::http_status(404, format!("no route for POST {}", path)));
        }
        let request = RevsDiffRequest::from_json(body)
            .map_err(|e| CompareError::http_status(400, e.to_string()))?;
        Ok(self.answer_revs_diff(&request)?.to_json()?)
    }

    fn handle_get(&self, path: &str, query: &[(String, String)]) -> CompareResult<Vec<u8>> {
        if !path.ends_with("/_all_docs") {
            return Err(CompareError::http_status(404, format!("no route for GET {}", path)));
        }
        Ok(self.all_docs_page(query)?.to_json()?)
    }
}
