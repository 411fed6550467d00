//! Two-phase revision diff for one batch of common documents.
//!
//! Phase one asks the *source* store about a sentinel revision that cannot
//! exist. The store reports it missing and, as a side effect, lists the
//! document's real leaf revisions under `possible_ancestors`. Phase two
//! offers those leaves to the *target* store, whose `missing` field names
//! the leaves it does not hold anywhere in its revision tree.

use crate::batch::DiffBatch;
use crate::error::{CompareError, CompareResult};
use crate::store::RevisionStore;
use revdiff_protocol::{DocumentId, RevisionId, RevsDiffRequest};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A common document whose leaves could not be discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnresolvedDocument {
    /// The document id.
    pub id: DocumentId,
    /// Why the document could not be diffed.
    pub reason: String,
}

/// Result of diffing one or more batches in one direction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchDiff {
    /// Leaf revisions of the source that the target lacks, per document.
    pub missing: BTreeMap<DocumentId, Vec<RevisionId>>,
    /// Documents that could not be diffed.
    pub unresolved: Vec<UnresolvedDocument>,
}

impl BatchDiff {
    /// Merges another result into this one.
    ///
    /// Revisions for the same document are unioned and kept sorted.
    pub fn merge(&mut self, other: BatchDiff) {
        for (id, revs) in other.missing {
            let entry = self.missing.entry(id).or_default();
            entry.extend(revs);
            entry.sort();
            entry.dedup();
        }
        self.unresolved.extend(other.unresolved);
    }

    /// Returns true if nothing is missing and nothing is unresolved.
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unresolved.is_empty()
    }
}

/// Runs the two-phase diff protocol from a source store to a target store.
#[derive(Clone)]
pub struct RevisionDiffClient {
    source: Arc<dyn RevisionStore>,
    target: Arc<dyn RevisionStore>,
    sentinel: RevisionId,
}

impl RevisionDiffClient {
    /// Creates a client that finds leaves of `source` missing in `target`.
    pub fn new(
        source: Arc<dyn RevisionStore>,
        target: Arc<dyn RevisionStore>,
        sentinel: RevisionId,
    ) -> Self {
        Self {
            source,
            target,
            sentinel,
        }
    }

    /// Diffs one batch.
    ///
    /// Any transport or decoding failure fails the whole batch; the caller
    /// decides how to report it.
    pub async fn diff_batch(&self, batch: &DiffBatch) -> CompareResult<BatchDiff> {
        let (candidates, unresolved) = self.discover_leaves(batch).await?;

        let mut result = BatchDiff {
            missing: BTreeMap::new(),
            unresolved,
        };
        if candidates.is_empty() {
            return Ok(result);
        }

        let response = self.target.revs_diff(&candidates).await?;
        for (id, entry) in response.into_entries() {
            let offered = candidates.get(id.as_str()).ok_or_else(|| {
                CompareError::Protocol(format!(
                    "{} answered for unrequested document {}",
                    self.target.describe(),
                    id
                ))
            })?;
            if let Some(rev) = entry.missing.iter().find(|rev| !offered.contains(rev)) {
                return Err(CompareError::Protocol(format!(
                    "{} reported {} missing for {}, which was not offered",
                    self.target.describe(),
                    rev,
                    id
                )));
            }
            if entry.missing.is_empty() {
                continue;
            }

            let mut revs = entry.missing;
            revs.sort();
            revs.dedup();
            result.missing.insert(id, revs);
        }

        debug!(
            batch = batch.index,
            documents = batch.len(),
            offered = candidates.len(),
            with_missing = result.missing.len(),
            "Batch diffed"
        );
        Ok(result)
    }

    /// Phase one: learns each document's leaves from the source store.
    async fn discover_leaves(
        &self,
        batch: &DiffBatch,
    ) -> CompareResult<(RevsDiffRequest, Vec<UnresolvedDocument>)> {
        let probe: RevsDiffRequest = batch
            .ids
            .iter()
            .map(|id| (id.clone(), vec![self.sentinel.clone()]))
            .collect();
        let response = self.source.revs_diff(&probe).await?;

        let mut candidates = RevsDiffRequest::new();
        let mut unresolved = Vec::new();
        for id in &batch.ids {
            // The sentinel is never held, so every probed document must
            // come back.
            let entry = response.get(id.as_str()).ok_or_else(|| {
                CompareError::Protocol(format!(
                    "{} omitted {} from leaf discovery",
                    self.source.describe(),
                    id
                ))
            })?;

            let mut leaves: Vec<RevisionId> = entry
                .possible_ancestors
                .iter()
                .filter(|rev| **rev != self.sentinel)
                .cloned()
                .collect();
            leaves.sort();
            leaves.dedup();

            if leaves.is_empty() {
                warn!(
                    store = %self.source.describe(),
                    document = %id,
                    "No leaf revisions reported; document skipped"
                );
                unresolved.push(UnresolvedDocument {
                    id: id.clone(),
                    reason: format!("{} reported no leaf revisions", self.source.describe()),
                });
            } else {
                candidates.insert(id.clone(), leaves);
            }
        }

        Ok((candidates, unresolved))
    }
}
