//! Comparison of two stores.

use crate::batch::{partition, DiffBatch};
use crate::config::CompareConfig;
use crate::diff::{RevisionDiffClient, UnresolvedDocument};
use crate::error::CompareResult;
use crate::http::{HttpStore, ReqwestClient};
use crate::reconcile::reconcile;
use crate::scheduler::{BatchError, BatchScheduler, ScheduleOutcome};
use crate::store::{RevisionStore, StoreRef};
use revdiff_protocol::{DocumentId, RevisionId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Which way revisions are being diffed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Leaves of A looked up in B; fills `missing_in_b`.
    AToB,
    /// Leaves of B looked up in A; fills `missing_in_a`.
    BToA,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::AToB => f.write_str("A->B"),
            Direction::BToA => f.write_str("B->A"),
        }
    }
}

/// A failed batch, tagged with the direction it ran in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionalFailure {
    /// Direction of the failed run.
    pub direction: Direction,
    /// The failed batch.
    #[serde(flatten)]
    pub failure: BatchError,
}

/// An unresolved document, tagged with the direction that found it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectionalUnresolved {
    /// Direction of the run whose source reported no leaves.
    pub direction: Direction,
    /// The unresolved document.
    #[serde(flatten)]
    pub document: UnresolvedDocument,
}

/// Outcome of comparing two stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    /// Documents only store A holds.
    pub only_in_a: BTreeSet<DocumentId>,
    /// Documents only store B holds.
    pub only_in_b: BTreeSet<DocumentId>,
    /// Leaf revisions of B that A lacks, per common document.
    pub missing_in_a: BTreeMap<DocumentId, Vec<RevisionId>>,
    /// Leaf revisions of A that B lacks, per common document.
    pub missing_in_b: BTreeMap<DocumentId, Vec<RevisionId>>,
    /// Common documents whose leaves could not be discovered.
    pub unresolved: Vec<DirectionalUnresolved>,
    /// Batches that could not be diffed.
    pub failures: Vec<DirectionalFailure>,
}

impl ComparisonReport {
    /// Returns true if the stores hold the same documents and leaves and
    /// every document was diffed.
    pub fn is_consistent(&self) -> bool {
        self.only_in_a.is_empty()
            && self.only_in_b.is_empty()
            && self.missing_in_a.is_empty()
            && self.missing_in_b.is_empty()
            && self.is_complete()
    }

    /// Returns true if no batch failed and no document was left unresolved.
    pub fn is_complete(&self) -> bool {
        self.unresolved.is_empty() && self.failures.is_empty()
    }

    fn absorb(&mut self, direction: Direction, outcome: ScheduleOutcome) {
        let missing = match direction {
            Direction::AToB => &mut self.missing_in_b,
            Direction::BToA => &mut self.missing_in_a,
        };
        *missing = outcome.merged.missing;
        self.unresolved
            .extend(outcome.merged.unresolved.into_iter().map(|document| {
                DirectionalUnresolved {
                    direction,
                    document,
                }
            }));
        self.failures
            .extend(outcome.failures.into_iter().map(|failure| DirectionalFailure {
                direction,
                failure,
            }));
    }
}

/// Compares two stores that are expected to be replicas.
pub struct Comparator {
    store_a: Arc<dyn RevisionStore>,
    store_b: Arc<dyn RevisionStore>,
    config: CompareConfig,
}

impl Comparator {
    /// Creates a comparator over two stores.
    pub fn new(
        store_a: Arc<dyn RevisionStore>,
        store_b: Arc<dyn RevisionStore>,
        config: CompareConfig,
    ) -> Self {
        Self {
            store_a,
            store_b,
            config,
        }
    }

    /// Creates a comparator over two HTTP stores.
    pub fn from_refs(a: StoreRef, b: StoreRef, config: CompareConfig) -> CompareResult<Self> {
        config.validate()?;
        let client = ReqwestClient::new(config.request_timeout)?;
        let store_a = HttpStore::new(a, client.clone()).with_page_size(config.page_size);
        let store_b = HttpStore::new(b, client).with_page_size(config.page_size);
        Ok(Self::new(Arc::new(store_a), Arc::new(store_b), config))
    }

    /// Runs the comparison.
    ///
    /// Listing failures and bad configuration are returned as errors.
    /// Batch failures end up in [`ComparisonReport::failures`].
    pub async fn compare(&self) -> CompareResult<ComparisonReport> {
        let sentinel = self.config.validate()?;
        let scheduler = BatchScheduler::new(self.config.concurrency, self.config.timeout)?;
        let started = Instant::now();

        let (ids_a, ids_b) = tokio::try_join!(
            self.store_a.list_all_document_ids(),
            self.store_b.list_all_document_ids()
        )?;
        info!(
            store_a = %self.store_a.describe(),
            store_b = %self.store_b.describe(),
            documents_a = ids_a.len(),
            documents_b = ids_b.len(),
            "Listed documents"
        );

        let reconciliation = reconcile(ids_a, ids_b);
        let batches = partition(&reconciliation.common, self.config.batch_size)?;
        info!(
            only_in_a = reconciliation.only_in_a.len(),
            only_in_b = reconciliation.only_in_b.len(),
            common = reconciliation.common.len(),
            batches = batches.len(),
            "Reconciled document sets"
        );

        let a_to_b = RevisionDiffClient::new(
            Arc::clone(&self.store_a),
            Arc::clone(&self.store_b),
            sentinel.clone(),
        );
        let b_to_a = RevisionDiffClient::new(
            Arc::clone(&self.store_b),
            Arc::clone(&self.store_a),
            sentinel,
        );
        let (forward, backward) = tokio::join!(
            run_direction(&scheduler, Direction::AToB, a_to_b, batches.clone()),
            run_direction(&scheduler, Direction::BToA, b_to_a, batches),
        );

        let mut report = ComparisonReport {
            only_in_a: reconciliation.only_in_a,
            only_in_b: reconciliation.only_in_b,
            ..ComparisonReport::default()
        };
        report.absorb(Direction::AToB, forward);
        report.absorb(Direction::BToA, backward);

        info!(
            missing_in_a = report.missing_in_a.len(),
            missing_in_b = report.missing_in_b.len(),
            unresolved = report.unresolved.len(),
            failed_batches = report.failures.len(),
            elapsed = ?started.elapsed(),
            "Comparison finished"
        );
        Ok(report)
    }
}

async fn run_direction(
    scheduler: &BatchScheduler,
    direction: Direction,
    client: RevisionDiffClient,
    batches: Vec<DiffBatch>,
) -> ScheduleOutcome {
    info!(%direction, batches = batches.len(), "Diffing revisions");
    let client = Arc::new(client);
    scheduler
        .run(batches, move |batch| {
            let client = Arc::clone(&client);
            async move { client.diff_batch(&batch).await }
        })
        .await
}
