//! Bounded-concurrency execution of diff batches.
//!
//! Every batch runs as its own task in a `JoinSet`; a semaphore bounds how
//! many are in flight. Tasks hand their result back through the join set
//! and a single collector loop merges them, so the aggregate is never
//! shared between tasks.

use crate::batch::DiffBatch;
use crate::diff::BatchDiff;
use crate::error::{CompareError, CompareResult};
use revdiff_protocol::DocumentId;
use serde::{Serialize, Serializer};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// A batch that could not be diffed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchError {
    /// Index of the failed batch.
    pub index: usize,
    /// Documents of the batch, none of which were diffed.
    pub documents: Vec<DocumentId>,
    /// What went wrong.
    #[serde(serialize_with = "serialize_display")]
    pub error: CompareError,
}

fn serialize_display<S: Serializer>(error: &CompareError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Result of running a set of batches.
#[derive(Debug, Clone, Default)]
pub struct ScheduleOutcome {
    /// Merged results of every successful batch.
    pub merged: BatchDiff,
    /// One entry per failed batch, ordered by index.
    pub failures: Vec<BatchError>,
    /// Number of batches that completed successfully.
    pub completed: usize,
    /// Whether the overall timeout cut the run short.
    pub timed_out: bool,
}

impl ScheduleOutcome {
    /// Returns true if every batch completed.
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(
        &mut self,
        pending: &mut HashMap<Id, PendingBatch>,
        joined: Result<(Id, CompareResult<BatchDiff>), JoinError>,
    ) {
        let (id, result) = match joined {
            Ok((id, result)) => (id, result),
            Err(join_error) => {
                let reason = if join_error.is_panic() {
                    "batch task panicked"
                } else {
                    "batch task was cancelled"
                };
                (join_error.id(), Err(CompareError::Worker(reason.into())))
            }
        };
        let Some(batch) = pending.remove(&id) else {
            return;
        };

        match result {
            Ok(diff) => {
                debug!(batch = batch.index, "Batch completed");
                self.merged.merge(diff);
                self.completed += 1;
            }
            Err(error) => {
                warn!(batch = batch.index, error = %error, "Batch failed");
                self.failures.push(batch.into_failure(error));
            }
        }
    }
}

/// A spawned batch that has not reported yet.
struct PendingBatch {
    index: usize,
    documents: Vec<DocumentId>,
}

impl PendingBatch {
    fn into_failure(self, error: CompareError) -> BatchError {
        BatchError {
            index: self.index,
            documents: self.documents,
            error,
        }
    }
}

/// Runs diff batches on a bounded pool of concurrent tasks.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    concurrency: usize,
    timeout: Duration,
}

impl BatchScheduler {
    /// Creates a scheduler running at most `concurrency` batches at once
    /// and waiting at most `timeout` for all of them.
    pub fn new(concurrency: usize, timeout: Duration) -> CompareResult<Self> {
        if concurrency == 0 {
            return Err(CompareError::InvalidArgument(
                "concurrency must be positive".into(),
            ));
        }
        Ok(Self {
            concurrency,
            timeout,
        })
    }

    /// Runs `work` once per batch and merges the results.
    ///
    /// Batch failures are collected, never returned as an error. On
    /// timeout, unfinished batches are aborted and reported as
    /// [`CompareError::Timeout`]; finished ones are kept.
    pub async fn run<F, Fut>(&self, batches: Vec<DiffBatch>, work: F) -> ScheduleOutcome
    where
        F: Fn(DiffBatch) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CompareResult<BatchDiff>> + Send + 'static,
    {
        let total = batches.len();
        info!(batches = total, concurrency = self.concurrency, "Running diff batches");

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let work = Arc::new(work);
        let mut tasks = JoinSet::new();
        let mut pending: HashMap<Id, PendingBatch> = HashMap::new();

        for batch in batches {
            let entry = PendingBatch {
                index: batch.index,
                documents: batch.ids.clone(),
            };
            let semaphore = Arc::clone(&semaphore);
            let work = Arc::clone(&work);
            let handle = tasks.spawn(async move {
                match semaphore.acquire_owned().await {
                    Ok(_permit) => (*work)(batch).await,
                    Err(_) => Err(CompareError::Worker("scheduler shut down".into())),
                }
            });
            pending.insert(handle.id(), entry);
        }

        let deadline = Instant::now().checked_add(self.timeout);
        let mut outcome = ScheduleOutcome::default();

        loop {
            let joined = match deadline {
                Some(deadline) => {
                    tokio::time::timeout_at(deadline, tasks.join_next_with_id()).await
                }
                None => Ok(tasks.join_next_with_id().await),
            };

            match joined {
                Ok(Some(joined)) => outcome.record(&mut pending, joined),
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        outstanding = pending.len(),
                        timeout = ?self.timeout,
                        "Timed out waiting for batches"
                    );
                    outcome.timed_out = true;
                    tasks.abort_all();
                    // Keep results that landed before the abort took effect.
                    while let Some(joined) = tasks.join_next_with_id().await {
                        match joined {
                            Err(join_error) if join_error.is_cancelled() => {}
                            joined => outcome.record(&mut pending, joined),
                        }
                    }
                    break;
                }
            }
        }

        // Whatever is still pending never reported a result.
        for (_, batch) in pending {
            let error = if outcome.timed_out {
                CompareError::Timeout
            } else {
                CompareError::Worker("batch task never reported a result".into())
            };
            outcome.failures.push(batch.into_failure(error));
        }
        outcome.failures.sort_by_key(|failure| failure.index);

        info!(
            batches = total,
            completed = outcome.completed,
            failed = outcome.failures.len(),
            "Diff batches finished"
        );
        outcome
    }
}
