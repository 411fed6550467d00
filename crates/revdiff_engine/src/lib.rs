//! # Revdiff Engine
//!
//! Revision reconciliation between two document stores that are expected
//! to be replicas of each other.
//!
//! This crate provides:
//! - Document-set reconciliation (only in A, only in B, common)
//! - Batching of common documents
//! - Two-phase `_revs_diff` client with sentinel leaf discovery
//! - Bounded-concurrency batch scheduler with an overall timeout
//! - HTTP store over `reqwest`, plus an in-memory store for tests
//!
//! ## Architecture
//!
//! A comparison runs in three steps:
//! 1. List every document id in both stores
//! 2. Reconcile the listings and batch the common ids
//! 3. Diff every batch in both directions, concurrently
//!
//! ## Key Invariants
//!
//! - Documents held by only one store are never diffed
//! - Reported missing revisions are leaves of the source store
//! - A failed batch never affects its siblings
//! - Results are collected by a single task; workers share no state

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod batch;
mod compare;
mod config;
mod diff;
mod error;
mod http;
mod memory;
mod reconcile;
mod scheduler;
mod store;

pub use batch::{partition, DiffBatch};
pub use compare::{
    Comparator, ComparisonReport, Direction, DirectionalFailure, DirectionalUnresolved,
};
pub use config::{
    CompareConfig, DEFAULT_BATCH_SIZE, DEFAULT_CONCURRENCY, DEFAULT_SENTINEL_REVISION,
    DEFAULT_TIMEOUT,
};
pub use diff::{BatchDiff, RevisionDiffClient, UnresolvedDocument};
pub use error::{CompareError, CompareResult};
pub use http::{HttpClient, HttpStore, LoopbackClient, LoopbackServer, ReqwestClient};
pub use memory::MemoryStore;
pub use reconcile::{reconcile, Reconciliation};
pub use scheduler::{BatchError, BatchScheduler, ScheduleOutcome};
pub use store::{RevisionStore, StoreRef};
