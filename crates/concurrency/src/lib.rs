//! Concurrency layer for casrace
//!
//! This crate races workers against a [`RevisionStore`] with:
//! - Worker: read, conditional update, re-read on failure
//! - Outcome queue: multi-producer single-consumer, per-worker sentinels
//! - Collector: the single consumer and only writer of race output
//! - Orchestration: `race`, `relay`, `cas_thread` and `read_main_then_cas_thread`
//!
//! [`RevisionStore`]: casrace_store::RevisionStore

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod queue;
pub mod race;
pub mod worker;

pub use collector::{Collector, CollectorReport, OutputFormat, StopCondition};
pub use queue::{
    outcome_queue, Delivery, OutcomeReceiver, OutcomeSender, Overflow, QueueCapacity, QueueItem,
    QueueMonitor, QueueStats,
};
pub use race::{cas_thread, race, read_main_then_cas_thread, relay, RaceConfig, RaceReport};
pub use worker::{Worker, WorkerError, WorkerSummary};
