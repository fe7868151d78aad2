//! Public types for the casrace API.
//!
//! This module re-exports types from the member crates.

// Record and identity types
pub use casrace_core::{
    ProcessId, Record, RecordId, Revision, WorkerId, WorkerIdentity, DEFAULT_METADATA,
    DEFAULT_PAYLOAD, DEFAULT_RECORD_ID,
};

// Outcomes and failures
pub use casrace_core::{
    AttemptRecord, CasOutcome, ConsistencyLevel, FailureKind, StoreError, TransientFailure,
};

// Store client types
pub use casrace_store::{
    ContactPoint, InjectedFault, RetryPolicyKind, RevisionStore, Session, SessionConfig,
    SimulatedCluster, StatementKind, MAX_RETRIES,
};

// Race types
pub use casrace_concurrency::{
    CollectorReport, OutputFormat, Overflow, QueueCapacity, QueueStats, RaceConfig, RaceReport,
    StopCondition, WorkerError, WorkerSummary,
};
