//! Core data model for casrace
//!
//! This crate defines the types shared by the store client and the race
//! engine:
//! - [`Record`] / [`RecordId`]: the single revision-guarded row
//! - [`ConsistencyLevel`]: replica acknowledgement requirements
//! - [`CasOutcome`] / [`AttemptRecord`]: what one CAS attempt produced
//! - [`TransientFailure`]: a retryable failure reported by the store
//! - [`StoreError`]: everything that escapes the retry policy

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod consistency;
pub mod error;
pub mod outcome;
pub mod types;

pub use consistency::ConsistencyLevel;
pub use error::{StoreError, StoreResult};
pub use outcome::{AttemptRecord, CasOutcome, FailureKind, TransientFailure, WriteType};
pub use types::{
    ProcessId, Record, RecordId, Revision, WorkerId, WorkerIdentity, DEFAULT_METADATA,
    DEFAULT_PAYLOAD, DEFAULT_RECORD_ID,
};
