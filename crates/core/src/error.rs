//! Store error types
//!
//! Conflicts are not errors: they come back as [`CasOutcome::Conflict`].
//! A [`StoreError`] is whatever the retry policy could not absorb, plus
//! precondition and I/O failures around the store.
//!
//! [`CasOutcome::Conflict`]: crate::CasOutcome::Conflict

use crate::outcome::{FailureKind, TransientFailure};
use crate::types::{RecordId, Revision};
use thiserror::Error;

/// Errors surfaced by a revision store
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record exists under the id
    #[error("record not found: {0}")]
    NotFound(RecordId),

    /// The retry policy rethrew a transient failure
    #[error("{failure} after {retries} retries")]
    RetriesExhausted {
        /// The last failure seen
        failure: TransientFailure,
        /// Retries that were issued before giving up
        retries: u32,
    },

    /// The record's revision cannot be advanced any further
    #[error("revision of {0} is at its maximum")]
    RevisionOverflow(RecordId),

    /// The contact point could not be parsed or reached
    #[error("invalid contact point: {0}")]
    InvalidContactPoint(String),

    /// Snapshot could not be decoded or encoded
    #[error("snapshot error: {0}")]
    Snapshot(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

impl StoreError {
    /// Check if this is a not-found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Whether the store should be considered unreachable
    ///
    /// Exhausted unavailable and read-timeout failures mean the cluster
    /// cannot serve the race at all, as opposed to losing a CAS.
    pub fn is_fatal(&self) -> bool {
        match self {
            StoreError::RetriesExhausted { failure, .. } => matches!(
                failure.kind,
                FailureKind::Unavailable | FailureKind::ReadTimeout
            ),
            StoreError::InvalidContactPoint(_) => true,
            _ => false,
        }
    }

    /// The revision a conditional update from `prev` installs
    pub fn next_revision(id: &RecordId, prev: Revision) -> StoreResult<Revision> {
        prev.checked_add(1).ok_or_else(|| StoreError::RevisionOverflow(id.clone()))
    }

    /// The transient failure behind an exhausted retry, if any
    pub fn transient_failure(&self) -> Option<&TransientFailure> {
        match self {
            StoreError::RetriesExhausted { failure, .. } => Some(failure),
            _ => None,
        }
    }
}
