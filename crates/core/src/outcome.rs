//! CAS outcomes, attempt records and transient failures

use crate::consistency::ConsistencyLevel;
use crate::types::{ProcessId, Revision, WorkerId, WorkerIdentity};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of one conditional update
///
/// `Conflict` is an expected part of a race, not an error. `WriteTimeout`
/// means the commit is unknown: the update may or may not have landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CasOutcome {
    /// The conditional update committed
    Success,
    /// The expected revision did not match the stored one
    Conflict,
    /// No record exists under the id
    NoRow,
    /// Write timed out after the retry policy gave up
    WriteTimeout,
}

impl CasOutcome {
    /// Short kebab-case name used when rendering
    pub fn as_str(&self) -> &'static str {
        match self {
            CasOutcome::Success => "success",
            CasOutcome::Conflict => "conflict",
            CasOutcome::NoRow => "no-row",
            CasOutcome::WriteTimeout => "write-timeout",
        }
    }

    /// Whether the update is known to have committed
    pub fn is_success(&self) -> bool {
        matches!(self, CasOutcome::Success)
    }
}

impl fmt::Display for CasOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One CAS attempt as seen by the worker that made it
///
/// Immutable once built; consumed exactly once by the collector. Records
/// from different workers are ordered by arrival only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// What the store answered
    pub outcome: CasOutcome,
    /// Revision the worker expected
    pub observed_revision: Revision,
    /// Revision the worker tried to install
    pub attempted_revision: Revision,
    /// Worker index
    pub worker: WorkerId,
    /// Process id
    pub process: ProcessId,
}

impl AttemptRecord {
    /// Build a record for an attempt to move `observed` to `observed + 1`
    pub fn new(outcome: CasOutcome, observed_revision: Revision, identity: WorkerIdentity) -> Self {
        Self {
            outcome,
            observed_revision,
            attempted_revision: observed_revision + 1,
            worker: identity.worker,
            process: identity.process,
        }
    }

    /// Identity of the producing worker
    pub fn identity(&self) -> WorkerIdentity {
        WorkerIdentity {
            worker: self.worker,
            process: self.process,
        }
    }
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {}, {}, {}, {}]",
            self.outcome, self.observed_revision, self.attempted_revision, self.worker, self.process
        )
    }
}

/// Class of a transient store failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureKind {
    /// Not enough replicas answered a read in time
    ReadTimeout,
    /// Not enough replicas acknowledged a write in time
    WriteTimeout,
    /// Not enough replicas were alive to attempt the request
    Unavailable,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::ReadTimeout => "read timeout",
            FailureKind::WriteTimeout => "write timeout",
            FailureKind::Unavailable => "unavailable",
        };
        f.write_str(s)
    }
}

/// Phase of a write that timed out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WriteType {
    /// Plain single-partition write
    Simple,
    /// Paxos round of a conditional update
    Cas,
}

/// A retryable failure as reported by the store's failure callback
///
/// `reported` is the consistency level the store attaches to the failure.
/// It need not match the level the statement was issued at: a conditional
/// update that times out during its paxos phase reports the serial level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransientFailure {
    /// Failure class
    pub kind: FailureKind,
    /// Level reported by the failure callback
    pub reported: ConsistencyLevel,
    /// Write phase, for write timeouts
    pub write_type: Option<WriteType>,
    /// Replicas that were required
    pub required: usize,
    /// Replicas that answered (or were alive)
    pub received: usize,
}

impl TransientFailure {
    /// A read timeout reported at `reported`
    pub fn read_timeout(reported: ConsistencyLevel, required: usize, received: usize) -> Self {
        Self {
            kind: FailureKind::ReadTimeout,
            reported,
            write_type: None,
            required,
            received,
        }
    }

    /// A write timeout of the given phase reported at `reported`
    pub fn write_timeout(
        reported: ConsistencyLevel,
        write_type: WriteType,
        required: usize,
        received: usize,
    ) -> Self {
        Self {
            kind: FailureKind::WriteTimeout,
            reported,
            write_type: Some(write_type),
            required,
            received,
        }
    }

    /// Not enough live replicas for `reported`
    pub fn unavailable(reported: ConsistencyLevel, required: usize, alive: usize) -> Self {
        Self {
            kind: FailureKind::Unavailable,
            reported,
            write_type: None,
            required,
            received: alive,
        }
    }
}

impl fmt::Display for TransientFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at {} ({} of {} replicas)",
            self.kind, self.reported, self.received, self.required
        )
    }
}
