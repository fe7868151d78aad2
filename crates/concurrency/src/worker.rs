//! Worker: one actor's read → CAS → re-read loop
//!
//! ```text
//! prev := read(id)
//! sleep(startup_delay)                  once, never per iteration
//! while prev < target:
//!     outcome := cas(id, prev, prev + 1)
//!     enqueue AttemptRecord(outcome, prev, prev + 1)
//!     Success  -> prev := prev + 1      no re-read on the happy path
//!     _        -> prev := read(id)      includes WriteTimeout
//! enqueue Done(identity)
//! ```
//!
//! The sentinel goes out on every exit path, including errors and panics,
//! so the collector is never left waiting on a dead worker.

use crate::queue::{Delivery, OutcomeSender};
use casrace_core::{
    AttemptRecord, CasOutcome, RecordId, Revision, StoreError, StoreResult, WorkerIdentity,
    DEFAULT_PAYLOAD,
};
use casrace_store::RevisionStore;
use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error};

/// Why a worker stopped before reaching its target
#[derive(Debug, Error)]
pub enum WorkerError {
    /// The store failed beyond what the retry policy absorbs
    #[error("{identity}: {source}")]
    Store {
        /// The failing worker
        identity: WorkerIdentity,
        /// The store error
        #[source]
        source: StoreError,
    },

    /// The worker thread panicked
    #[error("{identity} panicked")]
    Panicked {
        /// The failing worker
        identity: WorkerIdentity,
    },
}

impl WorkerError {
    /// The worker that failed
    pub fn identity(&self) -> WorkerIdentity {
        match self {
            WorkerError::Store { identity, .. } | WorkerError::Panicked { identity } => *identity,
        }
    }

    /// Whether the store looked unreachable rather than merely contended
    pub fn is_fatal(&self) -> bool {
        match self {
            WorkerError::Store { source, .. } => source.is_fatal(),
            WorkerError::Panicked { .. } => true,
        }
    }

    /// The underlying store error, if any
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            WorkerError::Store { source, .. } => Some(source),
            WorkerError::Panicked { .. } => None,
        }
    }
}

/// What one worker did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Who
    pub identity: WorkerIdentity,
    /// CAS attempts made
    pub attempts: u64,
    /// Attempts that committed
    pub successes: u64,
    /// Attempts that lost the race
    pub conflicts: u64,
    /// Attempts that found no row
    pub no_rows: u64,
    /// Attempts with an unknown outcome
    pub write_timeouts: u64,
    /// Records discarded by a full queue
    pub dropped: u64,
    /// Records sent after the collector stopped
    pub undelivered: u64,
    /// Last revision the worker knew of
    pub final_revision: Revision,
}

impl WorkerSummary {
    fn new(identity: WorkerIdentity) -> Self {
        Self {
            identity,
            attempts: 0,
            successes: 0,
            conflicts: 0,
            no_rows: 0,
            write_timeouts: 0,
            dropped: 0,
            undelivered: 0,
            final_revision: 0,
        }
    }

    fn observe(&mut self, outcome: CasOutcome, delivery: Delivery) {
        self.attempts += 1;
        match outcome {
            CasOutcome::Success => self.successes += 1,
            CasOutcome::Conflict => self.conflicts += 1,
            CasOutcome::NoRow => self.no_rows += 1,
            CasOutcome::WriteTimeout => self.write_timeouts += 1,
        }
        match delivery {
            Delivery::Delivered => {}
            Delivery::Dropped => self.dropped += 1,
            Delivery::Undelivered => self.undelivered += 1,
        }
    }
}

/// Sends the worker's sentinel when dropped
struct CompletionGuard<'a> {
    queue: &'a OutcomeSender,
    identity: WorkerIdentity,
}

impl Drop for CompletionGuard<'_> {
    fn drop(&mut self) {
        self.queue.complete(self.identity);
    }
}

/// One racing actor
#[derive(Debug)]
pub struct Worker<S> {
    store: S,
    identity: WorkerIdentity,
    record_id: RecordId,
    startup_delay: Duration,
    payload: Vec<u8>,
}

impl<S: RevisionStore> Worker<S> {
    /// A worker racing on the default record with no startup delay
    pub fn new(store: S, identity: WorkerIdentity) -> Self {
        Self {
            store,
            identity,
            record_id: RecordId::default(),
            startup_delay: Duration::ZERO,
            payload: DEFAULT_PAYLOAD.to_vec(),
        }
    }

    /// Race on a different record
    pub fn record_id(mut self, id: RecordId) -> Self {
        self.record_id = id;
        self
    }

    /// Sleep once after the first read
    pub fn startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    /// Payload written with every revision
    pub fn payload(mut self, payload: impl Into<Vec<u8>>) -> Self {
        self.payload = payload.into();
        self
    }

    /// This worker's identity
    pub fn identity(&self) -> WorkerIdentity {
        self.identity
    }

    /// Drive the record to `target`, reporting every attempt on `queue`
    ///
    /// Terminal errors are logged with the worker's identity before being
    /// returned.
    pub fn run(&self, target: Revision, queue: &OutcomeSender) -> Result<WorkerSummary, WorkerError> {
        let _done = CompletionGuard {
            queue,
            identity: self.identity,
        };

        match self.drive(target, queue) {
            Ok(summary) => {
                debug!(
                    worker = %self.identity.worker,
                    process = %self.identity.process,
                    attempts = summary.attempts,
                    successes = summary.successes,
                    "worker reached target"
                );
                Ok(summary)
            }
            Err(source) => {
                error!(
                    worker = %self.identity.worker,
                    process = %self.identity.process,
                    fatal = source.is_fatal(),
                    error = %source,
                    "worker terminated"
                );
                Err(WorkerError::Store {
                    identity: self.identity,
                    source,
                })
            }
        }
    }

    fn drive(&self, target: Revision, queue: &OutcomeSender) -> StoreResult<WorkerSummary> {
        let mut summary = WorkerSummary::new(self.identity);
        let mut prev = self.store.read(&self.record_id)?;

        if !self.startup_delay.is_zero() {
            thread::sleep(self.startup_delay);
        }

        while prev < target {
            let outcome = self
                .store
                .compare_and_swap(&self.record_id, prev, prev + 1, &self.payload)?;
            debug!(worker = %self.identity.worker, observed = prev, %outcome, "cas attempt");
            let delivery = queue.send_attempt(AttemptRecord::new(outcome, prev, self.identity));
            summary.observe(outcome, delivery);

            prev = if outcome.is_success() {
                prev + 1
            } else {
                self.store.read(&self.record_id)?
            };
        }

        summary.final_revision = prev;
        Ok(summary)
    }
}
