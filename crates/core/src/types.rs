//! Core types for the revision store
//!
//! This module defines the identifiers and the row shape used throughout
//! the system:
//! - [`RecordId`]: key of the revision-guarded row
//! - [`Record`]: the row itself
//! - [`WorkerIdentity`]: who produced an attempt

use serde::{Deserialize, Serialize};
use std::fmt;

/// Revision counter guarding a record against lost updates
pub type Revision = u64;

/// Key of the row every worker races on
pub const DEFAULT_RECORD_ID: &str = "cas-test";

/// Auxiliary metadata written alongside every revision
pub const DEFAULT_METADATA: &str = "map";

/// Opaque payload written alongside every revision
pub const DEFAULT_PAYLOAD: &[u8] = b"test";

/// Identifier of a record in the store
///
/// # Examples
///
/// ```
/// use casrace_core::RecordId;
///
/// let id = RecordId::new("cas-test");
/// assert_eq!(id.as_str(), "cas-test");
/// assert_eq!(RecordId::default(), id);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(String);

impl RecordId {
    /// Create a record id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        RecordId::new(DEFAULT_RECORD_ID)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId::new(s)
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        RecordId(s)
    }
}

/// A single revision-guarded row
///
/// Owned by the store. Workers never hold on to one beyond a single read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Monotonically non-decreasing revision
    pub revision: Revision,
    /// Carried for parity with the row schema, never interpreted
    pub metadata: String,
    /// Opaque payload bytes
    pub payload: Vec<u8>,
}

impl Record {
    /// Create a record at the given revision
    pub fn new(revision: Revision, metadata: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            revision,
            metadata: metadata.into(),
            payload: payload.into(),
        }
    }
}

impl Default for Record {
    fn default() -> Self {
        Record::new(0, DEFAULT_METADATA, DEFAULT_PAYLOAD)
    }
}

/// Index of a worker within one race
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Operating-system process id of the racing process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProcessId(pub u32);

impl ProcessId {
    /// The id of the current process
    pub fn current() -> Self {
        ProcessId(std::process::id())
    }
}

impl fmt::Display for ProcessId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity stamped on every attempt a worker produces
///
/// Passed into the worker explicitly; the worker never looks up thread or
/// process ids on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkerIdentity {
    /// Worker index within the race
    pub worker: WorkerId,
    /// Process the worker runs in
    pub process: ProcessId,
}

impl WorkerIdentity {
    /// Identity for worker `index` in the current process
    pub fn local(index: u64) -> Self {
        Self {
            worker: WorkerId(index),
            process: ProcessId::current(),
        }
    }
}

impl fmt::Display for WorkerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {} (pid {})", self.worker, self.process)
    }
}
