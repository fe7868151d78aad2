//! Simulated replicated cluster
//!
//! An in-process stand-in for the replicated store a session talks to.
//!
//! # Design
//!
//! - Rows: a DashMap keyed by [`RecordId`]. A conditional update holds the
//!   row's shard lock for its check-and-set, so CAS is linearizable.
//! - Replicas: a replication factor and a count of live replicas. A
//!   statement whose consistency (or serial consistency) needs more
//!   replicas than are live fails with `Unavailable`.
//! - Faults: a [`FaultInjector`] decides which executions time out and what
//!   consistency level the failure callback reports.
//! - Issue log: every execution is recorded with the level it was issued
//!   at, so retries are observable from the outside.
//!
//! Replica state is not modelled individually: there is one authoritative
//! copy of each row and consistency levels only gate availability.

use crate::fault::{FaultInjector, InjectedFault};
use crate::statement::{Statement, StatementKind};
use casrace_core::{
    CasOutcome, ConsistencyLevel, FailureKind, Record, RecordId, Revision, StoreError,
    StoreResult, TransientFailure, WriteType,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::debug;

/// Host and port a session connects to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContactPoint {
    /// Host name or address
    pub host: String,
    /// Native protocol port
    pub port: u16,
}

impl ContactPoint {
    /// Validate and build a contact point
    pub fn new(host: impl Into<String>, port: u16) -> StoreResult<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(StoreError::InvalidContactPoint("empty host".to_string()));
        }
        if port == 0 {
            return Err(StoreError::InvalidContactPoint(format!("{}:0", host)));
        }
        Ok(Self { host, port })
    }
}

impl Default for ContactPoint {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9042,
        }
    }
}

impl fmt::Display for ContactPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ContactPoint {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| StoreError::InvalidContactPoint(s.to_string()))?;
        let port = port
            .parse::<u16>()
            .map_err(|_| StoreError::InvalidContactPoint(s.to_string()))?;
        ContactPoint::new(host, port)
    }
}

/// Cluster shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterConfig {
    /// Where sessions connect
    pub contact_point: ContactPoint,
    /// Replicas per row
    pub replication_factor: usize,
    /// Replicas currently alive
    pub live_replicas: usize,
    /// Most recent executions kept in the issue log
    pub issue_log_capacity: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            contact_point: ContactPoint::default(),
            replication_factor: 3,
            live_replicas: 3,
            issue_log_capacity: 10_000,
        }
    }
}

/// One statement execution as seen by the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedStatement {
    /// Statement shape
    pub kind: StatementKind,
    /// Level the statement was prepared with
    pub configured: ConsistencyLevel,
    /// Level this execution was issued at
    pub consistency: ConsistencyLevel,
    /// Serial level of the statement
    pub serial_consistency: Option<ConsistencyLevel>,
    /// 0 for the first try, n for the n-th retry
    pub attempt: u32,
}

/// In-process replicated cluster
pub struct SimulatedCluster {
    contact_point: ContactPoint,
    replication_factor: usize,
    live_replicas: AtomicUsize,
    rows: DashMap<RecordId, Record>,
    faults: FaultInjector,
    issued: Mutex<VecDeque<IssuedStatement>>,
    issue_log_capacity: usize,
    executions: AtomicU64,
    cas_commits: AtomicU64,
}

impl SimulatedCluster {
    /// Create an empty cluster
    pub fn new(config: ClusterConfig) -> Self {
        let replication_factor = config.replication_factor.max(1);
        Self {
            contact_point: config.contact_point,
            replication_factor,
            live_replicas: AtomicUsize::new(config.live_replicas.min(replication_factor)),
            rows: DashMap::new(),
            faults: FaultInjector::new(),
            issued: Mutex::new(VecDeque::new()),
            issue_log_capacity: config.issue_log_capacity,
            executions: AtomicU64::new(0),
            cas_commits: AtomicU64::new(0),
        }
    }

    /// Where sessions connect
    pub fn contact_point(&self) -> &ContactPoint {
        &self.contact_point
    }

    /// Replicas per row
    pub fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    /// Replicas currently alive
    pub fn live_replicas(&self) -> usize {
        self.live_replicas.load(Ordering::Acquire)
    }

    /// Bring replicas up or down; clamped to the replication factor
    pub fn set_live_replicas(&self, live: usize) {
        self.live_replicas
            .store(live.min(self.replication_factor), Ordering::Release);
    }

    /// Fault injector driving timeouts
    pub fn faults(&self) -> &FaultInjector {
        &self.faults
    }

    /// Executions kept in the issue log, oldest first
    pub fn issued(&self) -> Vec<IssuedStatement> {
        self.issued.lock().iter().copied().collect()
    }

    /// Empty the issue log
    pub fn clear_issued(&self) {
        self.issued.lock().clear();
    }

    /// Executions since the cluster was created
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    /// Conditional updates that committed
    pub fn cas_commits(&self) -> u64 {
        self.cas_commits.load(Ordering::Relaxed)
    }

    /// Inspect a row without going through a statement
    pub fn row(&self, id: &RecordId) -> Option<Record> {
        self.rows.get(id).map(|row| row.value().clone())
    }

    /// Every row, sorted by id
    pub fn rows(&self) -> BTreeMap<RecordId, Record> {
        self.rows
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    /// Replace all rows
    pub fn restore(&self, rows: BTreeMap<RecordId, Record>) {
        self.rows.clear();
        for (id, record) in rows {
            self.rows.insert(id, record);
        }
    }

    // ========================================================================
    // Statement execution
    // ========================================================================

    pub(crate) fn select(
        &self,
        statement: &Statement,
        level: ConsistencyLevel,
        attempt: u32,
        id: &RecordId,
    ) -> Result<Option<Record>, TransientFailure> {
        if let Some(fault) = self.admit(statement, level, attempt)? {
            return Err(self.failure_for(&fault, statement, level));
        }
        Ok(self.row(id))
    }

    pub(crate) fn insert(
        &self,
        statement: &Statement,
        level: ConsistencyLevel,
        attempt: u32,
        id: &RecordId,
        record: Record,
    ) -> Result<(), TransientFailure> {
        let fault = self.admit(statement, level, attempt)?;
        if let Some(fault) = fault {
            if fault.kind != FailureKind::WriteTimeout || !fault.applied {
                return Err(self.failure_for(&fault, statement, level));
            }
        }

        // The revision column never moves backwards on a plain insert.
        self.rows
            .entry(id.clone())
            .and_modify(|row| {
                row.revision = row.revision.max(record.revision);
                row.metadata = record.metadata.clone();
                row.payload = record.payload.clone();
            })
            .or_insert_with(|| record.clone());

        match fault {
            Some(fault) => Err(self.failure_for(&fault, statement, level)),
            None => Ok(()),
        }
    }

    pub(crate) fn cas(
        &self,
        statement: &Statement,
        level: ConsistencyLevel,
        attempt: u32,
        id: &RecordId,
        expected: Revision,
        record: Record,
    ) -> Result<CasOutcome, TransientFailure> {
        let fault = self.admit(statement, level, attempt)?;
        if let Some(fault) = fault {
            if fault.kind != FailureKind::WriteTimeout || !fault.applied {
                return Err(self.failure_for(&fault, statement, level));
            }
        }

        let outcome = match self.rows.get_mut(id) {
            None => CasOutcome::NoRow,
            Some(mut row) => {
                if row.revision == expected {
                    *row = record;
                    self.cas_commits.fetch_add(1, Ordering::Relaxed);
                    CasOutcome::Success
                } else {
                    CasOutcome::Conflict
                }
            }
        };

        match fault {
            Some(fault) => {
                debug!(%id, expected, ?outcome, "write timed out after landing");
                Err(self.failure_for(&fault, statement, level))
            }
            None => Ok(outcome),
        }
    }

    /// Log the execution, check replica availability and draw a fault
    fn admit(
        &self,
        statement: &Statement,
        level: ConsistencyLevel,
        attempt: u32,
    ) -> Result<Option<InjectedFault>, TransientFailure> {
        self.record_issue(statement, level, attempt);

        let live = self.live_replicas();
        let required = level.required_replicas(self.replication_factor);
        if live < required {
            return Err(TransientFailure::unavailable(level, required, live));
        }
        if statement.kind == StatementKind::Cas {
            if let Some(serial) = statement.serial_consistency {
                let required = serial.required_replicas(self.replication_factor);
                if live < required {
                    return Err(TransientFailure::unavailable(serial, required, live));
                }
            }
        }

        Ok(self.faults.next(statement.kind))
    }

    /// Turn an injected fault into what the failure callback reports
    ///
    /// Left to itself the cluster reports the level the execution was
    /// issued at, except for timed-out conditional updates, which report
    /// the serial level of their paxos round.
    fn failure_for(
        &self,
        fault: &InjectedFault,
        statement: &Statement,
        level: ConsistencyLevel,
    ) -> TransientFailure {
        let natural = match (fault.kind, statement.kind) {
            (FailureKind::WriteTimeout, StatementKind::Cas) => {
                statement.serial_consistency.unwrap_or(level)
            }
            _ => level,
        };
        let reported = fault.reported.unwrap_or(natural);
        let required = reported.required_replicas(self.replication_factor);
        let received = required.saturating_sub(1);

        match fault.kind {
            FailureKind::ReadTimeout => TransientFailure::read_timeout(reported, required, received),
            FailureKind::WriteTimeout => {
                let write_type = if statement.kind == StatementKind::Cas {
                    WriteType::Cas
                } else {
                    WriteType::Simple
                };
                TransientFailure::write_timeout(reported, write_type, required, received)
            }
            FailureKind::Unavailable => {
                TransientFailure::unavailable(reported, required, self.live_replicas())
            }
        }
    }

    fn record_issue(&self, statement: &Statement, level: ConsistencyLevel, attempt: u32) {
        self.executions.fetch_add(1, Ordering::Relaxed);
        if self.issue_log_capacity == 0 {
            return;
        }
        let mut issued = self.issued.lock();
        if issued.len() == self.issue_log_capacity {
            issued.pop_front();
        }
        issued.push_back(IssuedStatement {
            kind: statement.kind,
            configured: statement.consistency,
            consistency: level,
            serial_consistency: statement.serial_consistency,
            attempt,
        });
    }
}

impl Default for SimulatedCluster {
    fn default() -> Self {
        Self::new(ClusterConfig::default())
    }
}

impl fmt::Debug for SimulatedCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedCluster")
            .field("contact_point", &self.contact_point)
            .field("replication_factor", &self.replication_factor)
            .field("live_replicas", &self.live_replicas())
            .field("rows", &self.rows.len())
            .field("executions", &self.executions())
            .finish()
    }
}
