//! Prepared statements
//!
//! A statement carries the consistency level it was prepared with. Retry
//! policies compare that configured level with the level a failure
//! callback reports, so it must travel with every execution.

use casrace_core::ConsistencyLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which of the three row statements is being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatementKind {
    /// `select id, revision, metadata, payload where id = ?`
    Select,
    /// `insert (id, revision, metadata, payload) values (?, ?, ?, ?)`
    Insert,
    /// `update set revision = ?, metadata = ?, payload = ? where id = ? if revision = ?`
    Cas,
}

impl StatementKind {
    /// Whether the statement writes
    pub fn is_write(&self) -> bool {
        !matches!(self, StatementKind::Select)
    }
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Cas => "cas",
        };
        f.write_str(s)
    }
}

/// A prepared statement and its configured consistency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    /// Statement shape
    pub kind: StatementKind,
    /// Regular consistency level
    pub consistency: ConsistencyLevel,
    /// Consistency of the linearizable check, if any
    pub serial_consistency: Option<ConsistencyLevel>,
}

impl Statement {
    /// Prepare a statement at `consistency` with no serial level
    pub fn new(kind: StatementKind, consistency: ConsistencyLevel) -> Self {
        Self {
            kind,
            consistency,
            serial_consistency: None,
        }
    }

    /// Set the serial consistency level
    pub fn with_serial(mut self, serial: ConsistencyLevel) -> Self {
        self.serial_consistency = Some(serial);
        self
    }
}

/// The statement set a session prepares on connect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedStatements {
    /// Linearizable read
    pub select: Statement,
    /// Plain insert
    pub insert: Statement,
    /// Conditional update
    pub cas: Statement,
}

impl Default for PreparedStatements {
    /// Reads and conditional updates at QUORUM with SERIAL; inserts at ONE.
    fn default() -> Self {
        Self {
            select: Statement::new(StatementKind::Select, ConsistencyLevel::Quorum)
                .with_serial(ConsistencyLevel::Serial),
            insert: Statement::new(StatementKind::Insert, ConsistencyLevel::One),
            cas: Statement::new(StatementKind::Cas, ConsistencyLevel::Quorum)
                .with_serial(ConsistencyLevel::Serial),
        }
    }
}
