//! Consistency levels
//!
//! A consistency level says how many replicas must acknowledge a request
//! before the coordinator answers. Serial levels govern the linearizable
//! check of a conditional update, independently of the regular level.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Replica acknowledgement requirement for a statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConsistencyLevel {
    /// Any node, hints included
    Any,
    /// One replica
    One,
    /// Two replicas
    Two,
    /// Three replicas
    Three,
    /// A majority of replicas
    Quorum,
    /// Every replica
    All,
    /// A majority in the local datacenter
    LocalQuorum,
    /// A majority in each datacenter
    EachQuorum,
    /// One replica in the local datacenter
    LocalOne,
    /// Linearizable check across all datacenters
    Serial,
    /// Linearizable check in the local datacenter
    LocalSerial,
}

impl ConsistencyLevel {
    /// Canonical upper-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLevel::Any => "ANY",
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Two => "TWO",
            ConsistencyLevel::Three => "THREE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::All => "ALL",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::EachQuorum => "EACH_QUORUM",
            ConsistencyLevel::LocalOne => "LOCAL_ONE",
            ConsistencyLevel::Serial => "SERIAL",
            ConsistencyLevel::LocalSerial => "LOCAL_SERIAL",
        }
    }

    /// Whether this is a serial (linearizable) level
    pub fn is_serial(&self) -> bool {
        matches!(self, ConsistencyLevel::Serial | ConsistencyLevel::LocalSerial)
    }

    /// Replicas that must acknowledge for a given replication factor
    ///
    /// Single-datacenter view: local and each-datacenter variants resolve
    /// the same as their global counterparts.
    pub fn required_replicas(&self, replication_factor: usize) -> usize {
        let majority = replication_factor / 2 + 1;
        match self {
            ConsistencyLevel::Any => 0,
            ConsistencyLevel::One | ConsistencyLevel::LocalOne => 1,
            ConsistencyLevel::Two => 2,
            ConsistencyLevel::Three => 3,
            ConsistencyLevel::Quorum
            | ConsistencyLevel::LocalQuorum
            | ConsistencyLevel::EachQuorum
            | ConsistencyLevel::Serial
            | ConsistencyLevel::LocalSerial => majority,
            ConsistencyLevel::All => replication_factor,
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsistencyLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let level = match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "ANY" => ConsistencyLevel::Any,
            "ONE" => ConsistencyLevel::One,
            "TWO" => ConsistencyLevel::Two,
            "THREE" => ConsistencyLevel::Three,
            "QUORUM" => ConsistencyLevel::Quorum,
            "ALL" => ConsistencyLevel::All,
            "LOCAL_QUORUM" => ConsistencyLevel::LocalQuorum,
            "EACH_QUORUM" => ConsistencyLevel::EachQuorum,
            "LOCAL_ONE" => ConsistencyLevel::LocalOne,
            "SERIAL" => ConsistencyLevel::Serial,
            "LOCAL_SERIAL" => ConsistencyLevel::LocalSerial,
            other => return Err(format!("unknown consistency level: {}", other)),
        };
        Ok(level)
    }
}
