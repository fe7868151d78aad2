//! JSON snapshots of a simulated cluster's rows
//!
//! Lets separate processes share one simulated cluster: each invocation
//! restores the rows, runs its command, and writes them back.

use crate::cluster::SimulatedCluster;
use casrace_core::{Record, RecordId, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Rows of a cluster at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Contact point of the cluster the rows came from
    pub contact_point: String,
    /// Rows by id
    pub rows: BTreeMap<RecordId, Record>,
}

impl Snapshot {
    /// Capture the cluster's current rows
    pub fn capture(cluster: &SimulatedCluster) -> Self {
        Self {
            contact_point: cluster.contact_point().to_string(),
            rows: cluster.rows(),
        }
    }

    /// Replace the cluster's rows with this snapshot's
    pub fn restore_into(self, cluster: &SimulatedCluster) {
        cluster.restore(self.rows);
    }

    /// Read a snapshot file; a missing file is an empty snapshot
    pub fn read_from(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Self::default());
        }
        let bytes = fs::read(path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| StoreError::Snapshot(format!("{}: {}", path.display(), e)))
    }

    /// Write the snapshot, replacing the file atomically
    pub fn write_to(&self, path: impl AsRef<Path>) -> StoreResult<()> {
        let path = path.as_ref();
        let json = serde_json::to_vec_pretty(self)
            .map_err(|e| StoreError::Snapshot(e.to_string()))?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, path)?;
        debug!("Wrote {} rows to {}", self.rows.len(), path.display());
        Ok(())
    }
}
