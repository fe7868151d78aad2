//! Main entry point for casrace.
//!
//! This module provides the `CasRace` struct, which owns a simulated
//! cluster and a session against it and exposes every race operation.

use crate::error::{Error, Result};
use casrace_concurrency::{self as concurrency, OutputFormat, RaceConfig, RaceReport};
use casrace_core::{CasOutcome, Record, RecordId, Revision, StoreError, DEFAULT_PAYLOAD};
use casrace_store::{
    ClusterConfig, ContactPoint, RetryPolicyKind, RevisionStore, Session, SessionConfig,
    SimulatedCluster, Snapshot,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A CAS race harness.
///
/// Create one with [`CasRace::simulated`] or [`CasRace::builder`].
///
/// # Example
///
/// ```ignore
/// use casrace::prelude::*;
///
/// let harness = CasRace::builder()
///     .retry_policy(RetryPolicyKind::CallbackLevel)
///     .open()?;
///
/// harness.create()?;
/// let (report, _) = harness.race(&RaceConfig::new(5, Duration::ZERO, 10), std::io::stdout())?;
/// assert_eq!(report.successes(), 10);
/// ```
pub struct CasRace {
    cluster: Arc<SimulatedCluster>,
    session: Session,
    session_config: SessionConfig,
    record_id: RecordId,
    state: Option<PathBuf>,
}

impl CasRace {
    /// Open a harness on a default simulated cluster.
    ///
    /// Three replicas, all live, retry policy taken from the environment.
    pub fn simulated() -> Result<Self> {
        Self::builder().open()
    }

    /// Create a builder for harness configuration.
    pub fn builder() -> CasRaceBuilder {
        CasRaceBuilder::new()
    }

    /// The cluster every session of this harness talks to.
    pub fn cluster(&self) -> &Arc<SimulatedCluster> {
        &self.cluster
    }

    /// The shared session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The retry policy sessions are opened with.
    pub fn retry_policy(&self) -> RetryPolicyKind {
        self.session_config.retry_policy
    }

    /// The record raced on.
    pub fn record_id(&self) -> &RecordId {
        &self.record_id
    }

    /// Current revision of the record.
    pub fn read(&self) -> Result<Revision> {
        Ok(self.session.read(&self.record_id)?)
    }

    /// Current row of the record.
    pub fn fetch(&self) -> Result<Record> {
        Ok(self.session.fetch(&self.record_id)?)
    }

    /// Write the record at revision 0 with the default payload.
    ///
    /// A revision that has already advanced is kept.
    pub fn create(&self) -> Result<bool> {
        Ok(self.session.create(&self.record_id, 0, DEFAULT_PAYLOAD)?)
    }

    /// Read, then make one conditional update on the calling thread.
    ///
    /// Returns the revision read and the update's outcome.
    pub fn cas(&self) -> Result<(Revision, CasOutcome)> {
        let prev = self.read()?;
        let next = StoreError::next_revision(&self.record_id, prev)?;
        debug!(from = prev, to = next, "single cas");
        let outcome = self
            .session
            .compare_and_swap(&self.record_id, prev, next, DEFAULT_PAYLOAD)?;
        Ok((prev, outcome))
    }

    /// Read and make one conditional update, both on another thread.
    pub fn cas_thread(&self) -> Result<(Revision, CasOutcome)> {
        Ok(concurrency::cas_thread(&self.session, &self.record_id, DEFAULT_PAYLOAD)?)
    }

    /// Read on the calling thread, then make one conditional update on
    /// another thread.
    pub fn read_main_then_cas_thread(&self) -> Result<(Revision, CasOutcome)> {
        Ok(concurrency::read_main_then_cas_thread(
            &self.session,
            &self.record_id,
            DEFAULT_PAYLOAD,
        )?)
    }

    /// Drive the record to `target` with one worker on the calling thread.
    pub fn relay<W: Write + Send>(
        &self,
        target: Revision,
        startup_delay: Duration,
        format: OutputFormat,
        output: W,
    ) -> Result<(RaceReport, W)> {
        let config = self.race_config(&RaceConfig::new(1, startup_delay, target).format(format));
        Ok(concurrency::relay(&self.session, &config, output))
    }

    /// Race workers that share this harness's session.
    ///
    /// Creates the record first when it does not exist yet.
    pub fn race<W: Write + Send>(&self, config: &RaceConfig, output: W) -> Result<(RaceReport, W)> {
        let config = self.race_config(config);
        self.ensure_record()?;
        let session = &self.session;
        Ok(concurrency::race(&config, |_| Ok(session), output))
    }

    /// Race workers that each open their own session.
    ///
    /// Creates the record first when it does not exist yet.
    pub fn race_sessions<W: Write + Send>(
        &self,
        config: &RaceConfig,
        output: W,
    ) -> Result<(RaceReport, W)> {
        let config = self.race_config(config);
        self.ensure_record()?;
        Ok(concurrency::race(
            &config,
            |_| Ok(Session::connect(Arc::clone(&self.cluster), self.session_config.clone())),
            output,
        ))
    }

    /// Current revision, creating the record at 0 if it is missing.
    pub fn ensure_record(&self) -> Result<Revision> {
        match self.read() {
            Ok(revision) => Ok(revision),
            Err(e) if e.is_not_found() => {
                info!(record = %self.record_id, "record missing, creating");
                self.create()?;
                Ok(0)
            }
            Err(e) => Err(e),
        }
    }

    /// Write the cluster's rows to the state file, if one was configured.
    pub fn save_state(&self) -> Result<()> {
        if let Some(path) = &self.state {
            Snapshot::capture(&self.cluster).write_to(path)?;
        }
        Ok(())
    }

    /// The state file, if one was configured.
    pub fn state_file(&self) -> Option<&Path> {
        self.state.as_deref()
    }

    fn race_config(&self, config: &RaceConfig) -> RaceConfig {
        RaceConfig {
            record_id: self.record_id.clone(),
            ..config.clone()
        }
    }
}

impl std::fmt::Debug for CasRace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CasRace")
            .field("cluster", &self.cluster)
            .field("retry_policy", &self.session_config.retry_policy)
            .field("record_id", &self.record_id)
            .field("state", &self.state)
            .finish()
    }
}

/// Builder for harness configuration.
///
/// # Example
///
/// ```ignore
/// // Two of three replicas alive, one write in ten times out
/// let harness = CasRace::builder()
///     .contact_point("10.0.0.1", 9042)
///     .live_replicas(2)
///     .write_timeout_rate(0.1)
///     .open()?;
///
/// // Rows survive between processes
/// let harness = CasRace::builder()
///     .state_file("./cluster.json")
///     .open()?;
/// ```
#[derive(Debug, Clone)]
pub struct CasRaceBuilder {
    host: String,
    port: u16,
    replicas: usize,
    live_replicas: Option<usize>,
    retry_policy: Option<RetryPolicyKind>,
    write_timeout_rate: f64,
    record_id: RecordId,
    state: Option<PathBuf>,
}

impl CasRaceBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        let contact_point = ContactPoint::default();
        Self {
            host: contact_point.host,
            port: contact_point.port,
            replicas: ClusterConfig::default().replication_factor,
            live_replicas: None,
            retry_policy: None,
            write_timeout_rate: 0.0,
            record_id: RecordId::default(),
            state: None,
        }
    }

    /// Set the host and port sessions connect to.
    pub fn contact_point(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    /// Set the retry policy.
    ///
    /// Without this the policy is read from `CASRACE_RETRY_POLICY`.
    pub fn retry_policy(mut self, kind: RetryPolicyKind) -> Self {
        self.retry_policy = Some(kind);
        self
    }

    /// Set the replication factor.
    pub fn replicas(mut self, replicas: usize) -> Self {
        self.replicas = replicas;
        self
    }

    /// Set how many replicas are alive. Defaults to all of them.
    pub fn live_replicas(mut self, live: usize) -> Self {
        self.live_replicas = Some(live);
        self
    }

    /// Probability that an unscripted write times out.
    pub fn write_timeout_rate(mut self, rate: f64) -> Self {
        self.write_timeout_rate = rate;
        self
    }

    /// Race on a different record.
    pub fn record_id(mut self, id: impl Into<RecordId>) -> Self {
        self.record_id = id.into();
        self
    }

    /// Load rows from, and save them to, a JSON state file.
    pub fn state_file(mut self, path: impl AsRef<Path>) -> Self {
        self.state = Some(path.as_ref().to_path_buf());
        self
    }

    /// Open the harness.
    pub fn open(self) -> Result<CasRace> {
        if self.replicas == 0 {
            return Err(Error::InvalidArgument("replication factor must be at least 1".into()));
        }
        let contact_point = ContactPoint::new(self.host, self.port)?;
        let cluster = Arc::new(SimulatedCluster::new(ClusterConfig {
            contact_point,
            replication_factor: self.replicas,
            live_replicas: self.live_replicas.unwrap_or(self.replicas),
            ..ClusterConfig::default()
        }));
        cluster.faults().set_write_timeout_rate(self.write_timeout_rate);

        if let Some(path) = &self.state {
            let snapshot = Snapshot::read_from(path)?;
            let here = cluster.contact_point().to_string();
            if !snapshot.contact_point.is_empty() && snapshot.contact_point != here {
                warn!(
                    saved = %snapshot.contact_point,
                    current = %here,
                    "state file was written for a different contact point"
                );
            }
            snapshot.restore_into(&cluster);
        }

        let retry_policy = self.retry_policy.unwrap_or_else(RetryPolicyKind::from_env);
        if retry_policy.is_broken() {
            info!(policy = %retry_policy, "Using callback-level retry policy (broken)");
        } else {
            info!(policy = %retry_policy, "Using statement-level retry policy");
        }

        let session_config = SessionConfig::with_retry_policy(retry_policy);
        let session = Session::connect(Arc::clone(&cluster), session_config.clone());
        Ok(CasRace {
            cluster,
            session,
            session_config,
            record_id: self.record_id,
            state: self.state,
        })
    }
}

impl Default for CasRaceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
