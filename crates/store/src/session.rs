//! Store client session
//!
//! A [`Session`] prepares the row statements once, then runs every request
//! through its retry policy:
//!
//! ```text
//! level := statement.consistency; retries := 0
//! loop:
//!     execute at level
//!     ok                      -> return
//!     transient failure f     -> policy.decide(statement, f, retries)
//!         Retry(next)         -> level := next; retries += 1
//!         Rethrow             -> RetriesExhausted { f, retries }
//! ```
//!
//! For conditional updates an exhausted write timeout is not an error: it
//! becomes [`CasOutcome::WriteTimeout`], because the update may have landed.

use crate::cluster::SimulatedCluster;
use crate::retry::{RetryDecision, RetryPolicy, RetryPolicyKind};
use crate::statement::{PreparedStatements, Statement};
use crate::store::RevisionStore;
use casrace_core::{
    CasOutcome, ConsistencyLevel, FailureKind, Record, RecordId, Revision, StoreError,
    StoreResult, TransientFailure, DEFAULT_METADATA,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Unique identifier of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// A fresh random id
    pub fn new() -> Self {
        SessionId(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session settings, fixed at connect time
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Which retry policy the session runs statements under
    pub retry_policy: RetryPolicyKind,
    /// Statements and their consistency levels
    pub statements: PreparedStatements,
    /// Metadata column written with every revision
    pub metadata: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            retry_policy: RetryPolicyKind::default(),
            statements: PreparedStatements::default(),
            metadata: DEFAULT_METADATA.to_string(),
        }
    }
}

impl SessionConfig {
    /// Settings with the given retry policy and default statements
    pub fn with_retry_policy(retry_policy: RetryPolicyKind) -> Self {
        Self {
            retry_policy,
            ..Self::default()
        }
    }
}

/// A connection to the cluster that implements [`RevisionStore`]
pub struct Session {
    id: SessionId,
    cluster: Arc<SimulatedCluster>,
    policy: Arc<dyn RetryPolicy>,
    statements: PreparedStatements,
    metadata: String,
}

impl Session {
    /// Connect to `cluster` and prepare statements
    pub fn connect(cluster: Arc<SimulatedCluster>, config: SessionConfig) -> Self {
        Self::with_policy(cluster, config.retry_policy.build(), config.statements, config.metadata)
    }

    /// Connect with an explicit policy value
    pub fn with_policy(
        cluster: Arc<SimulatedCluster>,
        policy: Arc<dyn RetryPolicy>,
        statements: PreparedStatements,
        metadata: String,
    ) -> Self {
        let id = SessionId::new();
        info!(
            session = %id,
            contact_point = %cluster.contact_point(),
            policy = policy.name(),
            "session connected"
        );
        Self {
            id,
            cluster,
            policy,
            statements,
            metadata,
        }
    }

    /// Session id
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The cluster this session talks to
    pub fn cluster(&self) -> &Arc<SimulatedCluster> {
        &self.cluster
    }

    /// The retry policy in force
    pub fn retry_policy(&self) -> &dyn RetryPolicy {
        self.policy.as_ref()
    }

    /// Prepared statements
    pub fn statements(&self) -> &PreparedStatements {
        &self.statements
    }

    /// Run `op` under the retry policy
    ///
    /// `op` receives the level to issue at and the retry count.
    fn execute<T>(
        &self,
        statement: &Statement,
        mut op: impl FnMut(ConsistencyLevel, u32) -> Result<T, TransientFailure>,
    ) -> StoreResult<T> {
        let mut level = statement.consistency;
        let mut retries = 0u32;
        loop {
            match op(level, retries) {
                Ok(value) => return Ok(value),
                Err(failure) => match self.policy.decide(statement, &failure, retries) {
                    RetryDecision::Retry(next) => {
                        warn!(
                            session = %self.id,
                            statement = %statement.kind,
                            %failure,
                            retry = retries + 1,
                            level = %next,
                            "retrying"
                        );
                        level = next;
                        retries += 1;
                    }
                    RetryDecision::Rethrow => {
                        debug!(session = %self.id, statement = %statement.kind, %failure, retries, "rethrow");
                        return Err(StoreError::RetriesExhausted { failure, retries });
                    }
                },
            }
        }
    }

    fn record(&self, revision: Revision, payload: &[u8]) -> Record {
        Record::new(revision, self.metadata.clone(), payload)
    }
}

impl RevisionStore for Session {
    fn fetch(&self, id: &RecordId) -> StoreResult<Record> {
        let statement = self.statements.select;
        let row = self.execute(&statement, |level, attempt| {
            self.cluster.select(&statement, level, attempt, id)
        })?;
        row.ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    fn create(&self, id: &RecordId, revision: Revision, payload: &[u8]) -> StoreResult<bool> {
        let statement = self.statements.insert;
        let record = self.record(revision, payload);
        self.execute(&statement, |level, attempt| {
            self.cluster.insert(&statement, level, attempt, id, record.clone())
        })?;
        Ok(true)
    }

    fn compare_and_swap(
        &self,
        id: &RecordId,
        expected: Revision,
        new: Revision,
        payload: &[u8],
    ) -> StoreResult<CasOutcome> {
        let statement = self.statements.cas;
        let record = self.record(new, payload);
        let result = self.execute(&statement, |level, attempt| {
            self.cluster.cas(&statement, level, attempt, id, expected, record.clone())
        });
        match result {
            Ok(outcome) => Ok(outcome),
            Err(StoreError::RetriesExhausted { failure, .. })
                if failure.kind == FailureKind::WriteTimeout =>
            {
                Ok(CasOutcome::WriteTimeout)
            }
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("policy", &self.policy.name())
            .field("contact_point", self.cluster.contact_point())
            .finish()
    }
}
