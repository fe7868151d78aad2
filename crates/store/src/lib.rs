//! Store client layer for casrace
//!
//! This crate sits between the race engine and a replicated record store:
//! - [`RevisionStore`]: the read / create / compare-and-swap contract
//! - [`Statement`]: prepared statements with their configured consistency
//! - [`RetryPolicy`]: bounded retry decisions on transient failures
//! - [`Session`]: store client that runs statements under a retry policy
//! - [`SimulatedCluster`]: in-process replicated cluster with fault injection

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod fault;
pub mod retry;
pub mod session;
pub mod snapshot;
pub mod statement;
pub mod store;

pub use cluster::{ClusterConfig, ContactPoint, IssuedStatement, SimulatedCluster};
pub use fault::{FaultInjector, InjectedFault};
pub use retry::{
    CallbackLevelRetry, RetryDecision, RetryPolicy, RetryPolicyKind, StatementLevelRetry,
    MAX_RETRIES, RETRY_POLICY_ENV,
};
pub use session::{Session, SessionConfig, SessionId};
pub use snapshot::Snapshot;
pub use statement::{PreparedStatements, Statement, StatementKind};
pub use store::RevisionStore;
