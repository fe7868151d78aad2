//! Retry policies
//!
//! A session consults its retry policy every time the store reports a
//! transient failure. The policy sees the statement, the failure and how
//! many retries the current operation has already used, and either picks a
//! consistency level for the next try or rethrows.
//!
//! ## Retry bound
//!
//! Both policies allow at most [`MAX_RETRIES`] retries per operation. The
//! failure that arrives when `retries == MAX_RETRIES` is rethrown, so the
//! fourth transient failure of an operation always reaches the caller.
//!
//! ## Variants
//!
//! | Policy | Retries at |
//! |--------|-----------|
//! | [`StatementLevelRetry`] | the statement's configured level |
//! | [`CallbackLevelRetry`] | the level the failure callback reported |
//!
//! The callback level of a timed-out conditional update is the serial
//! level, not the statement's level. [`CallbackLevelRetry`] therefore
//! reissues a QUORUM conditional update at SERIAL. It is kept as-is so the
//! mismatch can be reproduced.

use crate::statement::Statement;
use casrace_core::{ConsistencyLevel, FailureKind, TransientFailure};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

/// Retries allowed per operation before a failure is rethrown
pub const MAX_RETRIES: u32 = 3;

/// Environment variable consulted by [`RetryPolicyKind::from_env`]
pub const RETRY_POLICY_ENV: &str = "CASRACE_RETRY_POLICY";

/// What to do with a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Reissue the statement at this level
    Retry(ConsistencyLevel),
    /// Surface the failure to the caller
    Rethrow,
}

/// Bounded retry decision policy
///
/// Implementations must rethrow once `retries` reaches [`MAX_RETRIES`].
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Policy name for logs
    fn name(&self) -> &'static str;

    /// A read did not gather enough replica responses in time
    fn on_read_timeout(
        &self,
        statement: &Statement,
        failure: &TransientFailure,
        retries: u32,
    ) -> RetryDecision;

    /// A write did not gather enough acknowledgements in time
    fn on_write_timeout(
        &self,
        statement: &Statement,
        failure: &TransientFailure,
        retries: u32,
    ) -> RetryDecision;

    /// Not enough replicas were alive to attempt the request
    fn on_unavailable(
        &self,
        statement: &Statement,
        failure: &TransientFailure,
        retries: u32,
    ) -> RetryDecision;

    /// Dispatch on the failure class
    fn decide(
        &self,
        statement: &Statement,
        failure: &TransientFailure,
        retries: u32,
    ) -> RetryDecision {
        match failure.kind {
            FailureKind::ReadTimeout => self.on_read_timeout(statement, failure, retries),
            FailureKind::WriteTimeout => self.on_write_timeout(statement, failure, retries),
            FailureKind::Unavailable => self.on_unavailable(statement, failure, retries),
        }
    }
}

fn retry_at(level: ConsistencyLevel, retries: u32) -> RetryDecision {
    if retries >= MAX_RETRIES {
        RetryDecision::Rethrow
    } else {
        RetryDecision::Retry(level)
    }
}

fn log_write_timeout(policy: &'static str, statement: &Statement, failure: &TransientFailure, retries: u32) {
    info!(
        policy,
        statement = %statement.kind,
        statement_cl = %statement.consistency,
        callback_cl = %failure.reported,
        retries,
        "write timeout"
    );
}

/// Retries at the statement's own configured level
///
/// The level reported by the failure callback is ignored, so the caller's
/// consistency contract holds across retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatementLevelRetry;

impl RetryPolicy for StatementLevelRetry {
    fn name(&self) -> &'static str {
        "statement-level"
    }

    fn on_read_timeout(&self, statement: &Statement, _failure: &TransientFailure, retries: u32) -> RetryDecision {
        retry_at(statement.consistency, retries)
    }

    fn on_write_timeout(&self, statement: &Statement, failure: &TransientFailure, retries: u32) -> RetryDecision {
        log_write_timeout(self.name(), statement, failure, retries);
        retry_at(statement.consistency, retries)
    }

    fn on_unavailable(&self, statement: &Statement, _failure: &TransientFailure, retries: u32) -> RetryDecision {
        retry_at(statement.consistency, retries)
    }
}

/// Retries at whatever level the failure callback reported
///
/// Follows the driver documentation literally. When the callback level
/// differs from the statement level the retry silently runs at a different
/// consistency than the one the statement was prepared with.
#[derive(Debug, Clone, Copy, Default)]
pub struct CallbackLevelRetry;

impl RetryPolicy for CallbackLevelRetry {
    fn name(&self) -> &'static str {
        "callback-level"
    }

    fn on_read_timeout(&self, _statement: &Statement, failure: &TransientFailure, retries: u32) -> RetryDecision {
        retry_at(failure.reported, retries)
    }

    fn on_write_timeout(&self, statement: &Statement, failure: &TransientFailure, retries: u32) -> RetryDecision {
        log_write_timeout(self.name(), statement, failure, retries);
        retry_at(failure.reported, retries)
    }

    fn on_unavailable(&self, _statement: &Statement, failure: &TransientFailure, retries: u32) -> RetryDecision {
        retry_at(failure.reported, retries)
    }
}

/// Startup-time choice between the two policies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetryPolicyKind {
    /// [`StatementLevelRetry`]
    #[default]
    StatementLevel,
    /// [`CallbackLevelRetry`] (broken on purpose)
    CallbackLevel,
}

impl RetryPolicyKind {
    /// Read the choice from [`RETRY_POLICY_ENV`], defaulting to statement level
    ///
    /// Unrecognised values fall back to the default.
    pub fn from_env() -> Self {
        std::env::var(RETRY_POLICY_ENV)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }

    /// Build the policy value
    pub fn build(&self) -> Arc<dyn RetryPolicy> {
        match self {
            RetryPolicyKind::StatementLevel => Arc::new(StatementLevelRetry),
            RetryPolicyKind::CallbackLevel => Arc::new(CallbackLevelRetry),
        }
    }

    /// Whether this is the deliberately broken variant
    pub fn is_broken(&self) -> bool {
        matches!(self, RetryPolicyKind::CallbackLevel)
    }
}

impl fmt::Display for RetryPolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RetryPolicyKind::StatementLevel => f.write_str("statement"),
            RetryPolicyKind::CallbackLevel => f.write_str("callback"),
        }
    }
}

impl FromStr for RetryPolicyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "statement" | "three" | "statement-level" => Ok(RetryPolicyKind::StatementLevel),
            "callback" | "documented" | "callback-level" => Ok(RetryPolicyKind::CallbackLevel),
            other => Err(format!("unknown retry policy: {}", other)),
        }
    }
}
