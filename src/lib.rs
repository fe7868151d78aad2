//! # casrace
//!
//! Reproduces lost-update races on a replicated store's compare-and-swap.
//!
//! N workers race to advance one record's revision from its current value
//! to a target, each through a read → conditional update → re-read loop.
//! Every attempt is reported to a single collector, which prints them in
//! arrival order. With a correct store and retry policy every revision is
//! committed exactly once.
//!
//! ## Quick Start
//!
//! ```ignore
//! use casrace::prelude::*;
//!
//! let harness = CasRace::builder()
//!     .retry_policy(RetryPolicyKind::StatementLevel)
//!     .open()?;
//!
//! harness.create()?;
//! let (report, _) = harness.race(&RaceConfig::new(5, Duration::ZERO, 10), std::io::stdout())?;
//! assert_eq!(report.successes(), 10);
//! ```
//!
//! ## Retry policies
//!
//! - [`RetryPolicyKind::StatementLevel`] retries at the statement's own
//!   consistency level
//! - [`RetryPolicyKind::CallbackLevel`] retries at whatever level the failure
//!   callback reports, which for a timed-out conditional update is SERIAL
//!
//! Both give up after three retries.

#![warn(missing_docs)]

mod error;
mod harness;
mod types;

pub mod prelude;

// Re-export main entry points
pub use error::{Error, Result};
pub use harness::{CasRace, CasRaceBuilder};

// Re-export types
pub use types::*;
