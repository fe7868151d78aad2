//! Convenient imports for casrace.
//!
//! ```ignore
//! use casrace::prelude::*;
//!
//! let harness = CasRace::simulated()?;
//! harness.create()?;
//! ```

// Main entry point
pub use crate::harness::{CasRace, CasRaceBuilder};

// Error handling
pub use crate::error::{Error, Result};

// Core types
pub use crate::types::{CasOutcome, RecordId, Revision, WorkerIdentity};

// Store configuration
pub use crate::types::{RetryPolicyKind, RevisionStore};

// Race configuration
pub use crate::types::{OutputFormat, RaceConfig, RaceReport, StopCondition};

pub use std::time::Duration;
