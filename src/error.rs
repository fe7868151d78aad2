//! Unified error type for casrace.
//!
//! Wraps the store and worker errors of the member crates behind one enum
//! so callers of the facade handle a single type.

use casrace_concurrency::WorkerError;
use casrace_core::StoreError;
use thiserror::Error;

/// All casrace errors.
#[derive(Debug, Error)]
pub enum Error {
    /// The store failed beyond what the retry policy absorbs
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A racing worker stopped early
    #[error(transparent)]
    Worker(#[from] WorkerError),

    /// Invalid argument or configuration
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for casrace operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Check if the store looked unreachable, as opposed to a lost race or a
    /// missing row.
    pub fn is_fatal(&self) -> bool {
        match self {
            Error::Store(e) => e.is_fatal(),
            Error::Worker(e) => e.is_fatal(),
            Error::InvalidArgument(_) | Error::Io(_) => false,
        }
    }

    /// Check if this is a not-found error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Store(e) => e.is_not_found(),
            Error::Worker(e) => e.store_error().map_or(false, StoreError::is_not_found),
            _ => false,
        }
    }
}
