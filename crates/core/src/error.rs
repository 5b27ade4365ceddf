//! Error taxonomy for the transactional runtime.
//!
//! Conflicts are the normal, expected failure of optimistic execution; they
//! carry no payload and are cheap to construct on hot paths. Everything else
//! is a cold-path condition surfaced to the caller.

use thiserror::Error;

/// All runtime errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// The transaction observed a conflicting update and must restart.
    ///
    /// Never user-visible through the retry driver: the driver rolls the
    /// transaction back and re-executes it.
    #[error("transaction conflict")]
    Conflict,

    /// A per-transaction log exceeded its configured bound.
    ///
    /// Treated exactly like a conflict by the retry driver; the restart
    /// policy (back off, fall back, give up) belongs to the caller.
    #[error("{0} capacity exceeded")]
    Capacity(&'static str),

    /// The active algorithm cannot make this transaction irrevocable.
    #[error("irrevocability is not supported by {0}")]
    IrrevocableUnsupported(&'static str),

    /// No algorithm with this name is registered.
    #[error("unknown algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether rolling back and re-executing the transaction may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Conflict | Error::Capacity(_))
    }

    /// Whether this is a conflict abort.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict)
    }
}
