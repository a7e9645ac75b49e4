//! Error types for the federation core
//!
//! This module defines all error conditions used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! One variant deserves a note: [`CoreError::EmptyIntersection`] is an
//! algebra-level signal, not a system failure. Intersecting two filters whose
//! constraints provably match nothing raises it so callers can short-circuit
//! to an empty result without dispatching to storage.

use thiserror::Error;

/// Result type alias for federation operations
pub type Result<T> = std::result::Result<T, CoreError>;

/// Error conditions raised by the codec, filter algebra, store engines and registry
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed scope/local value or filter construction input
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Filter intersection is provably empty; callers treat this as "no results"
    #[error("Empty filter intersection")]
    EmptyIntersection,

    /// Duplicate identity, e.g. a UID already owned by a different scope
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Mutating call on a read-only store or registry
    #[error("Read-only violation: {0}")]
    ReadOnly(String),

    /// Record carries a version tag with no registered decoder
    #[error("Unknown record version: {0}")]
    UnknownVersion(u32),

    /// Malformed record envelope or payload
    #[error("Decode error: {0}")]
    Decode(String),

    /// Underlying store raised an internal error during dispatch
    #[error("Backend failure in '{store}': {message}")]
    Backend {
        /// Label of the failing store
        store: String,
        /// Underlying error description
        message: String,
    },

    /// Invariant violation: closed registry, exhausted scope space, unsorted backend stream
    #[error("Illegal state: {0}")]
    IllegalState(String),
}

impl From<bincode::Error> for CoreError {
    fn from(e: bincode::Error) -> Self {
        CoreError::Decode(e.to_string())
    }
}

impl CoreError {
    /// True when this is the algebra-level "matches nothing" signal
    pub fn is_empty_intersection(&self) -> bool {
        matches!(self, CoreError::EmptyIntersection)
    }
}
