//! Error types for batch runs.

use thiserror::Error;

/// Errors that can occur while driving a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Batch parameters are out of range.
    #[error("invalid run config: {0}")]
    InvalidConfig(String),

    /// A pass-through simulation failed.
    #[error(transparent)]
    Twin(#[from] replica_twin::Error),
}

/// Result type alias for batch runs.
pub type Result<T> = std::result::Result<T, Error>;
