//! Error types for scenario management.

use thiserror::Error;

/// Errors that can occur while managing or running scenarios.
#[derive(Debug, Error)]
pub enum Error {
    /// No scenario with this id exists.
    #[error("scenario not found: {0}")]
    ScenarioNotFound(String),

    /// The scenario is switched off.
    #[error("scenario '{0}' is disabled")]
    ScenarioDisabled(String),

    /// Report serialization failed.
    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A fault template could not be resolved.
    #[error(transparent)]
    Faults(#[from] replica_faults::Error),

    /// A twin operation failed.
    #[error(transparent)]
    Twin(#[from] replica_twin::Error),

    /// A batch run failed.
    #[error(transparent)]
    Runner(#[from] replica_runner::Error),
}

/// Result type alias for scenario operations.
pub type Result<T> = std::result::Result<T, Error>;
