//! Error types for twin operations.

use thiserror::Error;

/// Errors that can occur during twin operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No twin with this id exists.
    #[error("twin not found: {0}")]
    TwinNotFound(String),

    /// The twin has no stored simulation with this id.
    #[error("simulation '{simulation_id}' not found for twin '{twin_id}'")]
    SimulationNotFound {
        /// Twin that was searched.
        twin_id: String,
        /// Missing simulation id.
        simulation_id: String,
    },

    /// Simulation exceeded its configured timeout.
    #[error("simulation of twin '{twin_id}' timed out after {timeout_ms}ms")]
    Timeout {
        /// Twin being simulated.
        twin_id: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// Comparison is switched off in the twin configuration.
    #[error("comparison is disabled")]
    ComparisonDisabled,

    /// Simulation options are out of range.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    /// The twin's graph cannot be executed.
    #[error(transparent)]
    Graph(#[from] replica_model::Error),
}

/// Result type alias for twin operations.
pub type Result<T> = std::result::Result<T, Error>;
