//! Error types for fault engine operations.

use thiserror::Error;

/// Errors that can occur during fault engine operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// No template with this name exists in the catalog.
    #[error("fault template not found: {0}")]
    TemplateNotFound(String),

    /// No fault scenario with this id is registered.
    #[error("fault scenario not found: {0}")]
    ScenarioNotFound(String),
}

/// Result type alias for fault engine operations.
pub type Result<T> = std::result::Result<T, Error>;
