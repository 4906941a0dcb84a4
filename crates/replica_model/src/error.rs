//! Error types for workflow graph operations.

use thiserror::Error;

/// Errors that can occur while analysing a workflow graph.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Graph structure is malformed (duplicate ids, dangling edges).
    #[error("invalid graph: {0}")]
    InvalidGraph(String),

    /// No trigger or source node to start execution from.
    #[error("no start node found in workflow '{0}'")]
    NoStartNode(String),

    /// The graph contains a cycle reachable during traversal.
    #[error("cycle detected at node '{node_id}'")]
    CyclicGraph {
        /// A node that lies on (or behind) the cycle.
        node_id: String,
    },
}

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, Error>;
