//! Simulation result types.

use crate::config::SimulationConfig;
use chrono::{DateTime, Utc};
use replica_faults::FaultInjectionResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use xxhash_rust::xxh64::xxh64;

/// Outcome of simulating one node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulatedNodeResult {
    /// Node that ran.
    pub node_id: String,
    /// Node type.
    pub node_type: String,
    /// Input the node received.
    pub input: Value,
    /// Generated output; `None` when the node errored or was skipped.
    pub output: Option<Value>,
    /// Error message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Synthetic duration after time compression.
    pub duration_ms: f64,
    /// Faults that fired on this node.
    #[serde(default)]
    pub faults_injected: Vec<FaultInjectionResult>,
}

impl SimulatedNodeResult {
    /// Returns true if the node errored.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Overall status of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationStatus {
    /// No node errored.
    Success,
    /// At least one node errored.
    Failed,
}

/// Aggregate counters for one simulation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationMetrics {
    /// Nodes in the graph.
    pub total_nodes: usize,
    /// Nodes that produced a result.
    pub nodes_executed: usize,
    /// Nodes that errored.
    pub nodes_failed: usize,
    /// Nodes never reached because execution halted.
    pub nodes_skipped: usize,
    /// Faults that fired.
    pub faults_injected: usize,
    /// Fired faults that recovered.
    pub faults_recovered: usize,
    /// Mean node duration.
    pub avg_node_duration_ms: f64,
    /// Slowest node duration.
    pub max_node_duration_ms: f64,
}

impl SimulationMetrics {
    /// Computes metrics from node results.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_nodes(total_nodes: usize, nodes: &[SimulatedNodeResult]) -> Self {
        let total: f64 = nodes.iter().map(|n| n.duration_ms).sum();
        let fired = nodes.iter().flat_map(|n| &n.faults_injected);

        Self {
            total_nodes,
            nodes_executed: nodes.len(),
            nodes_failed: nodes.iter().filter(|n| n.is_error()).count(),
            nodes_skipped: total_nodes.saturating_sub(nodes.len()),
            faults_injected: fired.clone().count(),
            faults_recovered: fired.filter(|f| f.recovered).count(),
            avg_node_duration_ms: if nodes.is_empty() {
                0.0
            } else {
                total / nodes.len() as f64
            },
            max_node_duration_ms: nodes.iter().map(|n| n.duration_ms).fold(0.0, f64::max),
        }
    }
}

/// Result of one simulation. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Simulation identifier.
    pub id: String,
    /// Twin that was simulated.
    pub twin_id: String,
    /// Simulation input.
    pub input: Value,
    /// Output of the last node that produced one.
    pub output: Value,
    /// First node error, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Overall status.
    pub status: SimulationStatus,
    /// Sum of node durations.
    pub duration_ms: f64,
    /// Per-node results in execution order.
    pub node_results: Vec<SimulatedNodeResult>,
    /// Aggregate counters.
    pub metrics: SimulationMetrics,
    /// Configuration the simulation ran with.
    pub config: SimulationConfig,
    /// When the simulation finished.
    pub timestamp: DateTime<Utc>,
}

impl SimulationResult {
    /// Returns true if the simulation succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self.status, SimulationStatus::Success)
    }

    /// Hash of the serialized output; equal outputs hash equal.
    #[must_use]
    pub fn fingerprint(&self) -> u64 {
        let bytes = serde_json::to_vec(&self.output).unwrap_or_default();
        xxh64(&bytes, 0)
    }

    /// Looks up the result of one node.
    #[must_use]
    pub fn node(&self, node_id: &str) -> Option<&SimulatedNodeResult> {
        self.node_results.iter().find(|n| n.node_id == node_id)
    }
}
