//! Virtual workflow state.

use crate::comparison::ComparisonResult;
use crate::result::SimulationResult;
use chrono::{DateTime, Utc};
use replica_model::{BoundedStore, Workflow};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Number of recent comparison accuracies divergence is derived from.
pub const ACCURACY_WINDOW: usize = 10;

/// Snapshot of a twin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualWorkflow {
    /// Twin identifier.
    pub id: String,
    /// Workflow the twin was copied from.
    pub source_workflow_id: String,
    /// Deep copy of the source graph.
    pub workflow_graph: Workflow,
    /// Completed simulations.
    pub execution_count: u64,
    /// Drift from the real workflow, in `[0, 1]`.
    pub divergence: f64,
    /// Last sync with a real execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Mutable per-twin state, guarded by the twin's mutex.
#[derive(Debug)]
pub(crate) struct TwinState {
    pub execution_count: u64,
    pub divergence: f64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub history: BoundedStore<String, SimulationResult>,
    pub recent_accuracy: VecDeque<f64>,
}

impl TwinState {
    pub fn new(max_simulations: usize) -> Self {
        Self {
            execution_count: 0,
            divergence: 0.0,
            last_sync_at: None,
            history: BoundedStore::new(max_simulations),
            recent_accuracy: VecDeque::with_capacity(ACCURACY_WINDOW),
        }
    }

    /// Records a comparison outcome in the rolling window.
    pub fn record_accuracy(&mut self, comparison: &ComparisonResult) {
        if self.recent_accuracy.len() == ACCURACY_WINDOW {
            self.recent_accuracy.pop_front();
        }
        self.recent_accuracy.push_back(comparison.accuracy);
    }

    /// Divergence implied by the rolling window, if it has any samples.
    #[allow(clippy::cast_precision_loss)]
    pub fn windowed_divergence(&self) -> Option<f64> {
        if self.recent_accuracy.is_empty() {
            return None;
        }
        let mean = self.recent_accuracy.iter().sum::<f64>() / self.recent_accuracy.len() as f64;
        Some((1.0 - mean).clamp(0.0, 1.0))
    }
}
