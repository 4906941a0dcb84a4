//! Batch requests, per-request outcomes and their aggregate.

use replica_twin::{SimulationOptions, SimulationResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One simulation to run as part of a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRequest {
    /// Request identifier, echoed on the outcome.
    pub id: String,
    /// Twin to simulate.
    pub twin_id: String,
    /// Simulation input.
    pub input: Value,
    /// Per-run overrides.
    #[serde(default)]
    pub options: SimulationOptions,
}

impl SimulationRequest {
    /// Creates a request with a fresh id and default options.
    #[must_use]
    pub fn new(twin_id: impl Into<String>, input: Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            twin_id: twin_id.into(),
            input,
            options: SimulationOptions::default(),
        }
    }

    /// Sets the per-run overrides.
    #[must_use]
    pub fn with_options(mut self, options: SimulationOptions) -> Self {
        self.options = options;
        self
    }
}

/// Outcome of one request: a result, or the error that prevented one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchItem {
    /// Request this outcome belongs to.
    pub request_id: String,
    /// Simulation result, when the run completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<SimulationResult>,
    /// Why no result was produced (timeout, cancellation, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BatchItem {
    pub(crate) fn completed(request_id: String, result: SimulationResult) -> Self {
        Self {
            request_id,
            result: Some(result),
            error: None,
        }
    }

    pub(crate) fn errored(request_id: String, error: impl Into<String>) -> Self {
        Self {
            request_id,
            result: None,
            error: Some(error.into()),
        }
    }

    /// Returns true if the run completed and the simulation succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.as_ref().is_some_and(SimulationResult::is_success)
    }
}

/// Aggregate over a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchResult {
    /// Requests in the batch.
    pub total: usize,
    /// Requests whose simulation succeeded.
    pub successful: usize,
    /// Everything else.
    pub failed: usize,
    /// `successful / total`.
    pub success_rate: f64,
    /// Mean synthetic duration of completed runs.
    pub avg_duration_ms: f64,
    /// Shortest synthetic duration.
    pub min_duration_ms: f64,
    /// Longest synthetic duration.
    pub max_duration_ms: f64,
    /// Wall-clock time the batch took.
    pub wall_time_ms: f64,
    /// Requests per wall-clock second.
    pub throughput: f64,
}

impl BatchResult {
    /// Aggregates outcomes.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_items(items: &[BatchItem], wall_time_ms: f64) -> Self {
        let total = items.len();
        let successful = items.iter().filter(|i| i.is_success()).count();
        let durations: Vec<f64> = items
            .iter()
            .filter_map(|i| i.result.as_ref().map(|r| r.duration_ms))
            .collect();

        let (min, max, avg) = if durations.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            (
                durations.iter().copied().fold(f64::INFINITY, f64::min),
                durations.iter().copied().fold(0.0, f64::max),
                durations.iter().sum::<f64>() / durations.len() as f64,
            )
        };

        Self {
            total,
            successful,
            failed: total - successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64
            },
            avg_duration_ms: avg,
            min_duration_ms: min,
            max_duration_ms: max,
            wall_time_ms,
            throughput: if wall_time_ms > 0.0 {
                total as f64 / (wall_time_ms / 1000.0)
            } else {
                0.0
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errored_items_count_as_failures() {
        let items = vec![
            BatchItem::errored("a".into(), "timed out"),
            BatchItem::errored("b".into(), "cancelled"),
        ];
        let batch = BatchResult::from_items(&items, 500.0);
        assert_eq!(batch.total, 2);
        assert_eq!(batch.failed, 2);
        assert!(batch.success_rate.abs() < f64::EPSILON);
        assert!(batch.min_duration_ms.abs() < f64::EPSILON);
        assert!((batch.throughput - 4.0).abs() < 1e-9);
    }

    #[test]
    fn empty_batch_is_zeroed() {
        assert_eq!(BatchResult::from_items(&[], 0.0), BatchResult::default());
    }
}
