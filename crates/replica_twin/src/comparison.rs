//! Simulated-versus-real comparison.
//!
//! Three axes are checked: final output (strict equality), error presence,
//! and duration (flagged past one second of drift). Output and error
//! mismatches are critical; duration drift is minor.

use crate::result::SimulationResult;
use replica_model::WorkflowExecution;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Duration drift tolerated before a difference is reported.
pub const DURATION_TOLERANCE_MS: f64 = 1000.0;

/// Accuracy penalty per non-critical difference.
const MINOR_PENALTY: f64 = 0.1;

/// Accuracy ceiling when any critical difference exists.
const CRITICAL_CEILING: f64 = 0.5;

/// Severity of a single difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DifferenceSeverity {
    /// Behavioural mismatch.
    Critical,
    /// Timing drift.
    Minor,
}

/// One observed difference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Difference {
    /// Axis that differs (`output`, `error`, `duration`).
    pub field: String,
    /// Value from the simulation.
    pub simulated: Value,
    /// Value from the real execution.
    pub real: Value,
    /// Severity.
    pub severity: DifferenceSeverity,
    /// Human-readable description.
    pub description: String,
}

/// Classification of overall agreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonStatus {
    /// Accuracy at least 0.99.
    Identical,
    /// Accuracy at least 0.90.
    Similar,
    /// Accuracy at least 0.50.
    Different,
    /// Anything lower.
    Failed,
}

impl ComparisonStatus {
    /// Buckets an accuracy value.
    #[must_use]
    pub fn from_accuracy(accuracy: f64) -> Self {
        if accuracy >= 0.99 {
            Self::Identical
        } else if accuracy >= 0.90 {
            Self::Similar
        } else if accuracy >= 0.50 {
            Self::Different
        } else {
            Self::Failed
        }
    }
}

/// Result of comparing a simulation with a real execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonResult {
    /// Simulation that was compared.
    pub simulation_id: String,
    /// Real execution it was compared with.
    pub execution_id: String,
    /// Agreement in `[0, 1]`.
    pub accuracy: f64,
    /// Bucketed accuracy.
    pub status: ComparisonStatus,
    /// Individual differences.
    pub differences: Vec<Difference>,
}

/// Compares a stored simulation with a real execution record.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn compare_results(simulation: &SimulationResult, real: &WorkflowExecution) -> ComparisonResult {
    let mut differences = Vec::new();

    if simulation.output != real.output {
        differences.push(Difference {
            field: "output".to_string(),
            simulated: simulation.output.clone(),
            real: real.output.clone(),
            severity: DifferenceSeverity::Critical,
            description: "Final output differs from the real execution".to_string(),
        });
    }

    let real_ms = real.duration_ms() as f64;
    let delta = (simulation.duration_ms - real_ms).abs();
    if delta > DURATION_TOLERANCE_MS {
        differences.push(Difference {
            field: "duration".to_string(),
            simulated: json!(simulation.duration_ms),
            real: json!(real_ms),
            severity: DifferenceSeverity::Minor,
            description: format!("Duration differs by {delta:.0}ms"),
        });
    }

    if simulation.error.is_some() != real.error.is_some() {
        differences.push(Difference {
            field: "error".to_string(),
            simulated: json!(simulation.error),
            real: json!(real.error),
            severity: DifferenceSeverity::Critical,
            description: if simulation.error.is_some() {
                "Simulation failed but the real execution succeeded".to_string()
            } else {
                "Real execution failed but the simulation succeeded".to_string()
            },
        });
    }

    let accuracy = accuracy_of(&differences);
    ComparisonResult {
        simulation_id: simulation.id.clone(),
        execution_id: real.id.clone(),
        accuracy,
        status: ComparisonStatus::from_accuracy(accuracy),
        differences,
    }
}

#[allow(clippy::cast_precision_loss)]
fn accuracy_of(differences: &[Difference]) -> f64 {
    let minor = differences
        .iter()
        .filter(|d| d.severity != DifferenceSeverity::Critical)
        .count();
    let mut accuracy = MINOR_PENALTY.mul_add(-(minor as f64), 1.0);
    if differences
        .iter()
        .any(|d| d.severity == DifferenceSeverity::Critical)
    {
        accuracy = accuracy.min(CRITICAL_CEILING);
    }
    accuracy.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationMode, SimulationOptions};
    use crate::result::{SimulationMetrics, SimulationStatus};
    use chrono::{Duration, Utc};

    fn simulation(output: Value, error: Option<&str>, duration_ms: f64) -> SimulationResult {
        SimulationResult {
            id: "sim".into(),
            twin_id: "twin".into(),
            input: Value::Null,
            output,
            error: error.map(str::to_string),
            status: if error.is_some() {
                SimulationStatus::Failed
            } else {
                SimulationStatus::Success
            },
            duration_ms,
            node_results: Vec::new(),
            metrics: SimulationMetrics::default(),
            config: SimulationOptions::default()
                .resolve(SimulationMode::Isolated)
                .unwrap(),
            timestamp: Utc::now(),
        }
    }

    fn real(output: Value, error: Option<&str>, duration_ms: i64) -> WorkflowExecution {
        let start = Utc::now();
        WorkflowExecution {
            id: "exec".into(),
            workflow_id: "wf".into(),
            output,
            error: error.map(str::to_string),
            start_time: start,
            end_time: start + Duration::milliseconds(duration_ms),
        }
    }

    #[test]
    fn matching_execution_is_identical() {
        let cmp = compare_results(
            &simulation(json!({"a": 1}), None, 200.0),
            &real(json!({"a": 1}), None, 250),
        );
        assert_eq!(cmp.status, ComparisonStatus::Identical);
        assert!(cmp.accuracy >= 0.99);
        assert!(cmp.differences.is_empty());
    }

    #[test]
    fn duration_drift_is_minor() {
        let cmp = compare_results(
            &simulation(json!({"a": 1}), None, 100.0),
            &real(json!({"a": 1}), None, 1_500),
        );
        assert_eq!(cmp.differences.len(), 1);
        assert_eq!(cmp.differences[0].severity, DifferenceSeverity::Minor);
        assert!((cmp.accuracy - 0.9).abs() < 1e-9);
        assert_eq!(cmp.status, ComparisonStatus::Similar);
    }

    #[test]
    fn output_mismatch_caps_accuracy() {
        let cmp = compare_results(
            &simulation(json!({"a": 1}), None, 100.0),
            &real(json!({"a": 2}), None, 100),
        );
        assert!((cmp.accuracy - 0.5).abs() < 1e-9);
        assert_eq!(cmp.status, ComparisonStatus::Different);
    }

    #[test]
    fn error_mismatch_is_critical() {
        let cmp = compare_results(
            &simulation(json!(null), Some("boom"), 100.0),
            &real(json!(null), None, 5_000),
        );
        assert_eq!(cmp.differences.len(), 2);
        assert!(cmp
            .differences
            .iter()
            .any(|d| d.field == "error" && d.severity == DifferenceSeverity::Critical));
        // 1.0 - 0.1 for the duration, then capped at 0.5 for the error.
        assert!((cmp.accuracy - 0.5).abs() < 1e-9);
    }
}
