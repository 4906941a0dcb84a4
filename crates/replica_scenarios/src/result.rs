//! Scenario results, metrics and insights.

use crate::scenario::ScenarioType;
use chrono::{DateTime, Utc};
use replica_runner::{BatchItem, TargetsMet};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Verdict of a scenario run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioStatus {
    /// The scenario's pass rule held.
    Passed,
    /// Some executions failed but the scenario is not a hard failure.
    Partial,
    /// The pass rule did not hold, or the run itself failed.
    Failed,
}

/// Insight severity, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightSeverity {
    /// Informational.
    Info,
    /// Worth a look.
    Low,
    /// Should be addressed.
    Medium,
    /// Likely user-visible.
    High,
    /// Blocking.
    Critical,
}

impl fmt::Display for InsightSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Info => write!(f, "INFO"),
            Self::Low => write!(f, "LOW"),
            Self::Medium => write!(f, "MEDIUM"),
            Self::High => write!(f, "HIGH"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// A rule-based observation about a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insight {
    /// Severity.
    pub severity: InsightSeverity,
    /// Area the insight concerns (`reliability`, `latency`, ...).
    pub category: String,
    /// Human-readable message.
    pub message: String,
    /// Suggested remediation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Insight {
    /// Creates an insight without a suggestion.
    #[must_use]
    pub fn new(
        severity: InsightSeverity,
        category: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            category: category.into(),
            message: message.into(),
            suggestion: None,
        }
    }

    /// Adds a suggestion.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// Metrics reduced from a scenario's executions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioMetrics {
    /// Executions issued.
    pub total_executions: usize,
    /// Executions that succeeded.
    pub successful_executions: usize,
    /// Everything else.
    pub failed_executions: usize,
    /// Mean duration.
    pub avg_duration: f64,
    /// Shortest duration.
    pub min_duration: f64,
    /// Longest duration.
    pub max_duration: f64,
    /// 50th percentile duration.
    pub p50_duration: f64,
    /// 95th percentile duration.
    pub p95_duration: f64,
    /// 99th percentile duration.
    pub p99_duration: f64,
    /// Executions per second of summed duration.
    pub throughput: f64,
    /// `failed / total`.
    pub error_rate: f64,
    /// `successful / total`.
    pub fault_recovery_rate: f64,
}

/// Outcome of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    /// Run identifier.
    pub id: String,
    /// Scenario that ran.
    pub scenario_id: String,
    /// Scenario category.
    pub scenario_type: ScenarioType,
    /// Verdict.
    pub status: ScenarioStatus,
    /// Every execution, successful or not.
    pub executions: Vec<BatchItem>,
    /// Reduced metrics.
    pub metrics: ScenarioMetrics,
    /// Rule-based observations.
    pub insights: Vec<Insight>,
    /// Wall-clock duration of the run.
    pub duration_ms: f64,
    /// Stress runs: first concurrency whose failure rate exceeded the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaking_point: Option<usize>,
    /// Performance runs: target verdicts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets_met: Option<TargetsMet>,
    /// When the run finished.
    pub timestamp: DateTime<Utc>,
}

impl ScenarioResult {
    /// Returns true if the scenario passed.
    #[must_use]
    pub const fn is_passed(&self) -> bool {
        matches!(self.status, ScenarioStatus::Passed)
    }

    /// Returns the most severe insight, if any.
    #[must_use]
    pub fn worst_insight(&self) -> Option<&Insight> {
        self.insights.iter().max_by_key(|i| i.severity)
    }
}
