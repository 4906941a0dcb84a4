//! Reports returned by the specialised batch runs.

use crate::batch::{BatchItem, BatchResult};
use replica_model::DurationSummary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome of a load run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestResult {
    /// Every issued request.
    pub results: Vec<BatchItem>,
    /// `successes / total`.
    pub success_rate: f64,
    /// Most simulations observed in flight at once.
    pub peak_concurrency: usize,
    /// Aggregate.
    pub batch: BatchResult,
}

/// Failure rate observed at one concurrency level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressWave {
    /// Simulations issued together.
    pub concurrency: usize,
    /// Failed fraction of the wave.
    pub failure_rate: f64,
}

/// Outcome of a stress run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressTestResult {
    /// Every issued request, across all waves.
    pub results: Vec<BatchItem>,
    /// Per-wave failure rates in issue order.
    pub waves: Vec<StressWave>,
    /// Most simulations observed in flight at once.
    pub peak_concurrency: usize,
    /// First concurrency whose failure rate exceeded the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breaking_point: Option<usize>,
    /// Aggregate.
    pub batch: BatchResult,
}

/// Outcome of a chaos run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosTestResult {
    /// One entry per iteration.
    pub results: Vec<BatchItem>,
    /// Faults that fired across all iterations.
    pub faults_injected: usize,
    /// Fired faults that recovered.
    pub faults_recovered: usize,
    /// Aggregate.
    pub batch: BatchResult,
}

/// Whether a performance run met its targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetsMet {
    /// p95 latency at or below target.
    pub latency: bool,
    /// Throughput at or above target.
    pub throughput: bool,
}

impl TargetsMet {
    /// Returns true if both targets were met.
    #[must_use]
    pub const fn all(self) -> bool {
        self.latency && self.throughput
    }
}

/// Latency distribution and throughput of a performance run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    /// Synthetic latency distribution of completed runs.
    pub latency: DurationSummary,
    /// Requested percentiles keyed `p50`, `p95`, ...
    pub percentiles: BTreeMap<String, f64>,
    /// Completed runs per second of synthetic latency.
    pub throughput: f64,
    /// Target verdicts.
    pub targets_met: TargetsMet,
}

/// Outcome of a performance run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTestResult {
    /// Every issued request.
    pub results: Vec<BatchItem>,
    /// Aggregate.
    pub batch_result: BatchResult,
    /// Measurements against targets.
    pub performance_metrics: PerformanceMetrics,
}
