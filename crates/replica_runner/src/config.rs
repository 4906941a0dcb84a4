//! Run parameters for each batch kind.

use crate::error::{Error, Result};
use replica_faults::{FaultScenario, FaultType};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Percentiles reported by a performance run when none are requested.
pub const DEFAULT_PERCENTILES: [f64; 3] = [50.0, 95.0, 99.0];

/// Shortest gap between two paced issues; faster rates are capped to it.
pub const MIN_ISSUE_INTERVAL: Duration = Duration::from_millis(1);

/// Converts a per-second rate into the gap between issues.
fn interval_for(rate: f64, field: &str) -> Result<Duration> {
    if !(rate > 0.0 && rate.is_finite()) {
        return Err(Error::InvalidConfig(format!("{field} must be > 0")));
    }
    Duration::try_from_secs_f64(rate.recip())
        .map(|every| every.max(MIN_ISSUE_INTERVAL))
        .map_err(|_| Error::InvalidConfig(format!("{field} {rate} is too low to schedule")))
}

/// Sustained load at a fixed issue rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestConfig {
    /// Ceiling on simulations in flight.
    pub concurrent_executions: usize,
    /// Issue rate.
    pub executions_per_second: f64,
    /// How long to keep issuing, in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Time over which the ceiling grows from one to its full value.
    #[serde(default, rename = "rampUpTime", skip_serializing_if = "Option::is_none")]
    pub ramp_up_ms: Option<u64>,
}

impl LoadTestConfig {
    /// Creates a load run without ramp-up.
    #[must_use]
    pub const fn new(concurrent_executions: usize, executions_per_second: f64, duration_ms: u64) -> Self {
        Self {
            concurrent_executions,
            executions_per_second,
            duration_ms,
            ramp_up_ms: None,
        }
    }

    /// Sets the ramp-up window.
    #[must_use]
    pub const fn with_ramp_up(mut self, ramp_up_ms: u64) -> Self {
        self.ramp_up_ms = Some(ramp_up_ms);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.concurrent_executions == 0 {
            return Err(Error::InvalidConfig("concurrentExecutions must be > 0".into()));
        }
        if self.concurrent_executions > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConfig(format!(
                "concurrentExecutions must be <= {}",
                Semaphore::MAX_PERMITS
            )));
        }
        self.issue_interval().map(|_| ())
    }

    pub(crate) fn issue_interval(&self) -> Result<Duration> {
        interval_for(self.executions_per_second, "executionsPerSecond")
    }
}

/// Escalating concurrency until a ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StressTestConfig {
    /// Highest concurrency to reach.
    pub max_concurrent: usize,
    /// Failure rate above which a wave counts as the breaking point.
    pub target_failure_rate: f64,
    /// Time budget spread across the waves, in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
}

impl StressTestConfig {
    /// Creates a stress run.
    #[must_use]
    pub const fn new(max_concurrent: usize, target_failure_rate: f64, duration_ms: u64) -> Self {
        Self {
            max_concurrent,
            target_failure_rate,
            duration_ms,
        }
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_concurrent == 0 {
            return Err(Error::InvalidConfig("maxConcurrent must be > 0".into()));
        }
        if self.max_concurrent > Semaphore::MAX_PERMITS {
            return Err(Error::InvalidConfig(format!(
                "maxConcurrent must be <= {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if !(0.0..=1.0).contains(&self.target_failure_rate) {
            return Err(Error::InvalidConfig("targetFailureRate must be in [0, 1]".into()));
        }
        Ok(())
    }

    /// Wave sizes: doubling from one, always ending at `max_concurrent`.
    pub(crate) fn waves(&self) -> Vec<usize> {
        let mut waves = Vec::new();
        let mut level = 1;
        while level < self.max_concurrent {
            waves.push(level);
            level *= 2;
        }
        waves.push(self.max_concurrent);
        waves
    }
}

/// Repeated non-deterministic runs with amplified fault probabilities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosTestConfig {
    /// Chaos multiplier applied to every fault probability.
    pub chaos_level: f64,
    /// Exact number of simulations.
    pub iterations: usize,
    /// Restrict the fault set to these types.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_types: Option<Vec<FaultType>>,
    /// Candidate fault scenarios.
    #[serde(default)]
    pub faults: Vec<FaultScenario>,
}

impl ChaosTestConfig {
    /// Creates a chaos run over the given faults.
    #[must_use]
    pub const fn new(chaos_level: f64, iterations: usize, faults: Vec<FaultScenario>) -> Self {
        Self {
            chaos_level,
            iterations,
            fault_types: None,
            faults,
        }
    }

    /// Restricts the fault set to the given types.
    #[must_use]
    pub fn with_fault_types(mut self, fault_types: Vec<FaultType>) -> Self {
        self.fault_types = Some(fault_types);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(self.chaos_level >= 0.0 && self.chaos_level.is_finite()) {
            return Err(Error::InvalidConfig("chaosLevel must be >= 0".into()));
        }
        Ok(())
    }

    /// Faults in effect after the type filter.
    pub(crate) fn effective_faults(&self) -> Vec<FaultScenario> {
        self.faults
            .iter()
            .filter(|f| {
                self.fault_types
                    .as_ref()
                    .map_or(true, |types| types.contains(&f.fault_type))
            })
            .cloned()
            .collect()
    }
}

/// Latency and throughput measurement against targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceTestConfig {
    /// p95 latency target in milliseconds.
    #[serde(rename = "targetLatency")]
    pub target_latency_ms: f64,
    /// Throughput target in simulations per second; also the issue rate.
    pub target_throughput: f64,
    /// Measurement window in milliseconds.
    #[serde(rename = "duration")]
    pub duration_ms: u64,
    /// Percentiles to report, as percentages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentiles: Option<Vec<f64>>,
}

impl PerformanceTestConfig {
    /// Creates a performance run.
    #[must_use]
    pub const fn new(target_latency_ms: f64, target_throughput: f64, duration_ms: u64) -> Self {
        Self {
            target_latency_ms,
            target_throughput,
            duration_ms,
            percentiles: None,
        }
    }

    /// Sets the reported percentiles.
    #[must_use]
    pub fn with_percentiles(mut self, percentiles: Vec<f64>) -> Self {
        self.percentiles = Some(percentiles);
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        self.issue_interval()?;
        if self.target_latency_ms < 0.0 {
            return Err(Error::InvalidConfig("targetLatency must be >= 0".into()));
        }
        if let Some(bad) = self
            .percentiles
            .iter()
            .flatten()
            .find(|p| !(0.0..=100.0).contains(*p))
        {
            return Err(Error::InvalidConfig(format!("percentile {bad} out of range")));
        }
        Ok(())
    }

    pub(crate) fn issue_interval(&self) -> Result<Duration> {
        interval_for(self.target_throughput, "targetThroughput")
    }

    /// One permit per targeted simulation per second.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub(crate) fn issue_ceiling(&self) -> usize {
        (self.target_throughput.ceil() as usize).clamp(1, Semaphore::MAX_PERMITS)
    }
}
