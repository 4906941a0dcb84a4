//! Fault scenario and injection result types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Kinds of synthetic failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FaultType {
    /// Request never answers within its timeout.
    NetworkTimeout,
    /// Payload fails validation.
    InvalidData,
    /// Upstream API answers with a 4xx/5xx status.
    ApiError,
    /// Credentials expired or rejected.
    AuthFailure,
    /// Memory, quota or rate limit exhausted.
    ResourceExhaustion,
    /// Payload silently corrupted.
    DataCorruption,
    /// Failure propagated from an upstream dependency.
    CascadingFailure,
    /// Transient failure that usually clears on retry.
    IntermittentFailure,
    /// Response arrives, but late.
    SlowResponse,
    /// Only part of the expected payload arrives.
    PartialData,
}

impl FaultType {
    /// All fault types.
    pub const ALL: [Self; 10] = [
        Self::NetworkTimeout,
        Self::InvalidData,
        Self::ApiError,
        Self::AuthFailure,
        Self::ResourceExhaustion,
        Self::DataCorruption,
        Self::CascadingFailure,
        Self::IntermittentFailure,
        Self::SlowResponse,
        Self::PartialData,
    ];

    /// Returns the wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkTimeout => "network_timeout",
            Self::InvalidData => "invalid_data",
            Self::ApiError => "api_error",
            Self::AuthFailure => "auth_failure",
            Self::ResourceExhaustion => "resource_exhaustion",
            Self::DataCorruption => "data_corruption",
            Self::CascadingFailure => "cascading_failure",
            Self::IntermittentFailure => "intermittent_failure",
            Self::SlowResponse => "slow_response",
            Self::PartialData => "partial_data",
        }
    }

    /// Static severity of this fault type.
    #[must_use]
    pub const fn impact(self) -> Impact {
        match self {
            Self::CascadingFailure | Self::ResourceExhaustion | Self::DataCorruption => {
                Impact::Critical
            }
            Self::ApiError | Self::AuthFailure | Self::NetworkTimeout | Self::InvalidData => {
                Impact::Major
            }
            Self::SlowResponse | Self::PartialData | Self::IntermittentFailure => Impact::Minor,
        }
    }

    /// Probability that a single recovery attempt succeeds.
    #[must_use]
    pub const fn recovery_rate(self) -> f64 {
        match self {
            Self::SlowResponse => 1.0,
            Self::IntermittentFailure => 0.9,
            Self::NetworkTimeout => 0.8,
            Self::ApiError => 0.7,
            Self::PartialData => 0.6,
            Self::AuthFailure => 0.5,
            Self::ResourceExhaustion => 0.4,
            Self::InvalidData => 0.3,
            Self::CascadingFailure => 0.2,
            Self::DataCorruption => 0.1,
        }
    }
}

impl fmt::Display for FaultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of node execution a fault is checked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultTiming {
    /// Before the node runs; a fired fault skips the node.
    Before,
    /// While the node runs; a fired fault replaces its output.
    During,
    /// After the node produced output.
    After,
}

impl fmt::Display for FaultTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Before => f.write_str("before"),
            Self::During => f.write_str("during"),
            Self::After => f.write_str("after"),
        }
    }
}

/// Severity of an injected fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    /// Nothing was injected.
    None,
    /// Degraded, but output still usable.
    Minor,
    /// Node failed.
    Major,
    /// Failure likely to take down dependants.
    Critical,
}

/// A configured chance of injecting one fault at one node and phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultScenario {
    /// Scenario identifier.
    pub id: String,
    /// Template or display name.
    #[serde(default)]
    pub name: String,
    /// Node the fault is bound to.
    pub node_id: String,
    /// Kind of fault.
    pub fault_type: FaultType,
    /// Firing probability in `[0, 1]`.
    pub probability: f64,
    /// Phase the fault is checked in.
    pub timing: FaultTiming,
    /// Fault-specific parameters (`delayMs`, `statusCode`, ...).
    #[serde(default)]
    pub parameters: Map<String, Value>,
    /// Disabled scenarios never fire.
    pub enabled: bool,
    /// How long the fault condition lasts, if bounded.
    #[serde(
        default,
        rename = "duration",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration_ms: Option<u64>,
}

impl FaultScenario {
    /// Creates an enabled scenario that always fires during execution.
    #[must_use]
    pub fn new(node_id: impl Into<String>, fault_type: FaultType) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: fault_type.as_str().to_string(),
            node_id: node_id.into(),
            fault_type,
            probability: 1.0,
            timing: FaultTiming::During,
            parameters: Map::new(),
            enabled: true,
            duration_ms: None,
        }
    }

    /// Sets the probability, clamped to `[0, 1]`.
    #[must_use]
    pub fn with_probability(mut self, probability: f64) -> Self {
        self.probability = clamp_probability(probability);
        self
    }

    /// Sets the timing phase.
    #[must_use]
    pub const fn with_timing(mut self, timing: FaultTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Sets a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: Value) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Disables the scenario.
    #[must_use]
    pub const fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Reads an unsigned integer parameter.
    #[must_use]
    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.parameters.get(key).and_then(Value::as_u64)
    }

    /// Reads a string parameter.
    #[must_use]
    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(Value::as_str)
    }
}

/// Clamps a probability to `[0, 1]`; NaN becomes 0.
#[must_use]
pub fn clamp_probability(p: f64) -> f64 {
    if p.is_nan() {
        0.0
    } else {
        p.clamp(0.0, 1.0)
    }
}

/// Where and how an injection check happens.
#[derive(Debug, Clone, PartialEq)]
pub struct InjectionContext {
    /// Node being executed.
    pub node_id: String,
    /// Phase being checked.
    pub timing: FaultTiming,
    /// Deterministic runs never consult the random source.
    pub deterministic: bool,
    /// Per-run chaos level; falls back to the engine config.
    pub chaos_level: Option<f64>,
}

impl InjectionContext {
    /// Creates a deterministic context without chaos.
    #[must_use]
    pub fn new(node_id: impl Into<String>, timing: FaultTiming) -> Self {
        Self {
            node_id: node_id.into(),
            timing,
            deterministic: true,
            chaos_level: None,
        }
    }

    /// Sets determinism.
    #[must_use]
    pub const fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = deterministic;
        self
    }

    /// Sets the chaos level.
    #[must_use]
    pub const fn with_chaos(mut self, level: Option<f64>) -> Self {
        self.chaos_level = level;
        self
    }
}

/// Outcome of one injection check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultInjectionResult {
    /// Scenario that was checked.
    pub fault_id: String,
    /// Node the check ran on.
    pub node_id: String,
    /// Kind of fault.
    pub fault_type: FaultType,
    /// Whether the fault fired.
    pub injected: bool,
    /// Phase of the check.
    pub timing: FaultTiming,
    /// Severity; `none` when not injected.
    pub impact: Impact,
    /// Synthesized error message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Whether the simulated recovery succeeded.
    pub recovered: bool,
    /// Time spent in the recovery attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recovery_time_ms: Option<f64>,
    /// Configured latency the fault represents (not the capped sleep).
    #[serde(default)]
    pub latency_ms: u64,
}

impl FaultInjectionResult {
    /// Result for a check that did not fire.
    #[must_use]
    pub fn not_injected(scenario: &FaultScenario, timing: FaultTiming) -> Self {
        Self {
            fault_id: scenario.id.clone(),
            node_id: scenario.node_id.clone(),
            fault_type: scenario.fault_type,
            injected: false,
            timing,
            impact: Impact::None,
            error: None,
            recovered: false,
            recovery_time_ms: None,
            latency_ms: 0,
        }
    }

    /// Returns true if the fault fired and was not recovered.
    #[must_use]
    pub const fn is_unrecovered(&self) -> bool {
        self.injected && !self.recovered
    }
}

/// Aggregated injection history for one scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FaultStatistics {
    /// Scenario the statistics describe.
    pub scenario_id: String,
    /// Number of times the fault fired.
    pub total_injections: usize,
    /// Number of fired faults that recovered.
    pub recovered: usize,
    /// `recovered / total_injections`, 0 when nothing fired.
    pub recovery_rate: f64,
    /// Mean recovery attempt time over recovered faults.
    pub avg_recovery_time_ms: f64,
    /// Count of fired faults per impact level.
    pub impact_distribution: BTreeMap<Impact, usize>,
}
