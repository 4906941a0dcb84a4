//! Test scenario definitions.

use chrono::{DateTime, Utc};
use replica_faults::{FaultScenario, FaultType};
use replica_model::Workflow;
use replica_runner::{LoadTestConfig, PerformanceTestConfig, StressTestConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Default fan-out ceiling for golden-path and edge-case scenarios.
pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

/// Scenario category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    /// Expected inputs, no faults.
    GoldenPath,
    /// Boundary and malformed inputs.
    EdgeCases,
    /// Sustained rate.
    LoadTesting,
    /// Escalating concurrency.
    StressTesting,
    /// Amplified random faults.
    ChaosTesting,
    /// Latency and throughput targets.
    PerformanceTesting,
}

impl ScenarioType {
    /// Returns the snake_case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GoldenPath => "golden_path",
            Self::EdgeCases => "edge_cases",
            Self::LoadTesting => "load_testing",
            Self::StressTesting => "stress_testing",
            Self::ChaosTesting => "chaos_testing",
            Self::PerformanceTesting => "performance_testing",
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fan-out ceiling for input-driven scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BatchParameters {
    /// Simulations in flight at once.
    pub max_concurrency: usize,
}

impl Default for BatchParameters {
    fn default() -> Self {
        Self {
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

/// Chaos run parameters. Faults come from the scenario itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosParameters {
    /// Probability amplification.
    pub chaos_level: f64,
    /// Number of simulations.
    pub iterations: usize,
    /// Fault types to keep.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fault_types: Option<Vec<FaultType>>,
}

impl ChaosParameters {
    /// Creates chaos parameters without a type filter.
    #[must_use]
    pub const fn new(chaos_level: f64, iterations: usize) -> Self {
        Self {
            chaos_level,
            iterations,
            fault_types: None,
        }
    }

    /// Restricts the run to the given fault types.
    #[must_use]
    pub fn with_fault_types(mut self, fault_types: Vec<FaultType>) -> Self {
        self.fault_types = Some(fault_types);
        self
    }
}

/// Scenario type together with its run parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "parameters", rename_all = "snake_case")]
pub enum ScenarioKind {
    /// Run every input once.
    GoldenPath(BatchParameters),
    /// Run every input, including generated edge inputs, once.
    EdgeCases(BatchParameters),
    /// Fixed-rate load.
    LoadTesting(LoadTestConfig),
    /// Doubling concurrency waves.
    StressTesting(StressTestConfig),
    /// Chaos-amplified iterations.
    ChaosTesting(ChaosParameters),
    /// Target-driven latency and throughput measurement.
    PerformanceTesting(PerformanceTestConfig),
}

impl ScenarioKind {
    /// Returns the scenario category.
    #[must_use]
    pub const fn scenario_type(&self) -> ScenarioType {
        match self {
            Self::GoldenPath(_) => ScenarioType::GoldenPath,
            Self::EdgeCases(_) => ScenarioType::EdgeCases,
            Self::LoadTesting(_) => ScenarioType::LoadTesting,
            Self::StressTesting(_) => ScenarioType::StressTesting,
            Self::ChaosTesting(_) => ScenarioType::ChaosTesting,
            Self::PerformanceTesting(_) => ScenarioType::PerformanceTesting,
        }
    }
}

/// A stored test scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestScenario {
    /// Scenario identifier.
    pub id: String,
    /// Display name.
    pub name: String,
    /// What the scenario exercises.
    #[serde(default)]
    pub description: String,
    /// Type and parameters.
    pub kind: ScenarioKind,
    /// Workflow under test.
    pub workflow: Workflow,
    /// Simulation inputs. Rate-driven scenarios use the first one.
    #[serde(default)]
    pub inputs: Vec<Value>,
    /// Faults applied to every simulation.
    #[serde(default)]
    pub faults: Vec<FaultScenario>,
    /// Disabled scenarios do not run.
    pub enabled: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl TestScenario {
    /// Creates an enabled scenario with no inputs or faults.
    #[must_use]
    pub fn new(name: impl Into<String>, workflow: Workflow, kind: ScenarioKind) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            description: String::new(),
            kind,
            workflow,
            inputs: Vec::new(),
            faults: Vec::new(),
            enabled: true,
            created_at: Utc::now(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the inputs.
    #[must_use]
    pub fn with_inputs(mut self, inputs: Vec<Value>) -> Self {
        self.inputs = inputs;
        self
    }

    /// Sets the faults.
    #[must_use]
    pub fn with_faults(mut self, faults: Vec<FaultScenario>) -> Self {
        self.faults = faults;
        self
    }

    /// Returns the scenario category.
    #[must_use]
    pub const fn scenario_type(&self) -> ScenarioType {
        self.kind.scenario_type()
    }

    /// Input for rate-driven runs: the first input, or an empty object.
    #[must_use]
    pub fn primary_input(&self) -> Value {
        self.inputs
            .first()
            .cloned()
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()))
    }
}
