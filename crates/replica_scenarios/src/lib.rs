//! Test scenarios for Replica workflow twins.
//!
//! This crate provides:
//! - Scenario definitions for golden path, edge case, load, stress, chaos
//!   and performance runs
//! - Generated boundary inputs for edge-case scenarios
//! - Automatic fault attachment from the template catalog
//! - Execution against a temporary twin with per-type pass rules
//! - Metrics, severity-ranked insights and JSON report export
//!
//! # Example
//!
//! ```rust,ignore
//! use replica_scenarios::{ChaosParameters, ScenarioManager};
//!
//! let scenarios = ScenarioManager::new(runner);
//! let scenario = scenarios
//!     .create_chaos_test_scenario("checkout chaos", workflow, json!({}), ChaosParameters::new(0.5, 50))
//!     .await?;
//! let result = scenarios.execute_scenario(&scenario.id).await?;
//! println!("{:?}: recovery {:.0}%", result.status, result.metrics.fault_recovery_rate * 100.0);
//! ```

#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod analysis;
pub mod edge;
pub mod error;
pub mod manager;
pub mod result;
pub mod scenario;

pub use analysis::compute_metrics;
pub use edge::edge_case_inputs;
pub use error::{Error, Result};
pub use manager::{ScenarioManager, DEFAULT_CHAOS_TEMPLATES, STRESS_TEMPLATES};
pub use result::{Insight, InsightSeverity, ScenarioMetrics, ScenarioResult, ScenarioStatus};
pub use scenario::{
    BatchParameters, ChaosParameters, ScenarioKind, ScenarioType, TestScenario,
    DEFAULT_MAX_CONCURRENCY,
};
