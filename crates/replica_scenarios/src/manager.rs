//! Scenario registry and execution.

use crate::analysis::{self, PerformanceOutcome, RunOutcome};
use crate::edge::edge_case_inputs;
use crate::error::{Error, Result};
use crate::result::{Insight, InsightSeverity, ScenarioMetrics, ScenarioResult, ScenarioStatus};
use crate::scenario::{BatchParameters, ChaosParameters, ScenarioKind, TestScenario};
use chrono::{DateTime, Utc};
use replica_faults::{FaultOverrides, FaultScenario};
use replica_model::Workflow;
use replica_runner::{
    ChaosTestConfig, LoadTestConfig, PerformanceTestConfig, SimulationEngine, SimulationRequest,
    StressTestConfig,
};
use replica_twin::SimulationOptions;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Templates stress scenarios attach to every action node.
pub const STRESS_TEMPLATES: [&str; 2] = ["slow_response", "rate_limit_exceeded"];

/// Templates chaos scenarios attach when no fault types are given.
pub const DEFAULT_CHAOS_TEMPLATES: [&str; 4] = [
    "network_timeout",
    "api_error_5xx",
    "intermittent_failure",
    "slow_response",
];

/// Exported report for one scenario.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ScenarioReport<'a> {
    scenario: &'a TestScenario,
    results: &'a [ScenarioResult],
    generated_at: DateTime<Utc>,
}

/// Stores scenarios, runs them through the batch runner and keeps their
/// results.
#[derive(Debug)]
pub struct ScenarioManager {
    runner: Arc<SimulationEngine>,
    scenarios: RwLock<HashMap<String, TestScenario>>,
    results: RwLock<HashMap<String, Vec<ScenarioResult>>>,
}

impl ScenarioManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(runner: Arc<SimulationEngine>) -> Self {
        Self {
            runner,
            scenarios: RwLock::new(HashMap::new()),
            results: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the batch runner.
    #[must_use]
    pub const fn runner(&self) -> &Arc<SimulationEngine> {
        &self.runner
    }

    /// Stores a scenario as given.
    pub async fn create_scenario(&self, scenario: TestScenario) -> TestScenario {
        info!(
            scenario = %scenario.id,
            name = %scenario.name,
            kind = %scenario.scenario_type(),
            inputs = scenario.inputs.len(),
            faults = scenario.faults.len(),
            "scenario created"
        );
        self.scenarios
            .write()
            .await
            .insert(scenario.id.clone(), scenario.clone());
        scenario
    }

    /// Creates a scenario that runs each input once without faults.
    pub async fn create_golden_path_scenario(
        &self,
        name: &str,
        workflow: Workflow,
        inputs: Vec<Value>,
    ) -> TestScenario {
        let description = format!("Expected behaviour over {} input(s)", inputs.len());
        self.create_scenario(
            TestScenario::new(name, workflow, ScenarioKind::GoldenPath(BatchParameters::default()))
                .with_description(description)
                .with_inputs(inputs),
        )
        .await
    }

    /// Creates a scenario that runs each input plus the generated edge
    /// inputs once.
    pub async fn create_edge_case_scenario(
        &self,
        name: &str,
        workflow: Workflow,
        inputs: Vec<Value>,
    ) -> TestScenario {
        let mut all = inputs;
        all.extend(edge_case_inputs());
        let description = format!("Boundary and malformed data over {} input(s)", all.len());
        self.create_scenario(
            TestScenario::new(name, workflow, ScenarioKind::EdgeCases(BatchParameters::default()))
                .with_description(description)
                .with_inputs(all),
        )
        .await
    }

    /// Creates a fixed-rate load scenario.
    pub async fn create_load_test_scenario(
        &self,
        name: &str,
        workflow: Workflow,
        input: Value,
        config: LoadTestConfig,
    ) -> TestScenario {
        let description = format!(
            "{} executions/s for {}ms, at most {} in flight",
            config.executions_per_second, config.duration_ms, config.concurrent_executions
        );
        self.create_scenario(
            TestScenario::new(name, workflow, ScenarioKind::LoadTesting(config))
                .with_description(description)
                .with_inputs(vec![input]),
        )
        .await
    }

    /// Creates a stress scenario with latency and rate-limit faults on every
    /// action node.
    ///
    /// # Errors
    ///
    /// Returns `Faults` if a stress template is missing from the catalog.
    pub async fn create_stress_test_scenario(
        &self,
        name: &str,
        workflow: Workflow,
        input: Value,
        config: StressTestConfig,
    ) -> Result<TestScenario> {
        let faults = self.attach_templates(&workflow, &STRESS_TEMPLATES)?;
        let description = format!(
            "Concurrency up to {}, tolerating {:.0}% failures",
            config.max_concurrent,
            config.target_failure_rate * 100.0
        );
        Ok(self
            .create_scenario(
                TestScenario::new(name, workflow, ScenarioKind::StressTesting(config))
                    .with_description(description)
                    .with_inputs(vec![input])
                    .with_faults(faults),
            )
            .await)
    }

    /// Creates a chaos scenario. Faults are attached to every action node
    /// from the templates of the requested types, or from a default set of
    /// network, API, intermittent and latency templates.
    ///
    /// # Errors
    ///
    /// Returns `Faults` if a template is missing from the catalog.
    pub async fn create_chaos_test_scenario(
        &self,
        name: &str,
        workflow: Workflow,
        input: Value,
        parameters: ChaosParameters,
    ) -> Result<TestScenario> {
        let engine = self.runner.twins().fault_engine();
        let templates: Vec<&str> = match &parameters.fault_types {
            Some(types) => types
                .iter()
                .filter_map(|t| engine.template_for(*t))
                .map(|t| t.name.as_str())
                .collect(),
            None => DEFAULT_CHAOS_TEMPLATES.to_vec(),
        };
        let faults = self.attach_templates(&workflow, &templates)?;
        let description = format!(
            "{} iterations at chaos level {}",
            parameters.iterations, parameters.chaos_level
        );
        Ok(self
            .create_scenario(
                TestScenario::new(name, workflow, ScenarioKind::ChaosTesting(parameters))
                    .with_description(description)
                    .with_inputs(vec![input])
                    .with_faults(faults),
            )
            .await)
    }

    /// Creates a performance scenario.
    pub async fn create_performance_test_scenario(
        &self,
        name: &str,
        workflow: Workflow,
        input: Value,
        config: PerformanceTestConfig,
    ) -> TestScenario {
        let description = format!(
            "p95 <= {}ms at >= {}/s",
            config.target_latency_ms, config.target_throughput
        );
        self.create_scenario(
            TestScenario::new(name, workflow, ScenarioKind::PerformanceTesting(config))
                .with_description(description)
                .with_inputs(vec![input]),
        )
        .await
    }

    /// Instantiates each template on each action node of the workflow.
    fn attach_templates(&self, workflow: &Workflow, templates: &[&str]) -> Result<Vec<FaultScenario>> {
        let engine = self.runner.twins().fault_engine();
        let mut faults = Vec::new();
        for node_id in workflow.action_node_ids() {
            for name in templates {
                let template = engine.template(name)?;
                faults.push(template.instantiate(&node_id, FaultOverrides::default()));
            }
        }
        Ok(faults)
    }

    /// Returns a stored scenario.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` for an unknown id.
    pub async fn get_scenario(&self, id: &str) -> Result<TestScenario> {
        self.scenarios
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ScenarioNotFound(id.to_string()))
    }

    /// Returns all scenarios, oldest first.
    pub async fn list_scenarios(&self) -> Vec<TestScenario> {
        let mut all: Vec<TestScenario> = self.scenarios.read().await.values().cloned().collect();
        all.sort_by_key(|s| s.created_at);
        all
    }

    /// Removes a scenario and its results.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` for an unknown id.
    pub async fn delete_scenario(&self, id: &str) -> Result<TestScenario> {
        let removed = self
            .scenarios
            .write()
            .await
            .remove(id)
            .ok_or_else(|| Error::ScenarioNotFound(id.to_string()))?;
        self.results.write().await.remove(id);
        info!(scenario = %id, "scenario deleted");
        Ok(removed)
    }

    /// Enables or disables a scenario.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` for an unknown id.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut scenarios = self.scenarios.write().await;
        let scenario = scenarios
            .get_mut(id)
            .ok_or_else(|| Error::ScenarioNotFound(id.to_string()))?;
        scenario.enabled = enabled;
        debug!(scenario = %id, enabled, "scenario toggled");
        Ok(())
    }

    /// Returns every recorded run of a scenario, oldest first.
    pub async fn get_results(&self, id: &str) -> Vec<ScenarioResult> {
        self.results
            .read()
            .await
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Serializes a scenario and its results as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` for an unknown id and `Serialization` if
    /// encoding fails.
    pub async fn export_report(&self, id: &str) -> Result<String> {
        let scenario = self.get_scenario(id).await?;
        let results = self.get_results(id).await;
        let report = ScenarioReport {
            scenario: &scenario,
            results: &results,
            generated_at: Utc::now(),
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }

    /// Runs a scenario and records its result.
    ///
    /// Failures during the run, including a disabled scenario, produce a
    /// `failed` result with a single insight instead of an error.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` for an unknown id.
    pub async fn execute_scenario(&self, id: &str) -> Result<ScenarioResult> {
        let scenario = self.get_scenario(id).await?;
        info!(scenario = %id, kind = %scenario.scenario_type(), "scenario started");
        let start = Instant::now();

        let outcome = if scenario.enabled {
            self.run(&scenario).await
        } else {
            Err(Error::ScenarioDisabled(scenario.id.clone()))
        };
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let result = match outcome {
            Ok(outcome) => evaluate(&scenario, outcome, duration_ms),
            Err(e) => {
                warn!(scenario = %id, error = %e, "scenario run failed");
                let severity = if matches!(e, Error::ScenarioDisabled(_)) {
                    InsightSeverity::Medium
                } else {
                    InsightSeverity::Critical
                };
                failed_result(&scenario, Insight::new(severity, "execution", e.to_string()), duration_ms)
            }
        };

        info!(
            scenario = %id,
            status = ?result.status,
            executions = result.executions.len(),
            error_rate = result.metrics.error_rate,
            "scenario finished"
        );
        self.results
            .write()
            .await
            .entry(id.to_string())
            .or_default()
            .push(result.clone());
        Ok(result)
    }

    /// Creates a fresh twin, dispatches to the type's handler and removes
    /// the twin again.
    async fn run(&self, scenario: &TestScenario) -> Result<RunOutcome> {
        let twins = self.runner.twins();
        let twin = twins.create_twin(&scenario.workflow).await;
        let outcome = self.dispatch(scenario, &twin.id).await;
        if let Err(e) = twins.delete_twin(&twin.id).await {
            debug!(twin = %twin.id, error = %e, "scenario twin already gone");
        }
        outcome
    }

    async fn dispatch(&self, scenario: &TestScenario, twin_id: &str) -> Result<RunOutcome> {
        let options = SimulationOptions::default().with_faults(scenario.faults.clone());
        let input = scenario.primary_input();

        let outcome = match &scenario.kind {
            ScenarioKind::GoldenPath(params) | ScenarioKind::EdgeCases(params) => {
                let inputs = if scenario.inputs.is_empty() {
                    vec![input]
                } else {
                    scenario.inputs.clone()
                };
                let requests = inputs
                    .into_iter()
                    .map(|i| SimulationRequest::new(twin_id, i).with_options(options.clone()))
                    .collect();
                RunOutcome {
                    executions: self
                        .runner
                        .run_parallel_simulations(requests, params.max_concurrency)
                        .await?,
                    ..RunOutcome::default()
                }
            }
            // Attached faults only fire on random draws outside deterministic mode.
            ScenarioKind::LoadTesting(config) => RunOutcome {
                executions: self
                    .runner
                    .run_load_test(
                        twin_id,
                        input,
                        options.with_deterministic(scenario.faults.is_empty()),
                        config,
                    )
                    .await?
                    .results,
                ..RunOutcome::default()
            },
            ScenarioKind::StressTesting(config) => {
                let report = self
                    .runner
                    .run_stress_test(
                        twin_id,
                        input,
                        options.with_deterministic(scenario.faults.is_empty()),
                        config,
                    )
                    .await?;
                RunOutcome {
                    executions: report.results,
                    breaking_point: report.breaking_point,
                    ..RunOutcome::default()
                }
            }
            ScenarioKind::ChaosTesting(params) => {
                let config = ChaosTestConfig {
                    fault_types: params.fault_types.clone(),
                    ..ChaosTestConfig::new(params.chaos_level, params.iterations, scenario.faults.clone())
                };
                RunOutcome {
                    executions: self
                        .runner
                        .run_chaos_test(twin_id, input, options, &config)
                        .await?
                        .results,
                    ..RunOutcome::default()
                }
            }
            ScenarioKind::PerformanceTesting(config) => {
                let report = self
                    .runner
                    .run_performance_test(twin_id, input, options, config)
                    .await?;
                RunOutcome {
                    executions: report.results,
                    performance: Some(PerformanceOutcome {
                        metrics: report.performance_metrics,
                        target_latency_ms: config.target_latency_ms,
                        target_throughput: config.target_throughput,
                    }),
                    ..RunOutcome::default()
                }
            }
        };
        Ok(outcome)
    }
}

fn evaluate(scenario: &TestScenario, outcome: RunOutcome, duration_ms: f64) -> ScenarioResult {
    let kind = scenario.scenario_type();
    let metrics = analysis::compute_metrics(&outcome.executions);
    let status = analysis::determine_status(kind, &metrics, &outcome);
    let insights = analysis::generate_insights(kind, &metrics, &outcome);

    ScenarioResult {
        id: uuid::Uuid::new_v4().to_string(),
        scenario_id: scenario.id.clone(),
        scenario_type: kind,
        status,
        metrics,
        insights,
        duration_ms,
        breaking_point: outcome.breaking_point,
        targets_met: outcome.performance.as_ref().map(|p| p.metrics.targets_met),
        executions: outcome.executions,
        timestamp: Utc::now(),
    }
}

fn failed_result(scenario: &TestScenario, insight: Insight, duration_ms: f64) -> ScenarioResult {
    ScenarioResult {
        id: uuid::Uuid::new_v4().to_string(),
        scenario_id: scenario.id.clone(),
        scenario_type: scenario.scenario_type(),
        status: ScenarioStatus::Failed,
        executions: Vec::new(),
        metrics: ScenarioMetrics::default(),
        insights: vec![insight],
        duration_ms,
        breaking_point: None,
        targets_met: None,
        timestamp: Utc::now(),
    }
}
