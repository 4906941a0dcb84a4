//! Twin registry and simulation entry points.

use crate::comparison::{compare_results, ComparisonResult};
use crate::config::{DigitalTwinConfig, SimulationConfig, SimulationOptions};
use crate::error::{Error, Result};
use crate::executor::GraphExecutor;
use crate::result::{SimulatedNodeResult, SimulationMetrics, SimulationResult, SimulationStatus};
use crate::twin::{TwinState, VirtualWorkflow};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use replica_faults::FaultInjectionEngine;
use replica_model::{ExecutionPlan, RandomSource, Workflow, WorkflowExecution};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One registered twin. The graph is fixed at creation; everything that
/// changes lives in `state`.
#[derive(Debug)]
struct TwinSlot {
    id: String,
    source_workflow_id: String,
    graph: Workflow,
    created_at: DateTime<Utc>,
    state: Mutex<TwinState>,
}

impl TwinSlot {
    fn view(&self, state: &TwinState) -> VirtualWorkflow {
        VirtualWorkflow {
            id: self.id.clone(),
            source_workflow_id: self.source_workflow_id.clone(),
            workflow_graph: self.graph.clone(),
            execution_count: state.execution_count,
            divergence: state.divergence,
            last_sync_at: state.last_sync_at,
            created_at: self.created_at,
        }
    }

    async fn snapshot(&self) -> VirtualWorkflow {
        let state = self.state.lock().await;
        self.view(&state)
    }
}

/// Owns every twin and runs simulations against them.
///
/// Parallel simulations of the same twin execute concurrently; only the
/// final history write and counter increment are serialized per twin.
pub struct DigitalTwinManager {
    config: DigitalTwinConfig,
    faults: Arc<FaultInjectionEngine>,
    rng: Arc<dyn RandomSource>,
    twins: RwLock<HashMap<String, Arc<TwinSlot>>>,
}

impl std::fmt::Debug for DigitalTwinManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigitalTwinManager")
            .field("config", &self.config)
            .field("faults", &self.faults)
            .finish_non_exhaustive()
    }
}

impl DigitalTwinManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(
        config: DigitalTwinConfig,
        faults: Arc<FaultInjectionEngine>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            config,
            faults,
            rng,
            twins: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the manager configuration.
    #[must_use]
    pub const fn config(&self) -> &DigitalTwinConfig {
        &self.config
    }

    /// Returns the fault engine shared by all simulations.
    #[must_use]
    pub const fn fault_engine(&self) -> &Arc<FaultInjectionEngine> {
        &self.faults
    }

    /// Creates a twin holding a deep copy of `workflow`.
    ///
    /// Calling this twice for the same workflow yields two independent
    /// twins. With `autoSimulate` on, a baseline simulation with an empty
    /// object input runs immediately; its failure is logged, not returned.
    pub async fn create_twin(&self, workflow: &Workflow) -> VirtualWorkflow {
        let slot = Arc::new(TwinSlot {
            id: Uuid::new_v4().to_string(),
            source_workflow_id: workflow.id.clone(),
            graph: workflow.clone(),
            created_at: Utc::now(),
            state: Mutex::new(TwinState::new(self.config.max_simulations)),
        });
        self.twins
            .write()
            .await
            .insert(slot.id.clone(), Arc::clone(&slot));

        info!(
            twin = %slot.id,
            workflow = %workflow.id,
            nodes = workflow.nodes.len(),
            edges = workflow.edges.len(),
            "twin created"
        );

        if self.config.auto_simulate {
            if let Err(e) = self
                .simulate(&slot.id, json!({}), SimulationOptions::default())
                .await
            {
                warn!(twin = %slot.id, error = %e, "baseline simulation failed");
            }
        }
        slot.snapshot().await
    }

    async fn slot(&self, twin_id: &str) -> Result<Arc<TwinSlot>> {
        self.twins
            .read()
            .await
            .get(twin_id)
            .cloned()
            .ok_or_else(|| Error::TwinNotFound(twin_id.to_string()))
    }

    /// Returns a snapshot of a twin.
    ///
    /// # Errors
    ///
    /// Returns `TwinNotFound` for an unknown id.
    pub async fn get_twin(&self, twin_id: &str) -> Result<VirtualWorkflow> {
        Ok(self.slot(twin_id).await?.snapshot().await)
    }

    /// Returns the most recently created twin of a source workflow.
    pub async fn get_twin_by_workflow_id(&self, workflow_id: &str) -> Option<VirtualWorkflow> {
        let newest = self
            .twins
            .read()
            .await
            .values()
            .filter(|s| s.source_workflow_id == workflow_id)
            .max_by_key(|s| s.created_at)
            .cloned()?;
        Some(newest.snapshot().await)
    }

    /// Returns snapshots of all twins, oldest first.
    pub async fn list_twins(&self) -> Vec<VirtualWorkflow> {
        let mut slots: Vec<Arc<TwinSlot>> = self.twins.read().await.values().cloned().collect();
        slots.sort_by_key(|s| s.created_at);

        let mut twins = Vec::with_capacity(slots.len());
        for slot in slots {
            twins.push(slot.snapshot().await);
        }
        twins
    }

    /// Removes a twin and its history.
    ///
    /// # Errors
    ///
    /// Returns `TwinNotFound` for an unknown id.
    pub async fn delete_twin(&self, twin_id: &str) -> Result<()> {
        self.twins
            .write()
            .await
            .remove(twin_id)
            .ok_or_else(|| Error::TwinNotFound(twin_id.to_string()))?;
        info!(twin = %twin_id, "twin deleted");
        Ok(())
    }

    /// Runs one simulation of a twin and stores the result.
    ///
    /// Node failures and injected faults are reported inside the returned
    /// result. Only misuse and infrastructure failures are errors.
    ///
    /// # Errors
    ///
    /// - `TwinNotFound` for an unknown id
    /// - `InvalidConfig` for out-of-range options
    /// - `Graph` if the graph has no start node, a cycle or dangling edges
    /// - `Timeout` if the run exceeds its configured timeout
    pub async fn simulate(
        &self,
        twin_id: &str,
        input: Value,
        options: SimulationOptions,
    ) -> Result<SimulationResult> {
        let slot = self.slot(twin_id).await?;
        let config = options.resolve(self.config.default_simulation_mode)?;
        let plan = ExecutionPlan::build(&slot.graph)?;

        debug!(
            twin = %twin_id,
            mode = ?config.mode,
            deterministic = config.deterministic,
            faults = config.faults.len(),
            "simulation started"
        );

        let executor = GraphExecutor {
            faults: &self.faults,
            rng: self.rng.as_ref(),
            config: &config,
        };
        let node_results = timeout(config.timeout(), executor.run(&slot.graph, &plan, &input))
            .await
            .map_err(|_| {
                warn!(twin = %twin_id, timeout_ms = config.timeout_ms, "simulation timed out");
                Error::Timeout {
                    twin_id: twin_id.to_string(),
                    timeout_ms: config.timeout_ms,
                }
            })?;

        let result = self.assemble(twin_id, input, node_results, slot.graph.nodes.len(), config);
        self.store(&slot, result.clone()).await;

        info!(
            twin = %twin_id,
            simulation = %result.id,
            status = ?result.status,
            duration_ms = result.duration_ms,
            nodes = result.node_results.len(),
            "simulation finished"
        );
        Ok(result)
    }

    fn assemble(
        &self,
        twin_id: &str,
        input: Value,
        node_results: Vec<SimulatedNodeResult>,
        total_nodes: usize,
        config: SimulationConfig,
    ) -> SimulationResult {
        let output = node_results
            .iter()
            .rev()
            .find_map(|n| n.output.clone())
            .unwrap_or(Value::Null);
        let error = node_results.iter().find_map(|n| n.error.clone());
        let metrics = if self.config.enable_metrics {
            SimulationMetrics::from_nodes(total_nodes, &node_results)
        } else {
            SimulationMetrics::default()
        };

        SimulationResult {
            id: Uuid::new_v4().to_string(),
            twin_id: twin_id.to_string(),
            input,
            output,
            status: if error.is_some() {
                SimulationStatus::Failed
            } else {
                SimulationStatus::Success
            },
            error,
            duration_ms: node_results.iter().map(|n| n.duration_ms).sum(),
            node_results,
            metrics,
            config,
            timestamp: Utc::now(),
        }
    }

    async fn store(&self, slot: &TwinSlot, result: SimulationResult) {
        let cutoff = Utc::now() - ChronoDuration::days(i64::from(self.config.retention_days));
        let mut state = slot.state.lock().await;

        let expired = state.history.evict_while(|sim| sim.timestamp < cutoff);
        if let Some((evicted, _)) = state.history.insert(result.id.clone(), result) {
            debug!(twin = %slot.id, simulation = %evicted, "history full, dropped oldest");
        }
        if expired > 0 {
            debug!(twin = %slot.id, expired, "retention window evicted simulations");
        }
        state.execution_count += 1;
    }

    /// Returns one stored simulation.
    ///
    /// # Errors
    ///
    /// Returns `TwinNotFound` or `SimulationNotFound`.
    pub async fn get_simulation(&self, twin_id: &str, simulation_id: &str) -> Result<SimulationResult> {
        let slot = self.slot(twin_id).await?;
        let state = slot.state.lock().await;
        state
            .history
            .get(&simulation_id.to_string())
            .cloned()
            .ok_or_else(|| Error::SimulationNotFound {
                twin_id: twin_id.to_string(),
                simulation_id: simulation_id.to_string(),
            })
    }

    /// Returns every retained simulation of a twin, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `TwinNotFound` for an unknown id.
    pub async fn get_simulations(&self, twin_id: &str) -> Result<Vec<SimulationResult>> {
        let slot = self.slot(twin_id).await?;
        let state = slot.state.lock().await;
        Ok(state.history.values().cloned().collect())
    }

    /// Compares a stored simulation with a real execution and records the
    /// accuracy in the twin's divergence window.
    ///
    /// # Errors
    ///
    /// Returns `ComparisonDisabled`, `TwinNotFound` or `SimulationNotFound`.
    pub async fn compare(
        &self,
        twin_id: &str,
        simulation_id: &str,
        real: &WorkflowExecution,
    ) -> Result<ComparisonResult> {
        if !self.config.enable_comparison {
            return Err(Error::ComparisonDisabled);
        }
        let slot = self.slot(twin_id).await?;
        let mut state = slot.state.lock().await;
        let simulation = state
            .history
            .get(&simulation_id.to_string())
            .ok_or_else(|| Error::SimulationNotFound {
                twin_id: twin_id.to_string(),
                simulation_id: simulation_id.to_string(),
            })?;

        let comparison = compare_results(simulation, real);
        state.record_accuracy(&comparison);
        debug!(
            twin = %twin_id,
            simulation = %simulation_id,
            execution = %real.id,
            accuracy = comparison.accuracy,
            status = ?comparison.status,
            "comparison recorded"
        );
        Ok(comparison)
    }

    /// Records a sync with a real execution.
    ///
    /// The execution is compared against the twin's latest simulation and
    /// divergence becomes one minus the mean of the recent accuracies. A
    /// twin without simulations only has its sync time stamped.
    ///
    /// # Errors
    ///
    /// Returns `TwinNotFound` for an unknown id.
    pub async fn sync(&self, twin_id: &str, real: &WorkflowExecution) -> Result<VirtualWorkflow> {
        let slot = self.slot(twin_id).await?;
        let mut state = slot.state.lock().await;

        let latest = state.history.newest().map(|sim| compare_results(sim, real));
        if let Some(comparison) = latest {
            state.record_accuracy(&comparison);
        }
        if let Some(divergence) = state.windowed_divergence() {
            state.divergence = divergence;
        }
        state.last_sync_at = Some(Utc::now());

        info!(
            twin = %twin_id,
            execution = %real.id,
            divergence = state.divergence,
            "twin synced"
        );
        Ok(slot.view(&state))
    }

    /// Returns true if real-time sync is on and the twin has not been synced
    /// within the configured interval.
    ///
    /// # Errors
    ///
    /// Returns `TwinNotFound` for an unknown id.
    pub async fn needs_sync(&self, twin_id: &str) -> Result<bool> {
        let slot = self.slot(twin_id).await?;
        if !self.config.real_time_sync {
            return Ok(false);
        }
        let last = slot.state.lock().await.last_sync_at;
        let interval = ChronoDuration::milliseconds(
            i64::try_from(self.config.sync_interval_ms).unwrap_or(i64::MAX),
        );
        Ok(match last {
            Some(at) => Utc::now() - at >= interval,
            None => true,
        })
    }

    /// Runs two fault-free deterministic simulations and reports whether
    /// their outputs are identical.
    ///
    /// # Errors
    ///
    /// Propagates any `simulate` error.
    pub async fn verify_determinism(&self, twin_id: &str, input: Value) -> Result<bool> {
        let options = SimulationOptions::default()
            .with_deterministic(true)
            .with_faults(Vec::new());
        let first = self.simulate(twin_id, input.clone(), options.clone()).await?;
        let second = self.simulate(twin_id, input, options).await?;

        let stable = first.fingerprint() == second.fingerprint();
        if !stable {
            warn!(twin = %twin_id, "deterministic simulations diverged");
        }
        Ok(stable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparison::ComparisonStatus;
    use replica_faults::{FaultInjectionConfig, FaultScenario, FaultTiming, FaultType};
    use replica_model::{FixedRandom, Node};

    fn manager(config: DigitalTwinConfig) -> DigitalTwinManager {
        let rng: Arc<dyn RandomSource> = Arc::new(FixedRandom(0.5));
        let faults = Arc::new(FaultInjectionEngine::new(
            FaultInjectionConfig::default(),
            Arc::clone(&rng),
        ));
        DigitalTwinManager::new(config, faults, rng)
    }

    fn chain() -> Workflow {
        Workflow::new("wf-chain", "chain")
            .with_node(Node::new("trigger", "trigger"))
            .with_node(Node::new("fetch", "httpRequest"))
            .with_node(Node::new("shape", "transform"))
            .with_edge("trigger", "fetch")
            .with_edge("fetch", "shape")
    }

    fn execution(output: Value, error: Option<&str>, duration_ms: i64) -> WorkflowExecution {
        let start = Utc::now();
        WorkflowExecution {
            id: "exec-1".into(),
            workflow_id: "wf".into(),
            output,
            error: error.map(str::to_string),
            start_time: start,
            end_time: start + ChronoDuration::milliseconds(duration_ms),
        }
    }

    #[tokio::test]
    async fn deterministic_runs_are_identical() {
        let m = manager(DigitalTwinConfig::default());
        let twin = m.create_twin(&chain()).await;

        let a = m
            .simulate(&twin.id, json!({"x": 1}), SimulationOptions::default())
            .await
            .unwrap();
        let b = m
            .simulate(&twin.id, json!({"x": 1}), SimulationOptions::default())
            .await
            .unwrap();

        assert!(a.is_success());
        assert_eq!(a.output, b.output);
        assert_eq!(a.fingerprint(), b.fingerprint());
        assert!(m.verify_determinism(&twin.id, json!({"x": 1})).await.unwrap());
        assert_eq!(m.get_twin(&twin.id).await.unwrap().execution_count, 4);
    }

    #[tokio::test]
    async fn history_keeps_newest_n() {
        let m = manager(DigitalTwinConfig::default().with_max_simulations(3));
        let twin = m.create_twin(&chain()).await;

        let mut ids = Vec::new();
        for i in 0..5 {
            let r = m
                .simulate(&twin.id, json!({"i": i}), SimulationOptions::default())
                .await
                .unwrap();
            ids.push(r.id);
        }

        let kept: Vec<String> = m
            .get_simulations(&twin.id)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(kept, ids[2..].to_vec());
        assert!(matches!(
            m.get_simulation(&twin.id, &ids[0]).await,
            Err(Error::SimulationNotFound { .. })
        ));
        assert_eq!(m.get_twin(&twin.id).await.unwrap().execution_count, 5);
    }

    #[tokio::test]
    async fn twin_is_isolated_from_source_mutation() {
        let m = manager(DigitalTwinConfig::default());
        let mut wf = chain();
        let twin = m.create_twin(&wf).await;

        wf.nodes.push(Node::new("extra", "merge"));
        let stored = m.get_twin(&twin.id).await.unwrap();
        assert_eq!(stored.workflow_graph.nodes.len(), 3);
        assert_eq!(m.get_twin_by_workflow_id("wf-chain").await.unwrap().id, twin.id);
    }

    #[tokio::test]
    async fn before_fault_fails_simulation() {
        let m = manager(DigitalTwinConfig::default());
        let twin = m.create_twin(&chain()).await;
        let fault = FaultScenario::new("fetch", FaultType::ApiError).with_timing(FaultTiming::Before);

        let r = m
            .simulate(
                &twin.id,
                json!({}),
                SimulationOptions::default().with_faults(vec![fault]),
            )
            .await
            .unwrap();

        assert_eq!(r.status, SimulationStatus::Failed);
        assert!(r.error.is_some());
        assert_eq!(r.node_results.len(), 2);
        assert!(r.node("fetch").unwrap().output.is_none());
        assert_eq!(r.metrics.nodes_skipped, 1);
        assert_eq!(r.metrics.faults_injected, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_fault_trips_timeout() {
        let m = manager(DigitalTwinConfig::default());
        let twin = m.create_twin(&chain()).await;
        let fault = FaultScenario::new("fetch", FaultType::SlowResponse)
            .with_parameter("delayMs", json!(60_000));

        let err = m
            .simulate(
                &twin.id,
                json!({}),
                SimulationOptions::default()
                    .with_faults(vec![fault])
                    .with_timeout_ms(100),
            )
            .await
            .unwrap_err();

        assert_eq!(
            err,
            Error::Timeout {
                twin_id: twin.id.clone(),
                timeout_ms: 100
            }
        );
        assert!(m.get_simulations(&twin.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn graph_without_start_node_is_an_error() {
        let m = manager(DigitalTwinConfig::default());
        let wf = Workflow::new("loop", "loop")
            .with_node(Node::new("a", "transform"))
            .with_node(Node::new("b", "transform"))
            .with_edge("a", "b")
            .with_edge("b", "a");
        let twin = m.create_twin(&wf).await;

        let err = m
            .simulate(&twin.id, json!({}), SimulationOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Graph(replica_model::Error::NoStartNode(_))
        ));
    }

    #[tokio::test]
    async fn unknown_twin_is_reported() {
        let m = manager(DigitalTwinConfig::default());
        let err = m
            .simulate("missing", json!({}), SimulationOptions::default())
            .await
            .unwrap_err();
        assert_eq!(err, Error::TwinNotFound("missing".into()));
        assert!(m.delete_twin("missing").await.is_err());
    }

    #[tokio::test]
    async fn matching_execution_compares_identical() {
        let m = manager(DigitalTwinConfig::default());
        let wf = Workflow::new("echo", "echo").with_node(Node::new("t", "trigger"));
        let twin = m.create_twin(&wf).await;
        let sim = m
            .simulate(&twin.id, json!({"a": 1}), SimulationOptions::default())
            .await
            .unwrap();

        let cmp = m
            .compare(&twin.id, &sim.id, &execution(json!({"a": 1}), None, 51))
            .await
            .unwrap();
        assert_eq!(cmp.status, ComparisonStatus::Identical);
        assert!(cmp.accuracy >= 0.99);
    }

    #[tokio::test]
    async fn disabled_comparison_is_rejected() {
        let m = manager(DigitalTwinConfig::default().with_comparison(false));
        let twin = m.create_twin(&chain()).await;
        let err = m
            .compare(&twin.id, "any", &execution(json!(null), None, 0))
            .await
            .unwrap_err();
        assert_eq!(err, Error::ComparisonDisabled);
    }

    #[tokio::test]
    async fn sync_tracks_rolling_divergence() {
        let m = manager(DigitalTwinConfig::default().with_real_time_sync(60_000));
        let wf = Workflow::new("echo", "echo").with_node(Node::new("t", "trigger"));
        let twin = m.create_twin(&wf).await;
        assert!(m.needs_sync(&twin.id).await.unwrap());

        // Nothing to compare against yet.
        let synced = m.sync(&twin.id, &execution(json!({"a": 2}), None, 1)).await.unwrap();
        assert!(synced.last_sync_at.is_some());
        assert!(synced.divergence.abs() < f64::EPSILON);
        assert!(!m.needs_sync(&twin.id).await.unwrap());

        m.simulate(&twin.id, json!({"a": 1}), SimulationOptions::default())
            .await
            .unwrap();

        // Output mismatch: accuracy 0.5.
        let synced = m.sync(&twin.id, &execution(json!({"a": 2}), None, 1)).await.unwrap();
        assert!((synced.divergence - 0.5).abs() < 1e-9);

        // Match: window is [0.5, 1.0].
        let synced = m.sync(&twin.id, &execution(json!({"a": 1}), None, 1)).await.unwrap();
        assert!((synced.divergence - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn auto_simulate_runs_baseline() {
        let m = manager(DigitalTwinConfig::default().with_auto_simulate(true));
        let twin = m.create_twin(&chain()).await;
        assert_eq!(twin.execution_count, 1);
        assert_eq!(m.get_simulations(&twin.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn disabled_metrics_are_zeroed() {
        let m = manager(DigitalTwinConfig::default().with_metrics(false));
        let twin = m.create_twin(&chain()).await;
        let r = m
            .simulate(&twin.id, json!({}), SimulationOptions::default())
            .await
            .unwrap();
        assert_eq!(r.metrics, SimulationMetrics::default());
        assert_eq!(r.node_results.len(), 3);
    }

    #[tokio::test]
    async fn twins_are_listed_and_deleted() {
        let m = manager(DigitalTwinConfig::default());
        let a = m.create_twin(&chain()).await;
        let b = m.create_twin(&chain()).await;
        assert_ne!(a.id, b.id);
        assert_eq!(m.list_twins().await.len(), 2);

        m.delete_twin(&a.id).await.unwrap();
        assert_eq!(m.list_twins().await.len(), 1);
        assert_eq!(m.get_twin(&a.id).await.unwrap_err(), Error::TwinNotFound(a.id.clone()));
    }
}
