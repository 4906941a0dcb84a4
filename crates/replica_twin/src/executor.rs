//! Simulated execution of a twin's graph.
//!
//! Nodes run strictly in plan order. Each node gathers its input from all
//! predecessors, passes through the `before`, `during` and `after` fault
//! phases, and produces a canned output for its type. Durations are
//! synthetic: a per-type latency profile scaled by the connectivity mode,
//! plus the latency of any fired fault, divided by the time compression.

use crate::config::SimulationConfig;
use crate::result::SimulatedNodeResult;
use chrono::Utc;
use replica_faults::{FaultInjectionEngine, FaultInjectionResult, FaultTiming, InjectionContext};
use replica_model::{ExecutionPlan, Node, RandomSource, Workflow};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Synthetic (compute, I/O) latency in milliseconds for a node type.
fn latency_profile(node_type: &str) -> (f64, f64) {
    match node_type {
        "transform" => (5.0, 0.0),
        "filter" => (3.0, 0.0),
        "merge" => (4.0, 0.0),
        "httpRequest" => (20.0, 200.0),
        t if t == "trigger" || t.ends_with("Trigger") => (1.0, 0.0),
        _ => (10.0, 0.0),
    }
}

/// Runs one simulation over a prepared plan.
pub(crate) struct GraphExecutor<'a> {
    pub faults: &'a FaultInjectionEngine,
    pub rng: &'a dyn RandomSource,
    pub config: &'a SimulationConfig,
}

impl GraphExecutor<'_> {
    /// Executes nodes in order, halting after an error on a node without
    /// `continueOnError`. Returns the results produced so far.
    pub async fn run(
        &self,
        workflow: &Workflow,
        plan: &ExecutionPlan,
        input: &Value,
    ) -> Vec<SimulatedNodeResult> {
        let mut outputs: Vec<Option<Value>> = vec![None; workflow.nodes.len()];
        let mut results = Vec::with_capacity(plan.order().len());

        for &idx in plan.order() {
            let node = &workflow.nodes[idx];
            let node_input = gather_input(workflow, plan, idx, &outputs, input);
            let result = self.run_node(node, node_input).await;

            let halt = result.is_error() && !node.continue_on_error();
            debug!(
                node = %node.id,
                node_type = %node.node_type,
                error = result.error.as_deref().unwrap_or(""),
                halt,
                "node simulated"
            );
            outputs[idx].clone_from(&result.output);
            results.push(result);
            if halt {
                break;
            }
        }
        results
    }

    async fn run_node(&self, node: &Node, input: Value) -> SimulatedNodeResult {
        let mut fired = Vec::new();
        let mut output = None;

        let mut error = self.check_phase(node, FaultTiming::Before, &mut fired).await;
        if error.is_none() {
            error = self.check_phase(node, FaultTiming::During, &mut fired).await;
        }
        if error.is_none() {
            let generated = self.generate_output(node, &input);
            if self.config.validate_output && generated.is_null() {
                error = Some(format!("Output validation failed: node '{}' produced null", node.id));
            } else {
                error = self.check_phase(node, FaultTiming::After, &mut fired).await;
                if error.is_none() {
                    output = Some(generated);
                }
            }
        }

        SimulatedNodeResult {
            node_id: node.id.clone(),
            node_type: node.node_type.clone(),
            input,
            output,
            error,
            duration_ms: self.node_duration(node, &fired),
            faults_injected: fired,
        }
    }

    /// Runs every scenario bound to this node and phase. Returns the error of
    /// the first fault that fired without recovering.
    async fn check_phase(
        &self,
        node: &Node,
        timing: FaultTiming,
        fired: &mut Vec<FaultInjectionResult>,
    ) -> Option<String> {
        let context = InjectionContext::new(node.id.clone(), timing)
            .with_deterministic(self.config.deterministic)
            .with_chaos(self.config.chaos_level);

        for scenario in self
            .config
            .faults
            .iter()
            .filter(|s| s.node_id == node.id && s.timing == timing)
        {
            let result = self.faults.inject_fault(scenario, &context).await;
            if !result.injected {
                continue;
            }
            let unrecovered = result.is_unrecovered();
            let message = result.error.clone();
            fired.push(result);
            if unrecovered {
                return Some(message.unwrap_or_else(|| format!("{} fault", scenario.fault_type)));
            }
        }
        None
    }

    fn generate_output(&self, node: &Node, input: &Value) -> Value {
        let output = match node.node_type.as_str() {
            "transform" => {
                let mut fields = match input {
                    Value::Object(map) => map.clone(),
                    other => {
                        let mut map = Map::new();
                        map.insert("value".to_string(), other.clone());
                        map
                    }
                };
                fields.insert("transformed".to_string(), Value::Bool(true));
                Value::Object(fields)
            }
            "filter" => json!({"filtered": true, "passed": true, "data": input}),
            "merge" => json!({"merged": true, "data": input}),
            "httpRequest" => json!({
                "status": 200,
                "statusText": "OK",
                "headers": {"content-type": "application/json"},
                "data": {"success": true, "simulated": true},
            }),
            _ if node.is_trigger() => input.clone(),
            other => json!({"nodeType": other, "simulated": true, "input": input}),
        };

        if self.config.deterministic {
            return output;
        }
        match output {
            Value::Object(mut map) => {
                map.insert("random".to_string(), json!(self.rng.next_f64()));
                map.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));
                Value::Object(map)
            }
            other => other,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn node_duration(&self, node: &Node, fired: &[FaultInjectionResult]) -> f64 {
        let (compute, io) = latency_profile(&node.node_type);
        let mut ms = io.mul_add(self.config.mode.io_latency_factor(), compute);
        if !self.config.deterministic {
            ms *= 0.4f64.mul_add(self.rng.next_f64(), 0.8);
        }
        ms += fired.iter().map(|f| f.latency_ms as f64).sum::<f64>();
        ms / self.config.time_compression
    }
}

/// Input for node `idx`: the simulation input for start nodes, the single
/// predecessor's output, or a shallow merge of all predecessor outputs.
/// Non-object outputs are merged under the predecessor's id.
fn gather_input(
    workflow: &Workflow,
    plan: &ExecutionPlan,
    idx: usize,
    outputs: &[Option<Value>],
    input: &Value,
) -> Value {
    match plan.predecessors(idx) {
        [] => input.clone(),
        [single] => outputs[*single].clone().unwrap_or(Value::Null),
        many => {
            let mut merged = Map::new();
            for &p in many {
                match &outputs[p] {
                    Some(Value::Object(fields)) => {
                        merged.extend(fields.iter().map(|(k, v)| (k.clone(), v.clone())));
                    }
                    Some(Value::Null) | None => {}
                    Some(other) => {
                        merged.insert(workflow.nodes[p].id.clone(), other.clone());
                    }
                }
            }
            Value::Object(merged)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{SimulationMode, SimulationOptions};
    use replica_faults::{FaultInjectionConfig, FaultScenario, FaultType};
    use replica_model::FixedRandom;
    use std::sync::Arc;

    fn run_with(
        workflow: &Workflow,
        options: SimulationOptions,
        input: Value,
    ) -> Vec<SimulatedNodeResult> {
        let rng: Arc<dyn RandomSource> = Arc::new(FixedRandom(0.5));
        let faults = FaultInjectionEngine::new(FaultInjectionConfig::default(), rng.clone());
        let config = options.resolve(SimulationMode::Isolated).unwrap();
        let plan = ExecutionPlan::build(workflow).unwrap();
        let executor = GraphExecutor {
            faults: &faults,
            rng: rng.as_ref(),
            config: &config,
        };
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(executor.run(workflow, &plan, &input))
    }

    fn diamond() -> Workflow {
        Workflow::new("wf", "diamond")
            .with_node(Node::new("start", "trigger"))
            .with_node(Node::new("left", "transform"))
            .with_node(Node::new("right", "httpRequest"))
            .with_node(Node::new("join", "merge"))
            .with_edge("start", "left")
            .with_edge("start", "right")
            .with_edge("left", "join")
            .with_edge("right", "join")
    }

    #[test]
    fn join_sees_every_predecessor() {
        let results = run_with(&diamond(), SimulationOptions::default(), json!({"k": "v"}));
        let join = results.iter().find(|r| r.node_id == "join").unwrap();

        // Shallow merge of transform output ({k, transformed}) and HTTP output.
        assert_eq!(join.input["k"], "v");
        assert_eq!(join.input["transformed"], true);
        assert_eq!(join.input["status"], 200);
        assert_eq!(results.last().unwrap().node_id, "join");
    }

    #[test]
    fn before_fault_skips_node_and_halts() {
        let fault = FaultScenario::new("left", FaultType::AuthFailure).with_timing(FaultTiming::Before);
        let results = run_with(
            &diamond(),
            SimulationOptions::default().with_faults(vec![fault]),
            json!({}),
        );
        let left = results.iter().find(|r| r.node_id == "left").unwrap();
        assert!(left.output.is_none());
        assert!(left.error.as_deref().unwrap().contains("Authentication failed"));
        assert_eq!(left.faults_injected.len(), 1);
        assert!(results.iter().all(|r| r.node_id != "join"));
    }

    #[test]
    fn continue_on_error_keeps_going() {
        let mut wf = diamond();
        wf.nodes[1] = Node::new("left", "transform").with_config("continueOnError", json!(true));
        let fault = FaultScenario::new("left", FaultType::InvalidData);
        let results = run_with(
            &wf,
            SimulationOptions::default().with_faults(vec![fault]),
            json!({"k": 1}),
        );
        assert_eq!(results.len(), 4);
        let join = results.last().unwrap();
        // Only the HTTP branch contributed.
        assert!(join.input.get("transformed").is_none());
        assert_eq!(join.input["status"], 200);
    }

    #[test]
    fn recovered_fault_still_produces_output() {
        let fault = FaultScenario::new("right", FaultType::SlowResponse)
            .with_parameter("delayMs", json!(0));
        let results = run_with(
            &diamond(),
            SimulationOptions::default().with_faults(vec![fault]),
            json!({}),
        );
        let right = results.iter().find(|r| r.node_id == "right").unwrap();
        assert!(right.error.is_none());
        assert!(right.output.is_some());
        assert!(right.faults_injected[0].recovered);
    }

    #[test]
    fn non_deterministic_output_is_decorated() {
        let results = run_with(
            &diamond(),
            SimulationOptions::default().with_deterministic(false),
            json!({}),
        );
        let left = results.iter().find(|r| r.node_id == "left").unwrap();
        let output = left.output.as_ref().unwrap();
        assert!(output.get("random").is_some());
        assert!(output.get("timestamp").is_some());
    }

    #[test]
    fn durations_scale_with_compression() {
        let plain = run_with(&diamond(), SimulationOptions::default(), json!({}));
        let compressed = run_with(
            &diamond(),
            SimulationOptions::default().with_time_compression(10.0),
            json!({}),
        );
        let http = |rs: &[SimulatedNodeResult]| {
            rs.iter().find(|r| r.node_id == "right").unwrap().duration_ms
        };
        assert!((http(&plain) - 70.0).abs() < 1e-9);
        assert!((http(&compressed) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn validation_rejects_null_output() {
        let wf = Workflow::new("wf", "one").with_node(Node::new("t", "trigger"));
        let results = run_with(
            &wf,
            SimulationOptions::default().with_validate_output(true),
            Value::Null,
        );
        assert!(results[0].error.as_deref().unwrap().contains("validation"));
    }
}
