//! Scenario command implementation.

use super::{emit, load_workflow, parse_input, Settings};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use replica_faults::FaultType;
use replica_runner::{LoadTestConfig, PerformanceTestConfig, StressTestConfig};
use replica_scenarios::{ChaosParameters, InsightSeverity, ScenarioManager, ScenarioStatus};
use serde_json::Value;
use tracing::{error, info, warn};

/// Scenario type accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Run each input once without faults
    Golden,
    /// Run each input plus generated boundary inputs
    Edge,
    /// Issue simulations at a fixed rate
    Load,
    /// Double concurrency until the maximum
    Stress,
    /// Amplified random faults
    Chaos,
    /// Measure latency and throughput against targets
    Performance,
}

/// Arguments of `replica scenario`.
#[derive(Debug, Args)]
pub struct ScenarioArgs {
    /// Path to the workflow JSON file
    pub workflow: String,

    /// Scenario type
    #[arg(short, long, value_enum, default_value = "golden")]
    pub kind: KindArg,

    /// Scenario name (defaults to the workflow id and type)
    #[arg(short, long)]
    pub name: Option<String>,

    /// Input as inline JSON or @path; repeat for several inputs
    #[arg(short, long = "input")]
    pub inputs: Vec<String>,

    /// Concurrency ceiling for load and stress runs
    #[arg(long, default_value_t = 4)]
    pub concurrency: usize,

    /// Issue rate for load runs, per second
    #[arg(long, default_value_t = 10.0)]
    pub rate: f64,

    /// Run duration for load, stress and performance runs
    #[arg(long, default_value_t = 5_000)]
    pub duration_ms: u64,

    /// Linear ramp-up for load runs
    #[arg(long)]
    pub ramp_up_ms: Option<u64>,

    /// Tolerated failure rate for stress runs
    #[arg(long, default_value_t = 0.1)]
    pub failure_rate: f64,

    /// Number of chaos iterations
    #[arg(long, default_value_t = 20)]
    pub iterations: usize,

    /// Chaos multiplier for fault probabilities
    #[arg(long, default_value_t = 0.5)]
    pub chaos_level: f64,

    /// Fault types for chaos runs (network_timeout, api_error, ...)
    #[arg(long = "fault-type")]
    pub fault_types: Vec<String>,

    /// Target p95 latency for performance runs
    #[arg(long, default_value_t = 1_000.0)]
    pub target_latency_ms: f64,

    /// Target throughput for performance runs, per second
    #[arg(long, default_value_t = 10.0)]
    pub target_throughput: f64,

    /// Fail on partial results, not only on failed ones
    #[arg(long)]
    pub strict: bool,

    /// Output path for the JSON report (prints to stdout if omitted)
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Runs the scenario command.
pub async fn run(settings: &Settings, seed: Option<u64>, args: &ScenarioArgs) -> Result<()> {
    let workflow = load_workflow(&args.workflow)?;
    let inputs = args
        .inputs
        .iter()
        .map(|raw| parse_input(raw))
        .collect::<Result<Vec<Value>>>()?;
    let primary = inputs
        .first()
        .cloned()
        .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
    let name = args
        .name
        .clone()
        .unwrap_or_else(|| format!("{} {:?}", workflow.id, args.kind).to_lowercase());

    let manager = ScenarioManager::new(settings.build_runner(seed));
    let scenario = match args.kind {
        KindArg::Golden => {
            manager
                .create_golden_path_scenario(&name, workflow, inputs)
                .await
        }
        KindArg::Edge => manager.create_edge_case_scenario(&name, workflow, inputs).await,
        KindArg::Load => {
            let mut config =
                LoadTestConfig::new(args.concurrency, args.rate, args.duration_ms);
            if let Some(ramp) = args.ramp_up_ms {
                config = config.with_ramp_up(ramp);
            }
            manager
                .create_load_test_scenario(&name, workflow, primary, config)
                .await
        }
        KindArg::Stress => {
            let config =
                StressTestConfig::new(args.concurrency, args.failure_rate, args.duration_ms);
            manager
                .create_stress_test_scenario(&name, workflow, primary, config)
                .await
                .with_context(|| "Failed to attach stress faults")?
        }
        KindArg::Chaos => {
            let mut params = ChaosParameters::new(args.chaos_level, args.iterations);
            if !args.fault_types.is_empty() {
                params = params.with_fault_types(parse_fault_types(&args.fault_types)?);
            }
            manager
                .create_chaos_test_scenario(&name, workflow, primary, params)
                .await
                .with_context(|| "Failed to attach chaos faults")?
        }
        KindArg::Performance => {
            let config = PerformanceTestConfig::new(
                args.target_latency_ms,
                args.target_throughput,
                args.duration_ms,
            );
            manager
                .create_performance_test_scenario(&name, workflow, primary, config)
                .await
        }
    };

    info!("Running {} scenario '{}'", scenario.scenario_type(), scenario.name);
    let result = manager
        .execute_scenario(&scenario.id)
        .await
        .with_context(|| format!("Failed to run scenario '{}'", scenario.name))?;

    info!(
        "Executions: {}/{} succeeded, p95 {:.1}ms",
        result.metrics.successful_executions,
        result.metrics.total_executions,
        result.metrics.p95_duration
    );
    for insight in &result.insights {
        match insight.severity {
            InsightSeverity::Critical | InsightSeverity::High => {
                error!("[{}] {}: {}", insight.severity, insight.category, insight.message);
            }
            InsightSeverity::Medium => {
                warn!("[{}] {}: {}", insight.severity, insight.category, insight.message);
            }
            _ => info!("[{}] {}: {}", insight.severity, insight.category, insight.message),
        }
    }

    let report = manager
        .export_report(&scenario.id)
        .await
        .with_context(|| "Failed to export scenario report")?;
    emit(&report, args.output.as_deref())?;

    match result.status {
        ScenarioStatus::Failed => anyhow::bail!("Scenario '{}' failed", scenario.name),
        ScenarioStatus::Partial if args.strict => {
            anyhow::bail!("Scenario '{}' only partially passed (strict mode)", scenario.name)
        }
        _ => {
            info!("Scenario '{}' {:?}", scenario.name, result.status);
            Ok(())
        }
    }
}

fn parse_fault_types(raw: &[String]) -> Result<Vec<FaultType>> {
    raw.iter()
        .map(|name| {
            FaultType::ALL
                .into_iter()
                .find(|t| t.as_str() == name)
                .with_context(|| format!("Unknown fault type: {name}"))
        })
        .collect()
}
