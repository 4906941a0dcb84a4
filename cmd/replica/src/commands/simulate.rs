//! Simulate command implementation.

use super::{emit, load_workflow, parse_input, Settings};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use replica_faults::{FaultInjectionEngine, FaultOverrides, FaultScenario};
use replica_twin::{SimulationMode, SimulationOptions};
use tracing::{info, warn};

/// Connectivity mode accepted on the command line.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// I/O nodes are nearly free
    Isolated,
    /// Half of the synthetic network latency
    Hybrid,
    /// Full synthetic network latency
    Connected,
}

impl From<ModeArg> for SimulationMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Isolated => Self::Isolated,
            ModeArg::Hybrid => Self::Hybrid,
            ModeArg::Connected => Self::Connected,
        }
    }
}

/// Arguments of `replica simulate`.
#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Path to the workflow JSON file
    pub workflow: String,

    /// Input as inline JSON, or @path to a JSON file
    #[arg(short, long, default_value = "{}")]
    pub input: String,

    /// Connectivity mode (defaults to the configured mode)
    #[arg(short, long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Draw fault decisions and jitter from the random source
    #[arg(long)]
    pub non_deterministic: bool,

    /// Fault to attach, as node=template or node=template:probability
    #[arg(short, long = "fault")]
    pub faults: Vec<String>,

    /// Chaos multiplier for fault probabilities
    #[arg(long)]
    pub chaos: Option<f64>,

    /// Time compression factor
    #[arg(long)]
    pub time_compression: Option<f64>,

    /// Simulation timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Treat null node output as an error
    #[arg(long)]
    pub validate_output: bool,

    /// Also run the input twice and check both runs agree
    #[arg(long)]
    pub verify: bool,

    /// Output path for the result JSON (prints to stdout if omitted)
    #[arg(short, long)]
    pub output: Option<String>,
}

/// Runs the simulate command.
pub async fn run(settings: &Settings, seed: Option<u64>, args: &SimulateArgs) -> Result<()> {
    let workflow = load_workflow(&args.workflow)?;
    let input = parse_input(&args.input)?;

    let runner = settings.build_runner(seed);
    let twins = runner.twins();
    let faults = args
        .faults
        .iter()
        .map(|spec| parse_fault(twins.fault_engine(), spec))
        .collect::<Result<Vec<_>>>()?;

    let mut options = SimulationOptions::default()
        .with_deterministic(!args.non_deterministic)
        .with_validate_output(args.validate_output)
        .with_faults(faults);
    if let Some(mode) = args.mode {
        options = options.with_mode(mode.into());
    }
    if let Some(level) = args.chaos {
        options = options.with_chaos(level);
    }
    if let Some(factor) = args.time_compression {
        options = options.with_time_compression(factor);
    }
    if let Some(timeout_ms) = args.timeout_ms {
        options = options.with_timeout_ms(timeout_ms);
    }

    let twin = twins.create_twin(&workflow).await;
    let result = runner
        .run_simulation(&twin.id, input.clone(), options)
        .await
        .with_context(|| format!("Simulation of '{}' failed", workflow.id))?;

    info!(
        "Simulation {}: {} of {} nodes executed in {:.1}ms",
        if result.is_success() { "succeeded" } else { "failed" },
        result.node_results.len(),
        workflow.nodes.len(),
        result.duration_ms
    );
    if let Some(error) = &result.error {
        warn!("Simulation error: {}", error);
    }

    if args.verify {
        let deterministic = twins
            .verify_determinism(&twin.id, input)
            .await
            .with_context(|| "Determinism check failed to run")?;
        if !deterministic {
            anyhow::bail!("Workflow '{}' produced different outputs for the same input", workflow.id);
        }
        info!("Determinism check passed");
    }

    let report = serde_json::to_string_pretty(&result).with_context(|| "Failed to encode result")?;
    emit(&report, args.output.as_deref())
}

/// Parses `node=template` or `node=template:probability`.
fn parse_fault(engine: &FaultInjectionEngine, spec: &str) -> Result<FaultScenario> {
    let (node_id, rest) = spec
        .split_once('=')
        .with_context(|| format!("Fault must be node=template, got: {spec}"))?;
    let (name, probability) = match rest.split_once(':') {
        Some((name, p)) => {
            let p: f64 = p
                .parse()
                .with_context(|| format!("Invalid fault probability: {p}"))?;
            (name, Some(p))
        }
        None => (rest, None),
    };

    let template = engine
        .template(name)
        .with_context(|| format!("Unknown fault template: {name}"))?;
    let overrides = match probability {
        Some(p) => FaultOverrides::default().with_probability(p),
        None => FaultOverrides::default(),
    };
    Ok(template.instantiate(node_id, overrides))
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_faults::{FaultInjectionConfig, FaultType};
    use replica_model::FixedRandom;
    use std::sync::Arc;

    fn engine() -> FaultInjectionEngine {
        FaultInjectionEngine::new(FaultInjectionConfig::default(), Arc::new(FixedRandom(0.5)))
    }

    #[test]
    fn parses_fault_specs() {
        let engine = engine();
        let fault = parse_fault(&engine, "fetch=slow_response").unwrap();
        assert_eq!(fault.node_id, "fetch");
        assert_eq!(fault.fault_type, FaultType::SlowResponse);

        let fault = parse_fault(&engine, "fetch=api_error_5xx:1").unwrap();
        assert!((fault.probability - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rejects_malformed_fault_specs() {
        let engine = engine();
        assert!(parse_fault(&engine, "slow_response").is_err());
        assert!(parse_fault(&engine, "fetch=no_such_template").is_err());
        assert!(parse_fault(&engine, "fetch=slow_response:often").is_err());
    }
}
