//! Command implementations and shared setup.

pub mod scenario;
pub mod simulate;
pub mod templates;

use anyhow::{Context, Result};
use replica_faults::{FaultInjectionConfig, FaultInjectionEngine};
use replica_model::{RandomSource, SeededRandom, Workflow};
use replica_runner::SimulationEngine;
use replica_twin::{DigitalTwinConfig, DigitalTwinManager};
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Optional YAML configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Twin manager settings.
    pub twin: DigitalTwinConfig,
    /// Fault engine settings.
    pub faults: FaultInjectionConfig,
}

impl Settings {
    /// Reads settings from `path`, or returns the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let settings = Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        info!("Loaded configuration from: {}", path);
        Ok(settings)
    }

    fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }

    /// Builds the fault engine, twin manager and runner stack.
    pub fn build_runner(&self, seed: Option<u64>) -> Arc<SimulationEngine> {
        let rng: Arc<dyn RandomSource> = match seed {
            Some(seed) => {
                debug!(seed, "using seeded random source");
                Arc::new(SeededRandom::new(seed))
            }
            None => Arc::new(SeededRandom::from_entropy()),
        };
        let faults = Arc::new(FaultInjectionEngine::new(
            self.faults.clone(),
            Arc::clone(&rng),
        ));
        let twins = Arc::new(DigitalTwinManager::new(self.twin.clone(), faults, rng));
        Arc::new(SimulationEngine::new(twins))
    }
}

/// Reads a workflow graph from a JSON file.
pub fn load_workflow(path: &str) -> Result<Workflow> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read workflow file: {path}"))?;
    let workflow: Workflow = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse workflow file: {path}"))?;
    info!(
        "Loaded workflow '{}' with {} nodes and {} edges",
        workflow.id,
        workflow.nodes.len(),
        workflow.edges.len()
    );
    Ok(workflow)
}

/// Parses an input argument: inline JSON, or `@path` to read a JSON file.
pub fn parse_input(raw: &str) -> Result<Value> {
    if let Some(path) = raw.strip_prefix('@') {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read input file: {path}"))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse input file: {path}"));
    }
    serde_json::from_str(raw).with_context(|| format!("Input is not valid JSON: {raw}"))
}

/// Writes a report to `output`, or prints it when no path is given.
pub fn emit(report: &str, output: Option<&str>) -> Result<()> {
    match output {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create output directory: {}", parent.display())
                    })?;
                }
            }
            fs::write(path, report)
                .with_context(|| format!("Failed to write output file: {path}"))?;
            info!("Report written to: {}", path);
        }
        None => println!("{report}"),
    }
    Ok(())
}
