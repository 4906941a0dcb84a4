//! Templates command implementation.

use super::Settings;
use anyhow::{Context, Result};
use replica_faults::FaultInjectionEngine;
use replica_model::FixedRandom;
use std::sync::Arc;

/// Runs the templates command.
pub fn run(settings: &Settings, json: bool) -> Result<()> {
    let engine = FaultInjectionEngine::new(settings.faults.clone(), Arc::new(FixedRandom(0.0)));
    let templates = engine.templates();

    if json {
        let out = serde_json::to_string_pretty(templates)
            .with_context(|| "Failed to encode template catalog")?;
        println!("{out}");
        return Ok(());
    }

    println!("{:<22} {:<22} {:>6}  {:<7} DESCRIPTION", "NAME", "TYPE", "P", "TIMING");
    for t in templates {
        println!(
            "{:<22} {:<22} {:>6.2}  {:<7} {}",
            t.name,
            t.fault_type.as_str(),
            t.default_probability,
            t.default_timing.to_string(),
            t.description
        );
    }
    Ok(())
}
