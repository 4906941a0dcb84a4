//! Twin manager and per-simulation configuration.

use crate::error::{Error, Result};
use replica_faults::FaultScenario;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default simulation timeout (5 minutes).
pub const DEFAULT_TIMEOUT_MS: u64 = 300_000;

/// How closely a simulation models external connectivity.
///
/// The mode scales the synthetic latency charged to I/O nodes; no mode
/// ever performs real network calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimulationMode {
    /// Everything in-process; I/O nodes are nearly free.
    #[default]
    Isolated,
    /// I/O nodes carry full synthetic network latency.
    Connected,
    /// Halfway between the two.
    Hybrid,
}

impl SimulationMode {
    /// Fraction of the synthetic I/O latency charged in this mode.
    #[must_use]
    pub const fn io_latency_factor(self) -> f64 {
        match self {
            Self::Isolated => 0.25,
            Self::Hybrid => 0.5,
            Self::Connected => 1.0,
        }
    }
}

/// Configuration for the twin manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DigitalTwinConfig {
    /// Whether twins are expected to be synced on an interval.
    pub real_time_sync: bool,
    /// Sync interval used by `needs_sync`.
    pub sync_interval_ms: u64,
    /// Run a baseline simulation when a twin is created.
    pub auto_simulate: bool,
    /// Mode used when a simulation does not specify one.
    pub default_simulation_mode: SimulationMode,
    /// Simulations older than this are evicted from history.
    pub retention_days: u32,
    /// Per-twin history cap.
    pub max_simulations: usize,
    /// Compute per-simulation metrics.
    pub enable_metrics: bool,
    /// Allow `compare` calls.
    pub enable_comparison: bool,
}

impl Default for DigitalTwinConfig {
    fn default() -> Self {
        Self {
            real_time_sync: false,
            sync_interval_ms: 60_000,
            auto_simulate: false,
            default_simulation_mode: SimulationMode::Isolated,
            retention_days: 30,
            max_simulations: 100,
            enable_metrics: true,
            enable_comparison: true,
        }
    }
}

impl DigitalTwinConfig {
    /// Sets the per-twin history cap.
    #[must_use]
    pub const fn with_max_simulations(mut self, max: usize) -> Self {
        self.max_simulations = max;
        self
    }

    /// Sets the default simulation mode.
    #[must_use]
    pub const fn with_default_mode(mut self, mode: SimulationMode) -> Self {
        self.default_simulation_mode = mode;
        self
    }

    /// Enables real-time sync with the given interval.
    #[must_use]
    pub const fn with_real_time_sync(mut self, interval_ms: u64) -> Self {
        self.real_time_sync = true;
        self.sync_interval_ms = interval_ms;
        self
    }

    /// Sets whether twins run a baseline simulation on creation.
    #[must_use]
    pub const fn with_auto_simulate(mut self, auto: bool) -> Self {
        self.auto_simulate = auto;
        self
    }

    /// Sets whether metrics are computed.
    #[must_use]
    pub const fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Sets whether comparison is allowed.
    #[must_use]
    pub const fn with_comparison(mut self, enabled: bool) -> Self {
        self.enable_comparison = enabled;
        self
    }
}

/// Fully resolved configuration of one simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Connectivity mode.
    pub mode: SimulationMode,
    /// Synthetic durations are divided by this factor (> 0).
    pub time_compression: f64,
    /// Deterministic runs never consult the random source.
    pub deterministic: bool,
    /// Fault scenarios in effect.
    #[serde(default)]
    pub faults: Vec<FaultScenario>,
    /// Wall-clock timeout for the whole simulation.
    #[serde(rename = "timeout")]
    pub timeout_ms: u64,
    /// Treat a null node output as a node error.
    pub validate_output: bool,
    /// Chaos multiplier for this run, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chaos_level: Option<f64>,
}

impl SimulationConfig {
    /// Returns the timeout as a `Duration`.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Per-call overrides merged over twin defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationOptions {
    /// Connectivity mode.
    pub mode: Option<SimulationMode>,
    /// Time compression factor.
    pub time_compression: Option<f64>,
    /// Determinism flag.
    pub deterministic: Option<bool>,
    /// Fault scenarios.
    pub faults: Option<Vec<FaultScenario>>,
    /// Timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Output validation flag.
    pub validate_output: Option<bool>,
    /// Chaos multiplier.
    pub chaos_level: Option<f64>,
}

impl SimulationOptions {
    /// Sets the mode.
    #[must_use]
    pub const fn with_mode(mut self, mode: SimulationMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Sets determinism.
    #[must_use]
    pub const fn with_deterministic(mut self, deterministic: bool) -> Self {
        self.deterministic = Some(deterministic);
        self
    }

    /// Sets the fault scenarios.
    #[must_use]
    pub fn with_faults(mut self, faults: Vec<FaultScenario>) -> Self {
        self.faults = Some(faults);
        self
    }

    /// Sets the timeout.
    #[must_use]
    pub const fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Sets the time compression factor.
    #[must_use]
    pub const fn with_time_compression(mut self, factor: f64) -> Self {
        self.time_compression = Some(factor);
        self
    }

    /// Sets the chaos level.
    #[must_use]
    pub const fn with_chaos(mut self, level: f64) -> Self {
        self.chaos_level = Some(level);
        self
    }

    /// Sets output validation.
    #[must_use]
    pub const fn with_validate_output(mut self, validate: bool) -> Self {
        self.validate_output = Some(validate);
        self
    }

    /// Merges these options over the defaults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the time compression or timeout is not
    /// strictly positive.
    pub fn resolve(self, default_mode: SimulationMode) -> Result<SimulationConfig> {
        let time_compression = self.time_compression.unwrap_or(1.0);
        if !(time_compression > 0.0 && time_compression.is_finite()) {
            return Err(Error::InvalidConfig(format!(
                "timeCompression must be > 0, got {time_compression}"
            )));
        }
        let timeout_ms = self.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            return Err(Error::InvalidConfig("timeout must be > 0".to_string()));
        }

        Ok(SimulationConfig {
            mode: self.mode.unwrap_or(default_mode),
            time_compression,
            deterministic: self.deterministic.unwrap_or(true),
            faults: self.faults.unwrap_or_default(),
            timeout_ms,
            validate_output: self.validate_output.unwrap_or(false),
            chaos_level: self.chaos_level,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve() {
        let config = SimulationOptions::default()
            .resolve(SimulationMode::Hybrid)
            .unwrap();
        assert_eq!(config.mode, SimulationMode::Hybrid);
        assert!(config.deterministic);
        assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
        assert!((config.time_compression - 1.0).abs() < f64::EPSILON);
        assert!(config.faults.is_empty());
    }

    #[test]
    fn non_positive_values_are_rejected() {
        let err = SimulationOptions::default()
            .with_time_compression(0.0)
            .resolve(SimulationMode::Isolated)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));

        let err = SimulationOptions::default()
            .with_timeout_ms(0)
            .resolve(SimulationMode::Isolated)
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn partial_twin_config_fills_defaults() {
        let config: DigitalTwinConfig =
            serde_json::from_str(r#"{"maxSimulations": 5, "autoSimulate": true}"#).unwrap();
        assert_eq!(config.max_simulations, 5);
        assert!(config.auto_simulate);
        assert_eq!(config.retention_days, 30);
        assert!(config.enable_comparison);
    }
}
