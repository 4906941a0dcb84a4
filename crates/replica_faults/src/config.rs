//! Fault engine configuration.

use serde::{Deserialize, Serialize};

/// Configuration for the fault injection engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FaultInjectionConfig {
    /// Whether chaos mode amplifies probabilities by default.
    pub enable_chaos: bool,
    /// Chaos multiplier used when chaos mode is enabled.
    pub chaos_level: f64,
    /// Whether injection results are kept for statistics.
    pub record_impact: bool,
    /// Whether fired faults get a recovery attempt.
    pub auto_recover: bool,
    /// Maximum number of faults being synthesized at once.
    pub max_concurrent_faults: usize,
}

impl Default for FaultInjectionConfig {
    fn default() -> Self {
        Self {
            enable_chaos: false,
            chaos_level: 0.5,
            record_impact: true,
            auto_recover: true,
            max_concurrent_faults: 10,
        }
    }
}

impl FaultInjectionConfig {
    /// Enables chaos mode at the given level.
    #[must_use]
    pub const fn with_chaos(mut self, level: f64) -> Self {
        self.enable_chaos = true;
        self.chaos_level = level;
        self
    }

    /// Sets whether fired faults are recovered.
    #[must_use]
    pub const fn with_auto_recover(mut self, auto_recover: bool) -> Self {
        self.auto_recover = auto_recover;
        self
    }

    /// Sets whether injection results are recorded.
    #[must_use]
    pub const fn with_record_impact(mut self, record: bool) -> Self {
        self.record_impact = record;
        self
    }

    /// Sets the concurrent fault ceiling.
    #[must_use]
    pub const fn with_max_concurrent_faults(mut self, max: usize) -> Self {
        self.max_concurrent_faults = max;
        self
    }

    /// Returns the chaos level in effect when no per-run level is given.
    #[must_use]
    pub const fn default_chaos(&self) -> Option<f64> {
        if self.enable_chaos {
            Some(self.chaos_level)
        } else {
            None
        }
    }
}
