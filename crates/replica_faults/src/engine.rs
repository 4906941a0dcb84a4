//! Fault injection engine.
//!
//! Owns the template catalog and registered scenarios, decides whether a
//! fault fires for a given node and phase, synthesizes the resulting error
//! and simulates a recovery attempt.

use crate::config::FaultInjectionConfig;
use crate::error::{Error, Result};
use crate::model::{
    clamp_probability, FaultInjectionResult, FaultScenario, FaultStatistics, FaultType, Impact,
    InjectionContext,
};
use crate::templates::{builtin_templates, FaultOverrides, FaultTemplate};
use replica_model::RandomSource;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

/// Upper bound on real wall-clock time a latency fault may sleep.
pub const MAX_FAULT_SLEEP: Duration = Duration::from_millis(1000);

/// Injection results kept for statistics before the oldest are dropped.
const MAX_HISTORY: usize = 10_000;

/// Error produced by a fired fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedFault {
    /// Human-readable error message.
    pub message: String,
    /// Latency the fault represents, before the sleep cap.
    pub latency_ms: u64,
}

/// Outcome of a recovery attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecoveryOutcome {
    /// Whether recovery succeeded.
    pub recovered: bool,
    /// Wall-clock time spent in the attempt.
    pub recovery_time_ms: f64,
}

/// Decrements the in-flight fault counter when dropped, including when the
/// owning simulation is cancelled by a timeout.
struct ActiveFault<'a>(&'a AtomicUsize);

impl Drop for ActiveFault<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Fault injection engine.
pub struct FaultInjectionEngine {
    config: FaultInjectionConfig,
    rng: Arc<dyn RandomSource>,
    templates: Vec<FaultTemplate>,
    scenarios: RwLock<HashMap<String, FaultScenario>>,
    history: Mutex<VecDeque<FaultInjectionResult>>,
    active: AtomicUsize,
}

impl std::fmt::Debug for FaultInjectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FaultInjectionEngine")
            .field("config", &self.config)
            .field("templates", &self.templates.len())
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl FaultInjectionEngine {
    /// Creates an engine with the built-in template catalog.
    #[must_use]
    pub fn new(config: FaultInjectionConfig, rng: Arc<dyn RandomSource>) -> Self {
        Self {
            config,
            rng,
            templates: builtin_templates(),
            scenarios: RwLock::new(HashMap::new()),
            history: Mutex::new(VecDeque::new()),
            active: AtomicUsize::new(0),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &FaultInjectionConfig {
        &self.config
    }

    /// Returns the template catalog.
    #[must_use]
    pub fn templates(&self) -> &[FaultTemplate] {
        &self.templates
    }

    /// Looks up a template by name.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if no template has this name.
    pub fn template(&self, name: &str) -> Result<&FaultTemplate> {
        self.templates
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| Error::TemplateNotFound(name.to_string()))
    }

    /// Returns the first template of the given fault type.
    #[must_use]
    pub fn template_for(&self, fault_type: FaultType) -> Option<&FaultTemplate> {
        self.templates.iter().find(|t| t.fault_type == fault_type)
    }

    /// Registers a standalone scenario; its probability is clamped.
    pub async fn create_scenario(&self, mut scenario: FaultScenario) -> FaultScenario {
        scenario.probability = clamp_probability(scenario.probability);
        self.scenarios
            .write()
            .await
            .insert(scenario.id.clone(), scenario.clone());
        debug!(id = %scenario.id, node = %scenario.node_id, "registered fault scenario");
        scenario
    }

    /// Instantiates and registers a scenario from a named template.
    ///
    /// # Errors
    ///
    /// Returns `TemplateNotFound` if no template has this name.
    pub async fn create_from_template(
        &self,
        name: &str,
        node_id: &str,
        overrides: FaultOverrides,
    ) -> Result<FaultScenario> {
        let scenario = self.template(name)?.instantiate(node_id, overrides);
        Ok(self.create_scenario(scenario).await)
    }

    /// Returns a registered scenario.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` if the id is unknown.
    pub async fn get_scenario(&self, id: &str) -> Result<FaultScenario> {
        self.scenarios
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| Error::ScenarioNotFound(id.to_string()))
    }

    /// Returns all registered scenarios.
    pub async fn list_scenarios(&self) -> Vec<FaultScenario> {
        let mut all: Vec<_> = self.scenarios.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Removes a registered scenario.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` if the id is unknown.
    pub async fn remove_scenario(&self, id: &str) -> Result<FaultScenario> {
        self.scenarios
            .write()
            .await
            .remove(id)
            .ok_or_else(|| Error::ScenarioNotFound(id.to_string()))
    }

    /// Enables or disables a registered scenario.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` if the id is unknown.
    pub async fn set_enabled(&self, id: &str, enabled: bool) -> Result<()> {
        let mut scenarios = self.scenarios.write().await;
        let scenario = scenarios
            .get_mut(id)
            .ok_or_else(|| Error::ScenarioNotFound(id.to_string()))?;
        scenario.enabled = enabled;
        Ok(())
    }

    /// Decides whether `scenario` fires in `context`.
    ///
    /// Disabled scenarios, other nodes and other timing phases never fire.
    /// Deterministic checks fire iff the probability is at least 1.0 and
    /// never draw from the random source.
    pub fn should_inject_fault(&self, scenario: &FaultScenario, context: &InjectionContext) -> bool {
        if !scenario.enabled
            || scenario.timing != context.timing
            || scenario.node_id != context.node_id
        {
            return false;
        }

        let probability = clamp_probability(scenario.probability);
        if context.deterministic {
            return probability >= 1.0;
        }

        let effective = match context.chaos_level.or_else(|| self.config.default_chaos()) {
            Some(chaos) => (probability * (1.0 + chaos.max(0.0))).min(1.0),
            None => probability,
        };
        self.rng.next_f64() < effective
    }

    /// Synthesizes the error a fired fault produces.
    ///
    /// Latency faults sleep for `min(configured delay, 1s)` before returning.
    pub async fn execute_fault(&self, scenario: &FaultScenario) -> SynthesizedFault {
        let (message, latency_ms) = match scenario.fault_type {
            FaultType::NetworkTimeout => {
                let timeout = scenario.param_u64("timeoutMs").unwrap_or(30_000);
                sleep_capped(timeout).await;
                (format!("Network timeout: no response after {timeout}ms"), timeout)
            }
            FaultType::SlowResponse => {
                let delay = scenario.param_u64("delayMs").unwrap_or(5_000);
                sleep_capped(delay).await;
                (
                    format!("Slow response: took {delay}ms, exceeding expected latency"),
                    delay,
                )
            }
            FaultType::InvalidData => {
                let field = scenario.param_str("field").unwrap_or("payload");
                let reason = scenario.param_str("reason").unwrap_or("validation failed");
                (format!("Invalid data in field '{field}': {reason}"), 0)
            }
            FaultType::ApiError => {
                let status = scenario.param_u64("statusCode").unwrap_or(500);
                let text = scenario.param_str("message").unwrap_or(if status < 500 {
                    "Client Error"
                } else {
                    "Server Error"
                });
                (format!("API error {status}: {text}"), 0)
            }
            FaultType::AuthFailure => {
                let reason = scenario.param_str("reason").unwrap_or("invalid_credentials");
                (format!("Authentication failed: {reason}"), 0)
            }
            FaultType::ResourceExhaustion => {
                let resource = scenario.param_str("resource").unwrap_or("memory");
                (format!("Resource exhausted: {resource} limit reached"), 0)
            }
            FaultType::DataCorruption => (
                "Data corruption detected: output checksum mismatch".to_string(),
                0,
            ),
            FaultType::CascadingFailure => {
                let affected = scenario.param_u64("affectedNodes").unwrap_or(1);
                (
                    format!(
                        "Cascading failure: upstream dependency failed, {affected} downstream node(s) affected"
                    ),
                    0,
                )
            }
            FaultType::IntermittentFailure => (
                "Intermittent failure: transient error, retry may succeed".to_string(),
                0,
            ),
            FaultType::PartialData => {
                let completeness = scenario
                    .parameters
                    .get("completeness")
                    .and_then(serde_json::Value::as_f64)
                    .unwrap_or(0.5);
                (
                    format!(
                        "Partial data: received {:.0}% of expected payload",
                        completeness * 100.0
                    ),
                    0,
                )
            }
        };

        SynthesizedFault {
            message,
            latency_ms,
        }
    }

    /// Static severity for a scenario's fault type.
    #[must_use]
    pub const fn classify_impact(&self, scenario: &FaultScenario) -> Impact {
        scenario.fault_type.impact()
    }

    /// Simulates one recovery attempt for a fired fault.
    ///
    /// Deterministic attempts succeed iff the fault type always recovers.
    pub fn attempt_recovery(
        &self,
        scenario: &FaultScenario,
        error: &str,
        deterministic: bool,
    ) -> RecoveryOutcome {
        let start = Instant::now();
        let rate = scenario.fault_type.recovery_rate();
        let recovered = if deterministic {
            rate >= 1.0
        } else {
            self.rng.next_f64() < rate
        };
        let recovery_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            fault = %scenario.fault_type,
            node = %scenario.node_id,
            recovered,
            error,
            "recovery attempt"
        );
        RecoveryOutcome {
            recovered,
            recovery_time_ms,
        }
    }

    /// Runs the full injection pipeline for one check: decision, synthesis,
    /// impact classification and recovery.
    pub async fn inject_fault(
        &self,
        scenario: &FaultScenario,
        context: &InjectionContext,
    ) -> FaultInjectionResult {
        if !self.should_inject_fault(scenario, context) {
            return FaultInjectionResult::not_injected(scenario, context.timing);
        }

        let in_flight = self.active.fetch_add(1, Ordering::AcqRel);
        let _guard = ActiveFault(&self.active);
        if in_flight >= self.config.max_concurrent_faults {
            debug!(
                fault = %scenario.fault_type,
                in_flight,
                "concurrent fault ceiling reached, skipping injection"
            );
            return FaultInjectionResult::not_injected(scenario, context.timing);
        }

        let fault = self.execute_fault(scenario).await;
        let impact = self.classify_impact(scenario);
        let recovery = if self.config.auto_recover {
            Some(self.attempt_recovery(scenario, &fault.message, context.deterministic))
        } else {
            None
        };

        info!(
            fault = %scenario.fault_type,
            node = %scenario.node_id,
            timing = %context.timing,
            recovered = recovery.is_some_and(|r| r.recovered),
            "fault injected"
        );

        let result = FaultInjectionResult {
            fault_id: scenario.id.clone(),
            node_id: scenario.node_id.clone(),
            fault_type: scenario.fault_type,
            injected: true,
            timing: context.timing,
            impact,
            error: Some(fault.message),
            recovered: recovery.is_some_and(|r| r.recovered),
            recovery_time_ms: recovery.map(|r| r.recovery_time_ms),
            latency_ms: fault.latency_ms,
        };

        if self.config.record_impact {
            let mut history = self.history.lock().await;
            if history.len() >= MAX_HISTORY {
                history.pop_front();
            }
            history.push_back(result.clone());
        }
        result
    }

    /// Aggregates recorded injections for one scenario.
    ///
    /// # Errors
    ///
    /// Returns `ScenarioNotFound` if the scenario is neither registered nor
    /// present in the history.
    #[allow(clippy::cast_precision_loss)]
    pub async fn get_statistics(&self, scenario_id: &str) -> Result<FaultStatistics> {
        let fired: Vec<FaultInjectionResult> = self
            .history
            .lock()
            .await
            .iter()
            .filter(|r| r.fault_id == scenario_id && r.injected)
            .cloned()
            .collect();

        if fired.is_empty() && !self.scenarios.read().await.contains_key(scenario_id) {
            return Err(Error::ScenarioNotFound(scenario_id.to_string()));
        }

        let total_injections = fired.len();
        let recovered: Vec<&FaultInjectionResult> = fired.iter().filter(|r| r.recovered).collect();
        let recovery_rate = if total_injections == 0 {
            0.0
        } else {
            recovered.len() as f64 / total_injections as f64
        };
        let avg_recovery_time_ms = if recovered.is_empty() {
            0.0
        } else {
            recovered
                .iter()
                .filter_map(|r| r.recovery_time_ms)
                .sum::<f64>()
                / recovered.len() as f64
        };

        let mut impact_distribution = BTreeMap::new();
        for r in &fired {
            *impact_distribution.entry(r.impact).or_insert(0) += 1;
        }

        Ok(FaultStatistics {
            scenario_id: scenario_id.to_string(),
            total_injections,
            recovered: recovered.len(),
            recovery_rate,
            avg_recovery_time_ms,
            impact_distribution,
        })
    }

    /// Returns the recorded injection history, oldest first.
    pub async fn history(&self) -> Vec<FaultInjectionResult> {
        self.history.lock().await.iter().cloned().collect()
    }

    /// Drops all recorded injections.
    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }
}

async fn sleep_capped(configured_ms: u64) {
    tokio::time::sleep(Duration::from_millis(configured_ms).min(MAX_FAULT_SLEEP)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FaultTiming;
    use replica_model::{FixedRandom, SeededRandom};
    use serde_json::json;

    fn engine_with(rng: Arc<dyn RandomSource>) -> FaultInjectionEngine {
        FaultInjectionEngine::new(FaultInjectionConfig::default(), rng)
    }

    fn during(node: &str) -> InjectionContext {
        InjectionContext::new(node, FaultTiming::During)
    }

    #[test]
    fn disabled_scenario_never_fires() {
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        let scenario = FaultScenario::new("n", FaultType::ApiError).disabled();

        assert!(!engine.should_inject_fault(&scenario, &during("n")));
        assert!(!engine.should_inject_fault(&scenario, &during("n").with_deterministic(false)));
    }

    #[test]
    fn deterministic_threshold_is_exactly_one() {
        // A source that would fire anything if it were consulted.
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        let almost = FaultScenario::new("n", FaultType::ApiError).with_probability(0.999);
        let certain = FaultScenario::new("n", FaultType::ApiError).with_probability(1.0);

        assert!(!engine.should_inject_fault(&almost, &during("n")));
        assert!(engine.should_inject_fault(&certain, &during("n")));
    }

    #[test]
    fn timing_is_an_exact_match() {
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        let before = FaultScenario::new("n", FaultType::ApiError).with_timing(FaultTiming::Before);
        let during_fault = FaultScenario::new("n", FaultType::ApiError);

        assert!(!engine.should_inject_fault(&before, &during("n")));
        assert!(!engine
            .should_inject_fault(&during_fault, &InjectionContext::new("n", FaultTiming::Before)));
        assert!(engine.should_inject_fault(&before, &InjectionContext::new("n", FaultTiming::Before)));
    }

    #[test]
    fn other_nodes_are_ignored() {
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        let scenario = FaultScenario::new("a", FaultType::ApiError);
        assert!(!engine.should_inject_fault(&scenario, &during("b")));
    }

    #[test]
    fn chaos_amplifies_probability() {
        // Draw of 0.5 misses p=0.3 but hits 0.3 * (1 + 1.0) = 0.6.
        let engine = engine_with(Arc::new(FixedRandom(0.5)));
        let scenario = FaultScenario::new("n", FaultType::ApiError).with_probability(0.3);
        let ctx = during("n").with_deterministic(false);

        assert!(!engine.should_inject_fault(&scenario, &ctx));
        assert!(engine.should_inject_fault(&scenario, &ctx.clone().with_chaos(Some(1.0))));
    }

    #[test]
    fn config_chaos_applies_without_run_level() {
        let engine = FaultInjectionEngine::new(
            FaultInjectionConfig::default().with_chaos(1.0),
            Arc::new(FixedRandom(0.5)),
        );
        let scenario = FaultScenario::new("n", FaultType::ApiError).with_probability(0.3);
        assert!(engine.should_inject_fault(&scenario, &during("n").with_deterministic(false)));
    }

    #[tokio::test(start_paused = true)]
    async fn latency_sleep_is_capped() {
        let engine = engine_with(Arc::new(SeededRandom::new(1)));
        let scenario = FaultScenario::new("n", FaultType::SlowResponse)
            .with_parameter("delayMs", json!(60_000));

        let start = tokio::time::Instant::now();
        let fault = engine.execute_fault(&scenario).await;
        let slept = start.elapsed();
        assert!(slept >= MAX_FAULT_SLEEP && slept < Duration::from_secs(2));
        assert_eq!(fault.latency_ms, 60_000);
        assert!(fault.message.contains("60000ms"));
    }

    #[tokio::test]
    async fn api_error_message_uses_status() {
        let engine = engine_with(Arc::new(SeededRandom::new(1)));
        let scenario = engine
            .create_from_template("api_error_4xx", "n", FaultOverrides::default())
            .await
            .unwrap();
        let fault = engine.execute_fault(&scenario).await;
        assert_eq!(fault.message, "API error 400: Bad Request");
    }

    #[test]
    fn deterministic_recovery_follows_table() {
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        let slow = FaultScenario::new("n", FaultType::SlowResponse);
        let corrupt = FaultScenario::new("n", FaultType::DataCorruption);

        assert!(engine.attempt_recovery(&slow, "slow", true).recovered);
        assert!(!engine.attempt_recovery(&corrupt, "corrupt", true).recovered);
        // Non-deterministic draw of 0.0 recovers anything with a positive rate.
        assert!(engine.attempt_recovery(&corrupt, "corrupt", false).recovered);
    }

    #[tokio::test]
    async fn statistics_aggregate_history() {
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        let scenario = engine
            .create_scenario(FaultScenario::new("n", FaultType::ApiError))
            .await;

        for _ in 0..4 {
            let result = engine.inject_fault(&scenario, &during("n")).await;
            assert!(result.injected);
            assert_eq!(result.impact, Impact::Major);
        }

        let stats = engine.get_statistics(&scenario.id).await.unwrap();
        assert_eq!(stats.total_injections, 4);
        // Deterministic recovery of an API error (rate 0.7) never succeeds.
        assert_eq!(stats.recovered, 0);
        assert!(stats.recovery_rate.abs() < f64::EPSILON);
        assert_eq!(stats.impact_distribution.get(&Impact::Major), Some(&4));
    }

    #[tokio::test]
    async fn statistics_for_unknown_scenario_fail() {
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        assert_eq!(
            engine.get_statistics("ghost").await.unwrap_err(),
            Error::ScenarioNotFound("ghost".into())
        );
    }

    #[tokio::test]
    async fn concurrent_ceiling_blocks_injection() {
        let engine = FaultInjectionEngine::new(
            FaultInjectionConfig::default().with_max_concurrent_faults(0),
            Arc::new(FixedRandom(0.0)),
        );
        let scenario = FaultScenario::new("n", FaultType::ApiError);
        let result = engine.inject_fault(&scenario, &during("n")).await;
        assert!(!result.injected);
        assert_eq!(result.impact, Impact::None);
        assert_eq!(engine.active.load(Ordering::Acquire), 0);
    }

    #[tokio::test]
    async fn unrecorded_injections_leave_no_history() {
        let engine = FaultInjectionEngine::new(
            FaultInjectionConfig::default().with_record_impact(false),
            Arc::new(FixedRandom(0.0)),
        );
        let scenario = FaultScenario::new("n", FaultType::InvalidData);
        engine.inject_fault(&scenario, &during("n")).await;
        assert!(engine.history().await.is_empty());
    }

    #[tokio::test]
    async fn scenario_registry_round_trip() {
        let engine = engine_with(Arc::new(FixedRandom(0.0)));
        let s = engine
            .create_from_template("slow_response", "n", FaultOverrides::default())
            .await
            .unwrap();
        engine.set_enabled(&s.id, false).await.unwrap();
        assert!(!engine.get_scenario(&s.id).await.unwrap().enabled);
        assert_eq!(engine.list_scenarios().await.len(), 1);
        engine.remove_scenario(&s.id).await.unwrap();
        assert!(engine.get_scenario(&s.id).await.is_err());
        assert!(matches!(
            engine
                .create_from_template("nope", "n", FaultOverrides::default())
                .await,
            Err(Error::TemplateNotFound(_))
        ));
    }
}
