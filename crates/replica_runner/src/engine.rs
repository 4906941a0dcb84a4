//! Batch simulation runner.
//!
//! Every fan-out goes through a `Semaphore` sized to the caller's ceiling
//! and a `JoinSet` that is always drained, so no simulation outlives the
//! call that issued it. Cancellation stops new work; anything already
//! admitted runs to completion.

#![allow(clippy::cast_precision_loss)]

use crate::batch::{BatchItem, BatchResult, SimulationRequest};
use crate::config::{
    ChaosTestConfig, LoadTestConfig, PerformanceTestConfig, StressTestConfig, DEFAULT_PERCENTILES,
};
use crate::error::{Error, Result};
use crate::report::{
    ChaosTestResult, LoadTestResult, PerformanceMetrics, PerformanceTestResult, StressTestResult,
    StressWave, TargetsMet,
};
use replica_model::{percentile, DurationSummary};
use replica_twin::{DigitalTwinManager, SimulationOptions, SimulationResult};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

const CANCELLED: &str = "cancelled before start";

/// Admitted-simulation gauge with a high-water mark.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

struct InFlightGuard(Arc<InFlight>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::AcqRel);
    }
}

impl InFlight {
    fn enter(self: &Arc<Self>) -> InFlightGuard {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        InFlightGuard(Arc::clone(self))
    }
}

/// Tasks spawned for one batch.
struct Dispatch {
    twins: Arc<DigitalTwinManager>,
    tasks: JoinSet<BatchItem>,
    pending: HashSet<String>,
    gauge: Arc<InFlight>,
    skipped: Vec<BatchItem>,
}

impl Dispatch {
    fn new(twins: Arc<DigitalTwinManager>) -> Self {
        Self {
            twins,
            tasks: JoinSet::new(),
            pending: HashSet::new(),
            gauge: Arc::new(InFlight::default()),
            skipped: Vec::new(),
        }
    }

    fn spawn(&mut self, permit: OwnedSemaphorePermit, request: SimulationRequest) {
        self.pending.insert(request.id.clone());
        let twins = Arc::clone(&self.twins);
        let slot = self.gauge.enter();

        self.tasks.spawn(async move {
            let _permit = permit;
            let _slot = slot;
            match twins
                .simulate(&request.twin_id, request.input, request.options)
                .await
            {
                Ok(result) => BatchItem::completed(request.id, result),
                Err(e) => BatchItem::errored(request.id, e.to_string()),
            }
        });
    }

    fn skip(&mut self, request: SimulationRequest, reason: &str) {
        self.skipped.push(BatchItem::errored(request.id, reason));
    }

    /// Waits for every spawned task. Returns outcomes and the peak number
    /// of simulations admitted at once.
    async fn drain(mut self) -> (Vec<BatchItem>, usize) {
        let mut items = Vec::with_capacity(self.pending.len() + self.skipped.len());
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(item) => {
                    self.pending.remove(&item.request_id);
                    items.push(item);
                }
                Err(e) => warn!(error = %e, "simulation task failed"),
            }
        }
        items.extend(
            self.pending
                .drain()
                .map(|id| BatchItem::errored(id, "simulation task failed")),
        );
        items.append(&mut self.skipped);
        (items, self.gauge.peak.load(Ordering::Acquire))
    }
}

/// Issue schedule for a paced run.
#[derive(Debug, Clone, Copy)]
struct Pacing {
    every: Duration,
    ceiling: usize,
    window: Duration,
    ramp: Option<Duration>,
}

/// Concurrency ceiling during ramp-up: grows linearly from one to `max`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn ramp_target(elapsed: Duration, ramp: Duration, max: usize) -> usize {
    if ramp.is_zero() || elapsed >= ramp {
        return max;
    }
    let fraction = elapsed.as_secs_f64() / ramp.as_secs_f64();
    ((max as f64 * fraction).ceil() as usize).clamp(1, max)
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

fn completed(items: &[BatchItem]) -> impl Iterator<Item = &SimulationResult> {
    items.iter().filter_map(|i| i.result.as_ref())
}

/// Drives batches of simulations against a twin manager.
#[derive(Debug)]
pub struct SimulationEngine {
    twins: Arc<DigitalTwinManager>,
    cancelled: Arc<AtomicBool>,
}

impl SimulationEngine {
    /// Creates a runner over a twin manager.
    #[must_use]
    pub fn new(twins: Arc<DigitalTwinManager>) -> Self {
        Self {
            twins,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the twin manager.
    #[must_use]
    pub const fn twins(&self) -> &Arc<DigitalTwinManager> {
        &self.twins
    }

    /// Stops issuing new simulations. In-flight runs finish normally.
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            info!("batch runner cancelled");
        }
    }

    /// Clears a previous cancellation.
    pub fn resume(&self) {
        self.cancelled.store(false, Ordering::Release);
    }

    /// Returns true if new work is currently refused.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Returns the shared cancellation flag, e.g. for a signal handler.
    #[must_use]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Runs one simulation.
    ///
    /// # Errors
    ///
    /// Propagates the twin manager's error.
    pub async fn run_simulation(
        &self,
        twin_id: &str,
        input: Value,
        options: SimulationOptions,
    ) -> Result<SimulationResult> {
        Ok(self.twins.simulate(twin_id, input, options).await?)
    }

    /// Runs every request with at most `max_concurrency` in flight.
    ///
    /// Returns exactly one outcome per request, in completion order. Failed
    /// or skipped requests carry an error instead of a result.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `max_concurrency` is zero.
    pub async fn run_parallel_simulations(
        &self,
        requests: Vec<SimulationRequest>,
        max_concurrency: usize,
    ) -> Result<Vec<BatchItem>> {
        let (items, peak) = self.fan_out(requests, max_concurrency).await?;
        debug!(items = items.len(), peak, "parallel batch finished");
        Ok(items)
    }

    async fn fan_out(
        &self,
        requests: Vec<SimulationRequest>,
        ceiling: usize,
    ) -> Result<(Vec<BatchItem>, usize)> {
        if ceiling == 0 {
            return Err(Error::InvalidConfig("maxConcurrency must be > 0".into()));
        }
        let semaphore = Arc::new(Semaphore::new(ceiling));
        let mut dispatch = Dispatch::new(Arc::clone(&self.twins));

        for request in requests {
            if self.is_cancelled() {
                dispatch.skip(request, CANCELLED);
                continue;
            }
            match Arc::clone(&semaphore).acquire_owned().await {
                Ok(permit) => dispatch.spawn(permit, request),
                Err(_) => dispatch.skip(request, "concurrency gate closed"),
            }
        }
        Ok(dispatch.drain().await)
    }

    /// Issues one request per `pacing.every` until `pacing.window` elapses,
    /// holding at most `pacing.ceiling` in flight.
    async fn paced(
        &self,
        twin_id: &str,
        input: &Value,
        options: &SimulationOptions,
        pacing: Pacing,
    ) -> (Vec<BatchItem>, usize) {
        let start = Instant::now();
        let deadline = start + pacing.window;
        let mut granted = if pacing.ramp.is_some() { 1 } else { pacing.ceiling };
        let semaphore = Arc::new(Semaphore::new(granted));
        let mut dispatch = Dispatch::new(Arc::clone(&self.twins));

        let mut ticker = interval(pacing.every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let now = Instant::now();
            if now >= deadline || self.is_cancelled() {
                break;
            }
            if let Some(ramp) = pacing.ramp {
                let target = ramp_target(now - start, ramp, pacing.ceiling);
                if target > granted {
                    semaphore.add_permits(target - granted);
                    debug!(from = granted, to = target, "ramping concurrency");
                    granted = target;
                }
            }

            let request =
                SimulationRequest::new(twin_id, input.clone()).with_options(options.clone());
            match Arc::clone(&semaphore).acquire_owned().await {
                Ok(_) if self.is_cancelled() => break,
                Ok(permit) => dispatch.spawn(permit, request),
                Err(_) => dispatch.skip(request, "concurrency gate closed"),
            }
        }
        dispatch.drain().await
    }

    /// Issues simulations at a fixed rate for the configured duration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range parameters and `Twin` for an
    /// unknown twin.
    pub async fn run_load_test(
        &self,
        twin_id: &str,
        input: Value,
        options: SimulationOptions,
        config: &LoadTestConfig,
    ) -> Result<LoadTestResult> {
        config.validate()?;
        self.twins.get_twin(twin_id).await?;
        info!(
            twin = %twin_id,
            rate = config.executions_per_second,
            ceiling = config.concurrent_executions,
            duration_ms = config.duration_ms,
            "load test started"
        );

        let start = Instant::now();
        let (results, peak) = self
            .paced(
                twin_id,
                &input,
                &options,
                Pacing {
                    every: config.issue_interval()?,
                    ceiling: config.concurrent_executions,
                    window: Duration::from_millis(config.duration_ms),
                    ramp: config.ramp_up_ms.map(Duration::from_millis),
                },
            )
            .await;
        let batch = BatchResult::from_items(&results, elapsed_ms(start));

        info!(
            twin = %twin_id,
            total = batch.total,
            success_rate = batch.success_rate,
            peak,
            "load test finished"
        );
        Ok(LoadTestResult {
            success_rate: batch.success_rate,
            results,
            peak_concurrency: peak,
            batch,
        })
    }

    /// Runs waves of doubling concurrency up to the configured maximum,
    /// spreading the waves across the duration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range parameters and `Twin` for an
    /// unknown twin.
    pub async fn run_stress_test(
        &self,
        twin_id: &str,
        input: Value,
        options: SimulationOptions,
        config: &StressTestConfig,
    ) -> Result<StressTestResult> {
        config.validate()?;
        self.twins.get_twin(twin_id).await?;

        let levels = config.waves();
        let pause = Duration::from_millis(config.duration_ms)
            / u32::try_from(levels.len()).unwrap_or(u32::MAX);
        info!(twin = %twin_id, waves = ?levels, "stress test started");

        let start = Instant::now();
        let mut results = Vec::new();
        let mut waves = Vec::with_capacity(levels.len());
        let mut peak_concurrency = 0;
        let mut breaking_point = None;

        for (i, &level) in levels.iter().enumerate() {
            if self.is_cancelled() {
                break;
            }
            if i > 0 {
                sleep(pause).await;
            }
            let requests = (0..level)
                .map(|_| SimulationRequest::new(twin_id, input.clone()).with_options(options.clone()))
                .collect();
            let (items, peak) = self.fan_out(requests, level).await?;

            let failed = items.iter().filter(|i| !i.is_success()).count();
            let failure_rate = if items.is_empty() {
                0.0
            } else {
                failed as f64 / items.len() as f64
            };
            if breaking_point.is_none() && failure_rate > config.target_failure_rate {
                warn!(concurrency = level, failure_rate, "stress breaking point reached");
                breaking_point = Some(level);
            }
            peak_concurrency = peak_concurrency.max(peak);
            waves.push(StressWave {
                concurrency: level,
                failure_rate,
            });
            results.extend(items);
        }

        let batch = BatchResult::from_items(&results, elapsed_ms(start));
        info!(
            twin = %twin_id,
            total = batch.total,
            peak_concurrency,
            breaking_point = ?breaking_point,
            "stress test finished"
        );
        Ok(StressTestResult {
            results,
            waves,
            peak_concurrency,
            breaking_point,
            batch,
        })
    }

    /// Runs exactly `iterations` non-deterministic simulations with chaos
    /// amplification over the configured faults.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range parameters and `Twin` for an
    /// unknown twin.
    pub async fn run_chaos_test(
        &self,
        twin_id: &str,
        input: Value,
        options: SimulationOptions,
        config: &ChaosTestConfig,
    ) -> Result<ChaosTestResult> {
        config.validate()?;
        self.twins.get_twin(twin_id).await?;

        let options = options
            .with_deterministic(false)
            .with_chaos(config.chaos_level)
            .with_faults(config.effective_faults());
        info!(
            twin = %twin_id,
            iterations = config.iterations,
            chaos_level = config.chaos_level,
            "chaos test started"
        );

        let start = Instant::now();
        let mut results = Vec::with_capacity(config.iterations);
        for i in 0..config.iterations {
            let id = format!("chaos-{i}");
            if self.is_cancelled() {
                results.push(BatchItem::errored(id, CANCELLED));
                continue;
            }
            results.push(
                match self.twins.simulate(twin_id, input.clone(), options.clone()).await {
                    Ok(result) => BatchItem::completed(id, result),
                    Err(e) => BatchItem::errored(id, e.to_string()),
                },
            );
        }

        let fired: Vec<_> = completed(&results)
            .flat_map(|r| &r.node_results)
            .flat_map(|n| &n.faults_injected)
            .collect();
        let faults_injected = fired.len();
        let faults_recovered = fired.iter().filter(|f| f.recovered).count();
        let batch = BatchResult::from_items(&results, elapsed_ms(start));

        info!(
            twin = %twin_id,
            faults_injected,
            faults_recovered,
            success_rate = batch.success_rate,
            "chaos test finished"
        );
        Ok(ChaosTestResult {
            results,
            faults_injected,
            faults_recovered,
            batch,
        })
    }

    /// Offers load at the target throughput for the configured duration and
    /// measures latency percentiles and throughput against the targets.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for out-of-range parameters and `Twin` for an
    /// unknown twin.
    pub async fn run_performance_test(
        &self,
        twin_id: &str,
        input: Value,
        options: SimulationOptions,
        config: &PerformanceTestConfig,
    ) -> Result<PerformanceTestResult> {
        config.validate()?;
        self.twins.get_twin(twin_id).await?;
        info!(
            twin = %twin_id,
            target_latency_ms = config.target_latency_ms,
            target_throughput = config.target_throughput,
            "performance test started"
        );

        let start = Instant::now();
        let (results, _) = self
            .paced(
                twin_id,
                &input,
                &options,
                Pacing {
                    every: config.issue_interval()?,
                    ceiling: config.issue_ceiling(),
                    window: Duration::from_millis(config.duration_ms),
                    ramp: None,
                },
            )
            .await;
        let batch_result = BatchResult::from_items(&results, elapsed_ms(start));
        let performance_metrics = measure(&results, config);

        info!(
            twin = %twin_id,
            p95 = performance_metrics.latency.p95,
            throughput = performance_metrics.throughput,
            targets_met = performance_metrics.targets_met.all(),
            "performance test finished"
        );
        Ok(PerformanceTestResult {
            results,
            batch_result,
            performance_metrics,
        })
    }
}

/// Latency and throughput over synthetic durations of completed runs.
fn measure(results: &[BatchItem], config: &PerformanceTestConfig) -> PerformanceMetrics {
    let durations: Vec<f64> = completed(results).map(|r| r.duration_ms).collect();
    let latency = DurationSummary::from_samples(&durations);

    let mut sorted = durations;
    sorted.sort_by(f64::total_cmp);
    let percentiles: BTreeMap<String, f64> = config
        .percentiles
        .as_deref()
        .unwrap_or(DEFAULT_PERCENTILES.as_slice())
        .iter()
        .map(|p| (format!("p{p}"), percentile(&sorted, p / 100.0)))
        .collect();

    let throughput = if latency.total > 0.0 {
        latency.count as f64 / (latency.total / 1000.0)
    } else {
        0.0
    };

    PerformanceMetrics {
        targets_met: TargetsMet {
            latency: latency.count > 0 && latency.p95 <= config.target_latency_ms,
            throughput: throughput >= config.target_throughput,
        },
        latency,
        percentiles,
        throughput,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replica_faults::{FaultInjectionConfig, FaultInjectionEngine, FaultScenario, FaultType};
    use replica_model::{FixedRandom, Node, RandomSource, Workflow};
    use replica_twin::DigitalTwinConfig;
    use serde_json::json;

    async fn setup() -> (SimulationEngine, String) {
        let rng: Arc<dyn RandomSource> = Arc::new(FixedRandom(0.5));
        let faults = Arc::new(FaultInjectionEngine::new(
            FaultInjectionConfig::default(),
            Arc::clone(&rng),
        ));
        let twins = Arc::new(DigitalTwinManager::new(DigitalTwinConfig::default(), faults, rng));
        let workflow = Workflow::new("wf", "chain")
            .with_node(Node::new("trigger", "trigger"))
            .with_node(Node::new("fetch", "httpRequest"))
            .with_node(Node::new("shape", "transform"))
            .with_edge("trigger", "fetch")
            .with_edge("fetch", "shape");
        let twin = twins.create_twin(&workflow).await;
        (SimulationEngine::new(twins), twin.id)
    }

    fn failing() -> SimulationOptions {
        SimulationOptions::default().with_faults(vec![FaultScenario::new("fetch", FaultType::ApiError)])
    }

    /// Every run holds its slot for the capped one-second fault sleep.
    fn slow() -> SimulationOptions {
        SimulationOptions::default()
            .with_faults(vec![FaultScenario::new("fetch", FaultType::SlowResponse)])
    }

    #[tokio::test]
    async fn parallel_results_map_to_requests() {
        let (engine, twin) = setup().await;
        let mut requests: Vec<SimulationRequest> = (0..5)
            .map(|i| SimulationRequest::new(&twin, json!({"i": i})))
            .collect();
        requests.push(SimulationRequest::new("missing", json!({})));
        let mut expected: Vec<String> = requests.iter().map(|r| r.id.clone()).collect();

        let (items, peak) = engine.fan_out(requests, 2).await.unwrap();
        let mut got: Vec<String> = items.iter().map(|i| i.request_id.clone()).collect();
        expected.sort();
        got.sort();

        assert_eq!(got, expected);
        assert!(peak <= 2);
        assert_eq!(items.iter().filter(|i| i.is_success()).count(), 5);
        assert!(items
            .iter()
            .any(|i| i.error.as_deref().is_some_and(|e| e.contains("twin not found"))));
    }

    #[tokio::test]
    async fn zero_ceiling_is_rejected() {
        let (engine, twin) = setup().await;
        let err = engine
            .run_parallel_simulations(vec![SimulationRequest::new(&twin, json!({}))], 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn cancelled_runner_issues_nothing() {
        let (engine, twin) = setup().await;
        engine.cancel();
        let items = engine
            .run_parallel_simulations(
                (0..3).map(|_| SimulationRequest::new(&twin, json!({}))).collect(),
                2,
            )
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert!(items.iter().all(|i| i.error.as_deref() == Some(CANCELLED)));
        assert_eq!(engine.twins().get_twin(&twin).await.unwrap().execution_count, 0);

        engine.resume();
        let items = engine
            .run_parallel_simulations(vec![SimulationRequest::new(&twin, json!({}))], 1)
            .await
            .unwrap();
        assert!(items[0].is_success());
    }

    #[tokio::test(start_paused = true)]
    async fn load_test_paces_issues() {
        let (engine, twin) = setup().await;
        let report = engine
            .run_load_test(
                &twin,
                json!({}),
                SimulationOptions::default(),
                &LoadTestConfig::new(2, 10.0, 1_000).with_ramp_up(500),
            )
            .await
            .unwrap();

        assert_eq!(report.results.len(), 10);
        assert!((report.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn load_ramp_keeps_peak_within_ceiling() {
        let (engine, twin) = setup().await;
        let report = engine
            .run_load_test(
                &twin,
                json!({}),
                slow(),
                &LoadTestConfig::new(3, 50.0, 2_000).with_ramp_up(1_000),
            )
            .await
            .unwrap();

        assert_eq!(report.peak_concurrency, 3);
        assert!(report.results.len() > 3);
        assert!(report.results.iter().all(BatchItem::is_success));
    }

    #[tokio::test(start_paused = true)]
    async fn extreme_rate_load_is_capped() {
        let (engine, twin) = setup().await;
        let report = engine
            .run_load_test(
                &twin,
                json!({}),
                SimulationOptions::default(),
                &LoadTestConfig::new(2, 1e10, 10),
            )
            .await
            .unwrap();
        assert!(!report.results.is_empty());
        assert!(report.results.len() <= 10);

        let err = engine
            .run_performance_test(
                &twin,
                json!({}),
                SimulationOptions::default(),
                &PerformanceTestConfig::new(100.0, 1e-30, 10),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_mid_run_drains_admitted_work() {
        let (engine, twin) = setup().await;
        let config = LoadTestConfig::new(2, 10.0, 60_000);
        let start = Instant::now();

        let (report, ()) = tokio::join!(
            engine.run_load_test(&twin, json!({}), slow(), &config),
            async {
                sleep(Duration::from_millis(250)).await;
                engine.cancel();
            }
        );
        let report = report.unwrap();

        // Two runs were admitted before the cancel; the third was still
        // waiting for a permit and never started.
        assert_eq!(report.results.len(), 2);
        assert!(report.results.iter().all(BatchItem::is_success));
        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(engine.twins().get_twin(&twin).await.unwrap().execution_count, 2);
        assert!(engine.is_cancelled());
    }

    #[test]
    fn ramp_grows_linearly() {
        let ramp = Duration::from_millis(1_000);
        assert_eq!(ramp_target(Duration::ZERO, ramp, 10), 1);
        assert_eq!(ramp_target(Duration::from_millis(450), ramp, 10), 5);
        assert_eq!(ramp_target(Duration::from_millis(2_000), ramp, 10), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn stress_reports_breaking_point() {
        let (engine, twin) = setup().await;

        let calm = engine
            .run_stress_test(
                &twin,
                json!({}),
                SimulationOptions::default(),
                &StressTestConfig::new(4, 0.5, 300),
            )
            .await
            .unwrap();
        assert_eq!(calm.results.len(), 1 + 2 + 4);
        assert_eq!(calm.peak_concurrency, 4);
        assert_eq!(calm.breaking_point, None);

        let broken = engine
            .run_stress_test(&twin, json!({}), failing(), &StressTestConfig::new(4, 0.5, 300))
            .await
            .unwrap();
        assert_eq!(broken.breaking_point, Some(1));
        assert!(broken.waves.iter().all(|w| (w.failure_rate - 1.0).abs() < f64::EPSILON));
    }

    #[tokio::test(start_paused = true)]
    async fn chaos_runs_exact_iterations() {
        let (engine, twin) = setup().await;
        let config = ChaosTestConfig::new(
            0.5,
            10,
            vec![
                FaultScenario::new("fetch", FaultType::SlowResponse),
                FaultScenario::new("shape", FaultType::DataCorruption),
            ],
        )
        .with_fault_types(vec![FaultType::SlowResponse]);

        let report = engine
            .run_chaos_test(&twin, json!({}), SimulationOptions::default(), &config)
            .await
            .unwrap();

        assert_eq!(report.results.len(), 10);
        assert_eq!(report.faults_injected, 10);
        assert_eq!(report.faults_recovered, 10);
        assert!((report.batch.success_rate - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn performance_targets_are_flagged() {
        let (engine, twin) = setup().await;
        let report = engine
            .run_performance_test(
                &twin,
                json!({}),
                SimulationOptions::default(),
                &PerformanceTestConfig::new(1_000.0, 5.0, 1_000),
            )
            .await
            .unwrap();

        let metrics = &report.performance_metrics;
        assert_eq!(report.results.len(), 5);
        assert!(metrics.targets_met.all());
        assert!(metrics.percentiles.contains_key("p95"));

        // 76ms per run cannot sustain 100 runs per second.
        let strict = measure(&report.results, &PerformanceTestConfig::new(10.0, 100.0, 1_000));
        assert!(!strict.targets_met.latency);
        assert!(!strict.targets_met.throughput);
    }

    #[tokio::test]
    async fn unknown_twin_fails_fast() {
        let (engine, _) = setup().await;
        let err = engine
            .run_chaos_test(
                "missing",
                json!({}),
                SimulationOptions::default(),
                &ChaosTestConfig::new(0.5, 3, Vec::new()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Twin(replica_twin::Error::TwinNotFound(_))));
    }
}
