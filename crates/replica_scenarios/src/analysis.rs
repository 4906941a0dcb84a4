//! Reduction of scenario executions into metrics, a verdict and insights.

#![allow(clippy::cast_precision_loss)]

use crate::result::{Insight, InsightSeverity, ScenarioMetrics, ScenarioStatus};
use crate::scenario::ScenarioType;
use replica_model::DurationSummary;
use replica_runner::{BatchItem, PerformanceMetrics};

/// Load runs pass at or above this success rate.
pub const LOAD_PASS_RATE: f64 = 0.95;
/// Stress runs pass at or below this error rate.
pub const STRESS_MAX_ERROR_RATE: f64 = 0.5;
/// Chaos runs pass at or above this recovery rate.
pub const CHAOS_PASS_RECOVERY: f64 = 0.7;
/// Chaos recovery at or above this rate is called out as resilient.
pub const CHAOS_STRONG_RECOVERY: f64 = 0.9;
/// Error rate above which a run is critically unreliable.
pub const CRITICAL_ERROR_RATE: f64 = 0.5;
/// p95 latency above which a run is flagged slow.
pub const SLOW_P95_MS: f64 = 10_000.0;

/// Raw output of a scenario handler, before reduction.
#[derive(Debug, Default)]
pub(crate) struct RunOutcome {
    pub executions: Vec<BatchItem>,
    pub breaking_point: Option<usize>,
    pub performance: Option<PerformanceOutcome>,
}

/// Performance measurements with the targets they were checked against.
#[derive(Debug)]
pub(crate) struct PerformanceOutcome {
    pub metrics: PerformanceMetrics,
    pub target_latency_ms: f64,
    pub target_throughput: f64,
}

/// Reduces executions into scenario metrics.
#[must_use]
pub fn compute_metrics(executions: &[BatchItem]) -> ScenarioMetrics {
    let total = executions.len();
    let successful = executions.iter().filter(|e| e.is_success()).count();
    let durations: Vec<f64> = executions
        .iter()
        .filter_map(|e| e.result.as_ref().map(|r| r.duration_ms))
        .collect();
    let summary = DurationSummary::from_samples(&durations);
    let rate = |n: usize| if total == 0 { 0.0 } else { n as f64 / total as f64 };

    ScenarioMetrics {
        total_executions: total,
        successful_executions: successful,
        failed_executions: total - successful,
        avg_duration: summary.avg,
        min_duration: summary.min,
        max_duration: summary.max,
        p50_duration: summary.p50,
        p95_duration: summary.p95,
        p99_duration: summary.p99,
        throughput: if summary.total > 0.0 {
            total as f64 / (summary.total / 1000.0)
        } else {
            0.0
        },
        error_rate: rate(total - successful),
        fault_recovery_rate: rate(successful),
    }
}

/// Applies the pass rule for the scenario type.
pub(crate) fn determine_status(
    scenario_type: ScenarioType,
    metrics: &ScenarioMetrics,
    outcome: &RunOutcome,
) -> ScenarioStatus {
    match scenario_type {
        ScenarioType::GoldenPath | ScenarioType::EdgeCases => {
            if metrics.failed_executions == 0 {
                ScenarioStatus::Passed
            } else {
                ScenarioStatus::Partial
            }
        }
        ScenarioType::LoadTesting => {
            let success_rate = 1.0 - metrics.error_rate;
            if metrics.total_executions > 0 && success_rate >= LOAD_PASS_RATE {
                ScenarioStatus::Passed
            } else {
                ScenarioStatus::Failed
            }
        }
        ScenarioType::StressTesting => {
            if metrics.error_rate <= STRESS_MAX_ERROR_RATE {
                ScenarioStatus::Passed
            } else {
                ScenarioStatus::Failed
            }
        }
        ScenarioType::ChaosTesting => {
            if metrics.fault_recovery_rate >= CHAOS_PASS_RECOVERY {
                ScenarioStatus::Passed
            } else {
                ScenarioStatus::Partial
            }
        }
        ScenarioType::PerformanceTesting => {
            if outcome
                .performance
                .as_ref()
                .is_some_and(|p| p.metrics.targets_met.all())
            {
                ScenarioStatus::Passed
            } else {
                ScenarioStatus::Failed
            }
        }
    }
}

/// Derives threshold-based insights.
pub(crate) fn generate_insights(
    scenario_type: ScenarioType,
    metrics: &ScenarioMetrics,
    outcome: &RunOutcome,
) -> Vec<Insight> {
    let mut insights = Vec::new();

    if metrics.total_executions > 0 && metrics.failed_executions == 0 {
        insights.push(Insight::new(
            InsightSeverity::Info,
            "reliability",
            format!("All {} executions succeeded", metrics.total_executions),
        ));
    } else if metrics.error_rate > CRITICAL_ERROR_RATE {
        insights.push(
            Insight::new(
                InsightSeverity::Critical,
                "reliability",
                format!("Error rate is {:.1}%", metrics.error_rate * 100.0),
            )
            .with_suggestion(
                "Inspect failing nodes and add retries or continueOnError where failures are tolerable",
            ),
        );
    } else if metrics.failed_executions > 0 {
        insights.push(Insight::new(
            InsightSeverity::Medium,
            "reliability",
            format!(
                "{} of {} executions failed",
                metrics.failed_executions, metrics.total_executions
            ),
        ));
    }

    if metrics.p95_duration > SLOW_P95_MS {
        insights.push(
            Insight::new(
                InsightSeverity::High,
                "latency",
                format!("p95 duration is {:.0}ms", metrics.p95_duration),
            )
            .with_suggestion("Add timeouts to slow external calls or cache their responses"),
        );
    }

    match scenario_type {
        ScenarioType::StressTesting => {
            if let Some(level) = outcome.breaking_point {
                insights.push(
                    Insight::new(
                        InsightSeverity::High,
                        "capacity",
                        format!("Failure rate exceeded the target at concurrency {level}"),
                    )
                    .with_suggestion("Throttle callers below this concurrency or add capacity"),
                );
            }
        }
        ScenarioType::ChaosTesting => insights.push(chaos_insight(metrics.fault_recovery_rate)),
        ScenarioType::PerformanceTesting => {
            if let Some(perf) = &outcome.performance {
                insights.extend(performance_insights(perf));
            }
        }
        _ => {}
    }
    insights
}

fn chaos_insight(recovery: f64) -> Insight {
    let percent = recovery * 100.0;
    if recovery >= CHAOS_STRONG_RECOVERY {
        Insight::new(
            InsightSeverity::Info,
            "resilience",
            format!("Workflow recovered from {percent:.0}% of chaos runs"),
        )
    } else if recovery >= CHAOS_PASS_RECOVERY {
        Insight::new(
            InsightSeverity::Medium,
            "resilience",
            format!("Workflow recovered from {percent:.0}% of chaos runs"),
        )
        .with_suggestion("Add retries with backoff to the nodes that failed most often")
    } else {
        Insight::new(
            InsightSeverity::Critical,
            "resilience",
            format!("Workflow recovered from only {percent:.0}% of chaos runs"),
        )
        .with_suggestion("Add error handling, fallbacks and circuit breakers around external calls")
    }
}

fn performance_insights(perf: &PerformanceOutcome) -> Vec<Insight> {
    let mut insights = Vec::new();
    if !perf.metrics.targets_met.throughput {
        insights.push(
            Insight::new(
                InsightSeverity::High,
                "throughput",
                format!(
                    "Throughput {:.2}/s is below the target of {:.2}/s",
                    perf.metrics.throughput, perf.target_throughput
                ),
            )
            .with_suggestion("Parallelise independent branches or reduce per-node latency"),
        );
    }
    if !perf.metrics.targets_met.latency {
        insights.push(
            Insight::new(
                InsightSeverity::High,
                "latency",
                format!(
                    "p95 latency {:.0}ms exceeds the target of {:.0}ms",
                    perf.metrics.latency.p95, perf.target_latency_ms
                ),
            )
            .with_suggestion("Profile the slowest nodes in the execution path"),
        );
    }
    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    fn errored(n: usize) -> Vec<BatchItem> {
        (0..n)
            .map(|i| BatchItem {
                request_id: i.to_string(),
                result: None,
                error: Some("boom".into()),
            })
            .collect()
    }

    #[test]
    fn all_failures_are_critical() {
        let executions = errored(4);
        let metrics = compute_metrics(&executions);
        assert!((metrics.error_rate - 1.0).abs() < f64::EPSILON);
        assert!(metrics.throughput.abs() < f64::EPSILON);

        let outcome = RunOutcome {
            executions,
            ..RunOutcome::default()
        };
        let insights = generate_insights(ScenarioType::StressTesting, &metrics, &outcome);
        assert_eq!(insights[0].severity, InsightSeverity::Critical);
        assert_eq!(
            determine_status(ScenarioType::StressTesting, &metrics, &outcome),
            ScenarioStatus::Failed
        );
        assert_eq!(
            determine_status(ScenarioType::GoldenPath, &metrics, &outcome),
            ScenarioStatus::Partial
        );
    }

    #[test]
    fn chaos_thresholds() {
        assert_eq!(chaos_insight(1.0).severity, InsightSeverity::Info);
        assert_eq!(chaos_insight(0.8).severity, InsightSeverity::Medium);
        assert_eq!(chaos_insight(0.5).severity, InsightSeverity::Critical);
    }

    #[test]
    fn empty_run_is_zeroed() {
        let metrics = compute_metrics(&[]);
        assert_eq!(metrics, ScenarioMetrics::default());
        assert_eq!(
            determine_status(ScenarioType::LoadTesting, &metrics, &RunOutcome::default()),
            ScenarioStatus::Failed
        );
    }
}
