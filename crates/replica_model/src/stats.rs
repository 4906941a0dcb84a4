//! Duration statistics.

use serde::{Deserialize, Serialize};

/// Returns the sample at index `floor(n * pct)` of an ascending slice,
/// clamped to the last element. `pct` is a fraction in `[0, 1]`.
///
/// Returns `0.0` for an empty slice.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64) * pct.clamp(0.0, 1.0)).floor() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Distribution summary of a set of durations (milliseconds).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DurationSummary {
    /// Number of samples.
    pub count: usize,
    /// Smallest sample.
    pub min: f64,
    /// Largest sample.
    pub max: f64,
    /// Arithmetic mean.
    pub avg: f64,
    /// Sum of all samples.
    pub total: f64,
    /// 50th percentile.
    pub p50: f64,
    /// 95th percentile.
    pub p95: f64,
    /// 99th percentile.
    pub p99: f64,
}

impl DurationSummary {
    /// Summarises samples in any order.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);
        let total: f64 = sorted.iter().sum();

        Self {
            count: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            avg: total / sorted.len() as f64,
            total,
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ten() -> Vec<f64> {
        (1..=10).map(|i| f64::from(i) * 100.0).collect()
    }

    #[test]
    fn percentiles_index_by_floor() {
        let sorted = ten();
        assert!((percentile(&sorted, 0.50) - 600.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 0.95) - 1000.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 1.0) - 1000.0).abs() < f64::EPSILON);
        assert!((percentile(&sorted, 0.0) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn summary_sorts_input() {
        let mut samples = ten();
        samples.reverse();
        let summary = DurationSummary::from_samples(&samples);
        assert_eq!(summary.count, 10);
        assert!((summary.min - 100.0).abs() < f64::EPSILON);
        assert!((summary.max - 1000.0).abs() < f64::EPSILON);
        assert!((summary.avg - 550.0).abs() < f64::EPSILON);
        assert!((summary.p99 - 1000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_summary_is_zero() {
        assert_eq!(DurationSummary::from_samples(&[]), DurationSummary::default());
        assert!(percentile(&[], 0.5).abs() < f64::EPSILON);
    }
}
