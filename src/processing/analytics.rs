//! Distribution statistics over retained operation durations.
//!
//! Percentiles use the nearest-rank method over the sorted sample.

use std::time::Instant;

use serde::Serialize;

/// Samples needed before a trend is reported.
pub const MIN_TREND_SAMPLES: usize = 4;
/// Relative change in mean treated as a real shift.
pub const TREND_THRESHOLD: f64 = 0.10;

/// One completed operation duration.
#[derive(Debug, Clone, Copy)]
pub(crate) struct DurationSample {
    pub recorded: Instant,
    pub duration_ms: f64,
    pub success: bool,
}

/// Direction of recent durations relative to older ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Degrading,
    InsufficientData,
}

impl Trend {
    /// Compares the mean of the newest quarter (at least one sample) with
    /// the mean of the rest. `samples` are oldest first.
    pub fn detect(samples: &[f64]) -> Self {
        if samples.len() < MIN_TREND_SAMPLES {
            return Trend::InsufficientData;
        }

        let recent_len = (samples.len() / 4).max(1);
        let (older, recent) = samples.split_at(samples.len() - recent_len);
        let older_mean = mean(older);
        let recent_mean = mean(recent);

        if older_mean <= 0.0 {
            return if recent_mean > 0.0 {
                Trend::Degrading
            } else {
                Trend::Stable
            };
        }

        let change = (recent_mean - older_mean) / older_mean;
        if change > TREND_THRESHOLD {
            Trend::Degrading
        } else if change < -TREND_THRESHOLD {
            Trend::Improving
        } else {
            Trend::Stable
        }
    }
}

/// Duration distribution in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DurationStats {
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub p50: f64,
    pub p90: f64,
    pub p95: f64,
}

impl DurationStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }

        let mut sorted = samples.to_vec();
        sorted.sort_by(f64::total_cmp);

        Self {
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            avg: mean(&sorted),
            p50: percentile(&sorted, 50.0),
            p90: percentile(&sorted, 90.0),
            p95: percentile(&sorted, 95.0),
        }
    }
}

/// Analytics for one operation type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationAnalytics {
    pub operation_type: String,
    pub total_operations: usize,
    pub success_rate: f64,
    pub duration: DurationStats,
    pub trend: Trend,
}

impl OperationAnalytics {
    pub(crate) fn compute(operation_type: &str, samples: &[DurationSample]) -> Self {
        let durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
        let successes = samples.iter().filter(|s| s.success).count();
        let success_rate = if samples.is_empty() {
            0.0
        } else {
            successes as f64 / samples.len() as f64
        };

        Self {
            operation_type: operation_type.to_string(),
            total_operations: samples.len(),
            success_rate,
            duration: DurationStats::from_samples(&durations),
            trend: Trend::detect(&durations),
        }
    }
}

/// Nearest-rank percentile of an ascending slice; 0 when empty.
pub fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
