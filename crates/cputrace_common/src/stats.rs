//! Statistics Engine: the aggregate and detailed passes over a trace's
//! samples, plus the severity bands renderers use for coloring.
//!
//! Percentiles are nearest-rank: the element at index `floor(q * N)` of the
//! ascending-sorted CPU values, clamped to the last element. No
//! interpolation is applied, so a reported percentile is always a value
//! that actually occurred. This differs from the linear-interpolation
//! definition some statistics libraries use.

use serde::{Deserialize, Serialize};

use crate::trace::Sample;

/// Default spike threshold in standard deviations above the mean.
const DEFAULT_SPIKE_SIGMA: f64 = 2.0;
/// Default severity band boundaries, in CPU percent.
const DEFAULT_ELEVATED_PCT: f64 = 50.0;
const DEFAULT_CRITICAL_PCT: f64 = 80.0;

/// Tunable thresholds for spike detection and severity bands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct StatsConfig {
    /// A sample is a spike when `cpu_pct > mean + spike_sigma * stddev`.
    pub spike_sigma: f64,
    /// CPU percent above which a value is `Elevated`.
    pub elevated_pct: f64,
    /// CPU percent above which a value is `Critical`.
    pub critical_pct: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            spike_sigma: DEFAULT_SPIKE_SIGMA,
            elevated_pct: DEFAULT_ELEVATED_PCT,
            critical_pct: DEFAULT_CRITICAL_PCT,
        }
    }
}

/// O(1)-sized aggregate computed once at ingestion and stored with the
/// trace, so list views never walk the samples again.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TraceSummary {
    pub cpu_avg: f64,
    pub cpu_max: f64,
    pub sample_count: usize,
}

impl TraceSummary {
    /// Single O(n) traversal, no sorting.
    ///
    /// With no samples, `cpu_avg` and `cpu_max` are 0.0 and `sample_count`
    /// is 0. `sample_count == 0` is the no-data marker: callers must check
    /// it instead of presenting the zeros as measurements.
    pub fn from_samples(samples: &[Sample]) -> Self {
        if samples.is_empty() {
            return Self {
                cpu_avg: 0.0,
                cpu_max: 0.0,
                sample_count: 0,
            };
        }

        let mut sum = 0.0;
        let mut max = f64::NEG_INFINITY;
        for sample in samples {
            sum += sample.cpu_pct;
            if sample.cpu_pct > max {
                max = sample.cpu_pct;
            }
        }

        Self {
            cpu_avg: sum / samples.len() as f64,
            cpu_max: max,
            sample_count: samples.len(),
        }
    }

    pub fn has_data(&self) -> bool {
        self.sample_count > 0
    }
}

/// On-demand statistics for the detail view. Recomputed on every read,
/// never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetailedStats {
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
    pub mean: f64,
    pub stddev: f64,
    /// The cutoff spikes were judged against: `mean + spike_sigma * stddev`.
    pub spike_threshold: f64,
    /// Samples exceeding the threshold, in original trace order.
    pub spikes: Vec<Sample>,
}

impl DetailedStats {
    /// Compute the detailed pass.
    ///
    /// Returns `None` for an empty sequence so no-data never turns into
    /// NaN downstream. Mean and stddev (population: divide by N) are taken
    /// over the unsorted sequence; sorting is only for percentile
    /// extraction. Spikes keep their full sample, not just the CPU value.
    pub fn compute(samples: &[Sample], config: &StatsConfig) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<f64> = samples.iter().map(|s| s.cpu_pct).collect();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let n = samples.len() as f64;
        let mean = samples.iter().map(|s| s.cpu_pct).sum::<f64>() / n;
        let variance = samples
            .iter()
            .map(|s| {
                let d = s.cpu_pct - mean;
                d * d
            })
            .sum::<f64>()
            / n;
        let stddev = variance.sqrt();

        let spike_threshold = mean + config.spike_sigma * stddev;
        let spikes: Vec<Sample> = samples
            .iter()
            .filter(|s| s.cpu_pct > spike_threshold)
            .cloned()
            .collect();

        Some(Self {
            p50: percentile(&sorted, 0.50),
            p95: percentile(&sorted, 0.95),
            p99: percentile(&sorted, 0.99),
            mean,
            stddev,
            spike_threshold,
            spikes,
        })
    }
}

/// Nearest-rank percentile from an ascending-sorted sequence.
///
/// Index is `floor(q * N)`, clamped to `N-1`; for q close to 1 and small N
/// the raw index can land one past the end.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 * q).floor() as usize).min(sorted.len() - 1);
    sorted[idx]
}

/// Severity band for a CPU percentage.
///
/// Boundary values belong to the lower band: exactly `elevated_pct` is
/// still `Normal`, exactly `critical_pct` is still `Elevated`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Normal,
    Elevated,
    Critical,
}

impl Severity {
    pub fn classify(cpu_pct: f64, config: &StatsConfig) -> Self {
        if cpu_pct > config.critical_pct {
            Self::Critical
        } else if cpu_pct > config.elevated_pct {
            Self::Elevated
        } else {
            Self::Normal
        }
    }

    /// ANSI color code used by terminal renderers.
    pub fn color(&self) -> &'static str {
        match self {
            Self::Normal => "\x1b[32m",
            Self::Elevated => "\x1b[33m",
            Self::Critical => "\x1b[31m",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
        }
    }
}
