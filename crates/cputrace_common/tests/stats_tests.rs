//! Tests for the statistics engine and severity bands.

use cputrace_common::stats::{DetailedStats, Severity, StatsConfig, TraceSummary};
use cputrace_common::trace::Sample;

fn samples_from(cpu: &[f64]) -> Vec<Sample> {
    cpu.iter()
        .enumerate()
        .map(|(i, &cpu_pct)| Sample {
            t: i as f64 * 0.5,
            cpu_pct,
            rss_kb: 1024 + i as u64,
            threads: 2,
        })
        .collect()
}

#[test]
fn test_summary_mean_and_max() {
    let samples = samples_from(&[10.0, 20.0, 30.0, 40.0]);
    let summary = TraceSummary::from_samples(&samples);

    assert_eq!(summary.sample_count, 4);
    assert!((summary.cpu_avg - 25.0).abs() < 1e-9);
    assert_eq!(summary.cpu_max, 40.0);
}

#[test]
fn test_summary_matches_independent_mean() {
    let cpu = [3.5, 81.25, 12.0, 47.9, 0.0, 66.6, 29.01];
    let samples = samples_from(&cpu);
    let summary = TraceSummary::from_samples(&samples);

    let expected = cpu.iter().sum::<f64>() / cpu.len() as f64;
    assert!((summary.cpu_avg - expected).abs() < 1e-9);
}

#[test]
fn test_summary_empty_reports_no_data() {
    let summary = TraceSummary::from_samples(&[]);

    assert_eq!(summary.sample_count, 0);
    assert!(!summary.has_data());
    assert_eq!(summary.cpu_avg, 0.0);
    assert_eq!(summary.cpu_max, 0.0);
    assert!(!summary.cpu_avg.is_nan());
}

#[test]
fn test_detailed_empty_is_none() {
    assert!(DetailedStats::compute(&[], &StatsConfig::default()).is_none());
}

#[test]
fn test_percentiles_nearest_rank() {
    // N=10, sorted 10..=100: index floor(q*10) -> p50 = sorted[5] = 60,
    // p95 and p99 clamp from index 9 to the last element.
    let samples = samples_from(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0]);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert_eq!(stats.p50, 60.0);
    assert_eq!(stats.p95, 100.0);
    assert_eq!(stats.p99, 100.0);
}

#[test]
fn test_percentiles_ignore_input_order() {
    let shuffled = samples_from(&[70.0, 10.0, 100.0, 40.0, 90.0, 20.0, 60.0, 30.0, 80.0, 50.0]);
    let stats = DetailedStats::compute(&shuffled, &StatsConfig::default()).unwrap();

    assert_eq!(stats.p50, 60.0);
    assert_eq!(stats.p95, 100.0);
}

#[test]
fn test_percentiles_monotonic_in_q() {
    let samples = samples_from(&[5.0, 1.0, 99.0, 42.0, 17.0, 63.0, 8.0]);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert!(stats.p50 <= stats.p95);
    assert!(stats.p95 <= stats.p99);
}

#[test]
fn test_single_sample_percentiles() {
    // For N=1 every index floors to 0 or clamps to 0.
    let samples = samples_from(&[73.0]);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert_eq!(stats.p50, 73.0);
    assert_eq!(stats.p95, 73.0);
    assert_eq!(stats.p99, 73.0);
}

#[test]
fn test_mean_and_population_stddev() {
    // Textbook population case: mean 5, stddev exactly 2 (divide by N).
    let samples = samples_from(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert!((stats.mean - 5.0).abs() < 1e-9);
    assert!((stats.stddev - 2.0).abs() < 1e-9);
}

#[test]
fn test_spike_detection() {
    let mut cpu = vec![10.0; 19];
    cpu.push(100.0);
    let samples = samples_from(&cpu);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert_eq!(stats.spikes.len(), 1);
    let spike = &stats.spikes[0];
    assert_eq!(spike.cpu_pct, 100.0);
    assert!(spike.cpu_pct > stats.spike_threshold);

    // The spike is the original sample, not a bare number.
    assert_eq!(spike.t, 19.0 * 0.5);
    assert_eq!(spike.rss_kb, 1024 + 19);
    assert_eq!(spike.threads, 2);
}

#[test]
fn test_spikes_are_subset_of_input() {
    let mut cpu = vec![10.0; 15];
    cpu.push(90.0);
    cpu.push(95.0);
    let samples = samples_from(&cpu);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert_eq!(stats.spikes.len(), 2);
    for spike in &stats.spikes {
        assert!(samples.contains(spike));
        assert!(spike.cpu_pct > stats.mean + 2.0 * stats.stddev);
    }
}

#[test]
fn test_constant_series_has_no_spikes() {
    // stddev 0 puts the threshold at the mean; cpu > mean is never true.
    let samples = samples_from(&[50.0; 12]);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert_eq!(stats.stddev, 0.0);
    assert!(stats.spikes.is_empty());
}

#[test]
fn test_spikes_keep_original_order() {
    let mut cpu = vec![10.0; 50];
    cpu[0] = 95.0;
    cpu[49] = 96.0;
    let samples = samples_from(&cpu);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    assert_eq!(stats.spikes.len(), 2);
    assert_eq!(stats.spikes[0].cpu_pct, 95.0);
    assert_eq!(stats.spikes[1].cpu_pct, 96.0);
}

#[test]
fn test_spike_sigma_configurable() {
    // [10,10,10,10,50]: mean 18, stddev 16. At 2.0 sigma the threshold is
    // exactly 50 and the strict > excludes the outlier; at 0.5 sigma it is
    // flagged.
    let samples = samples_from(&[10.0, 10.0, 10.0, 10.0, 50.0]);

    let strict = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();
    assert!(strict.spikes.is_empty());

    let loose = StatsConfig {
        spike_sigma: 0.5,
        ..StatsConfig::default()
    };
    let flagged = DetailedStats::compute(&samples, &loose).unwrap();
    assert_eq!(flagged.spikes.len(), 1);
}

#[test]
fn test_detailed_stats_idempotent() {
    let samples = samples_from(&[5.0, 1.0, 99.0, 42.0, 17.0, 63.0, 8.0]);
    let config = StatsConfig::default();

    let first = DetailedStats::compute(&samples, &config).unwrap();
    let second = DetailedStats::compute(&samples, &config).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_severity_boundaries() {
    let config = StatsConfig::default();

    assert_eq!(Severity::classify(49.9, &config), Severity::Normal);
    assert_eq!(Severity::classify(50.0, &config), Severity::Normal);
    assert_eq!(Severity::classify(50.1, &config), Severity::Elevated);
    assert_eq!(Severity::classify(80.0, &config), Severity::Elevated);
    assert_eq!(Severity::classify(80.1, &config), Severity::Critical);
}

#[test]
fn test_severity_custom_thresholds() {
    let config = StatsConfig {
        elevated_pct: 30.0,
        critical_pct: 60.0,
        ..StatsConfig::default()
    };

    assert_eq!(Severity::classify(30.0, &config), Severity::Normal);
    assert_eq!(Severity::classify(45.0, &config), Severity::Elevated);
    assert_eq!(Severity::classify(61.0, &config), Severity::Critical);
}

#[test]
fn test_summary_serialization() {
    let samples = samples_from(&[10.0, 30.0]);
    let summary = TraceSummary::from_samples(&samples);

    let json = serde_json::to_string(&summary).unwrap();
    let parsed: TraceSummary = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, summary);
}

#[test]
fn test_detailed_stats_serialization() {
    let samples = samples_from(&[10.0, 10.0, 10.0, 90.0, 10.0, 10.0, 10.0, 10.0]);
    let stats = DetailedStats::compute(&samples, &StatsConfig::default()).unwrap();

    let json = serde_json::to_string(&stats).unwrap();
    let parsed: DetailedStats = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, stats);
}
