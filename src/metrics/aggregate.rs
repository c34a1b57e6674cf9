use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::domain::{RequestResult, RunState, TestRun, serialize_secs};

use super::LatencyHistogram;

/// Latency distribution over every collected result, failures included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct LatencyStats {
    #[serde(serialize_with = "serialize_secs")]
    pub mean: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub median: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub min: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub max: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub p90: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub p95: Duration,
    #[serde(serialize_with = "serialize_secs")]
    pub p99: Duration,
}

/// Read-only statistics derived from a `TestRun`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    pub state: RunState,
    pub planned: u64,
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub success_rate: f64,
    pub latency: LatencyStats,
    /// Code 0 counts every request that never got an HTTP response.
    pub status_codes: BTreeMap<u16, u64>,
    pub errors: BTreeMap<String, u64>,
    #[serde(serialize_with = "serialize_secs")]
    pub elapsed: Duration,
    pub throughput_rps: f64,
}

/// Computes the summary of `run`. Never mutates the run; equal inputs give
/// equal outputs.
#[must_use]
pub fn aggregate(run: &TestRun) -> Aggregate {
    let total = count_u64(run.results.len());
    let successful = count_u64(run.results.iter().filter(|result| result.success).count());

    let mut status_codes = BTreeMap::new();
    let mut errors = BTreeMap::new();
    for result in &run.results {
        increment(&mut status_codes, result.status_code);
        if let Some(kind) = result.error {
            increment(&mut errors, kind.as_str().to_owned());
        }
    }

    Aggregate {
        state: run.state,
        planned: run.config.requests,
        total,
        successful,
        failed: total.saturating_sub(successful),
        success_rate: percentage(successful, total),
        latency: latency_stats(&run.results),
        status_codes,
        errors,
        elapsed: run.elapsed,
        throughput_rps: per_second(total, run.elapsed),
    }
}

fn latency_stats(results: &[RequestResult]) -> LatencyStats {
    let mut latencies: Vec<Duration> = results.iter().map(|result| result.latency).collect();
    latencies.sort_unstable();

    let (Some(&min), Some(&max)) = (latencies.first(), latencies.last()) else {
        return LatencyStats::default();
    };

    let count = latencies.len();
    let sum_nanos = latencies
        .iter()
        .fold(0u128, |acc, latency| acc.saturating_add(latency.as_nanos()));
    let mean_nanos = sum_nanos
        .checked_div(u128::try_from(count).unwrap_or(u128::MAX))
        .unwrap_or(0);
    let mean = Duration::from_nanos(u64::try_from(mean_nanos).unwrap_or(u64::MAX));

    let mid = count / 2;
    let median = if count % 2 == 1 {
        latencies.get(mid).copied().unwrap_or_default()
    } else {
        let upper = latencies.get(mid).copied().unwrap_or_default();
        let lower = latencies
            .get(mid.saturating_sub(1))
            .copied()
            .unwrap_or_default();
        lower
            .saturating_add(upper)
            .checked_div(2)
            .unwrap_or_default()
    };

    let (p90, p95, p99) = tail_latencies(&latencies);

    LatencyStats {
        mean,
        median,
        min,
        max,
        p90,
        p95,
        p99,
    }
}

fn tail_latencies(latencies: &[Duration]) -> (Duration, Duration, Duration) {
    let Ok(mut histogram) = LatencyHistogram::new() else {
        return (Duration::ZERO, Duration::ZERO, Duration::ZERO);
    };
    for latency in latencies {
        if histogram.record(*latency).is_err() {
            return (Duration::ZERO, Duration::ZERO, Duration::ZERO);
        }
    }
    (
        histogram.value_at_quantile(0.90),
        histogram.value_at_quantile(0.95),
        histogram.value_at_quantile(0.99),
    )
}

fn increment<K: Ord>(map: &mut BTreeMap<K, u64>, key: K) {
    let count = map.entry(key).or_insert(0);
    *count = count.saturating_add(1);
}

fn count_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[expect(
    clippy::float_arithmetic,
    reason = "success rate is reported as a percentage"
)]
fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

#[expect(
    clippy::float_arithmetic,
    reason = "throughput is reported as requests per second"
)]
fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    count as f64 / secs
}
