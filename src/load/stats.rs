use std::collections::BTreeMap;

use super::types::{LoadResult, LoadSummary};

const PERCENT: f64 = 100.0;
const MS_PER_SEC: f64 = 1000.0;

/// Selects `d[min(floor(n * quantile), n - 1)]` from an
/// ascending-sorted slice. Every percentile value is therefore a
/// member of the input set.
#[must_use]
pub fn percentile(sorted: &[u64], quantile: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let raw_index = (sorted.len() as f64 * quantile).floor() as usize;
    let index = raw_index.min(sorted.len().saturating_sub(1));
    sorted.get(index).copied().unwrap_or(0)
}

/// Computes the final summary over a run's rows. Only billable
/// (primary) calls enter the counts, latency distribution, error rate,
/// and throughput; cleanup and skipped rows are ignored here.
#[must_use]
pub fn compute_summary(results: &[LoadResult], total_duration_ms: u64) -> LoadSummary {
    let billable: Vec<&LoadResult> = results.iter().filter(|row| row.is_billable()).collect();

    let total_requests = billable.len();
    let successful = billable.iter().filter(|row| row.success).count();
    let failed = total_requests.saturating_sub(successful);
    let error_rate = if total_requests > 0 {
        failed as f64 / total_requests as f64 * PERCENT
    } else {
        0.0
    };

    let mut durations: Vec<u64> = billable.iter().map(|row| row.duration_ms).collect();
    durations.sort_unstable();

    let min_latency_ms = durations.first().copied().unwrap_or(0);
    let max_latency_ms = durations.last().copied().unwrap_or(0);
    let avg_latency_ms = if durations.is_empty() {
        0.0
    } else {
        durations.iter().sum::<u64>() as f64 / durations.len() as f64
    };

    let requests_per_second = throughput(&billable);

    let mut status_code_distribution: BTreeMap<u16, u64> = BTreeMap::new();
    for row in &billable {
        if let Some(code) = row.status_code {
            let entry = status_code_distribution.entry(code).or_insert(0);
            *entry = entry.saturating_add(1);
        }
    }

    LoadSummary {
        total_requests,
        successful,
        failed,
        error_rate,
        total_duration_ms,
        min_latency_ms,
        max_latency_ms,
        avg_latency_ms,
        p50_latency_ms: percentile(&durations, 0.50),
        p75_latency_ms: percentile(&durations, 0.75),
        p90_latency_ms: percentile(&durations, 0.90),
        p95_latency_ms: percentile(&durations, 0.95),
        p99_latency_ms: percentile(&durations, 0.99),
        requests_per_second,
        status_code_distribution,
    }
}

/// `n / span` over the billable timestamps; a zero span (near-instant
/// run) degrades to `n` rather than dividing by zero.
fn throughput(billable: &[&LoadResult]) -> f64 {
    if billable.is_empty() {
        return 0.0;
    }
    let timestamps: Vec<i64> = billable
        .iter()
        .map(|row| row.timestamp.timestamp_millis())
        .collect();
    let min_ts = timestamps.iter().min().copied().unwrap_or(0);
    let max_ts = timestamps.iter().max().copied().unwrap_or(0);
    let span_ms = max_ts.saturating_sub(min_ts);
    if span_ms > 0 {
        billable.len() as f64 / (span_ms as f64 / MS_PER_SEC)
    } else {
        billable.len() as f64
    }
}
