use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::Method;

use super::*;
use crate::catalog::ScenarioKey;
use crate::error::{AppError, AppResult, TransportError};
use crate::http::{ApiRequest, ApiResponse, RequestExecutor};
use crate::progress::{BroadcastProgress, LogProgress, ProgressSnapshot};
use crate::run::{self, RunId, RunStatus};
use crate::sink::{MemorySink, ResultSink};
use crate::test_support::{FakeScim, FakeScimOptions};

fn run_async_test<F>(future: F) -> AppResult<()>
where
    F: std::future::Future<Output = AppResult<()>>,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(future)
}

fn engine(scim: &Arc<FakeScim>) -> (LoadOrchestrator, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::new());
    let orchestrator = LoadOrchestrator::new(
        Arc::clone(scim) as Arc<dyn RequestExecutor>,
        Arc::clone(&sink) as Arc<dyn ResultSink>,
        Arc::new(LogProgress),
    );
    (orchestrator, sink)
}

fn config(units: usize, concurrency: usize, scenarios: &[ScenarioKey]) -> LoadTestConfig {
    LoadTestConfig {
        total_units: units,
        concurrency,
        ramp_up: Duration::ZERO,
        scenarios: scenarios.to_vec(),
    }
}

fn billable_row(duration_ms: u64, success: bool, ts_offset_ms: i64) -> LoadResult {
    LoadResult {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: RunId::new(),
        request_index: 0,
        method: "POST".to_owned(),
        url: "/Users".to_owned(),
        request_body: None,
        status_code: Some(if success { 201 } else { 500 }),
        duration_ms,
        success,
        error_message: None,
        disposition: CallDisposition::Primary,
        timestamp: Utc
            .timestamp_millis_opt(1_700_000_000_000_i64.saturating_add(ts_offset_ms))
            .single()
            .unwrap_or_else(Utc::now),
    }
}

#[test]
fn percentiles_use_the_floor_index_rule() -> AppResult<()> {
    let durations: Vec<u64> = vec![10, 20, 30, 40, 50, 60, 70, 80, 90, 100];
    if percentile(&durations, 0.50) != 60 {
        return Err(AppError::engine(format!("p50 = {}", percentile(&durations, 0.50))));
    }
    if percentile(&durations, 0.95) != 100 {
        return Err(AppError::engine(format!("p95 = {}", percentile(&durations, 0.95))));
    }
    if percentile(&durations, 0.99) != 100 {
        return Err(AppError::engine(format!("p99 = {}", percentile(&durations, 0.99))));
    }
    if percentile(&[], 0.5) != 0 {
        return Err(AppError::engine("Empty set should yield 0"));
    }
    Ok(())
}

#[test]
fn percentiles_are_ordered_members_of_the_duration_set() -> AppResult<()> {
    let rows: Vec<LoadResult> = [3_u64, 14, 1, 58, 9, 26, 5, 35, 89, 79, 2, 6]
        .iter()
        .enumerate()
        .map(|(index, &duration)| billable_row(duration, true, index as i64))
        .collect();
    let summary = compute_summary(&rows, 1_000);

    if !(summary.p50_latency_ms <= summary.p95_latency_ms
        && summary.p95_latency_ms <= summary.p99_latency_ms)
    {
        return Err(AppError::engine("Percentiles out of order"));
    }
    let durations: Vec<u64> = rows.iter().map(|row| row.duration_ms).collect();
    for value in [
        summary.p50_latency_ms,
        summary.p75_latency_ms,
        summary.p90_latency_ms,
        summary.p95_latency_ms,
        summary.p99_latency_ms,
    ] {
        if !durations.contains(&value) {
            return Err(AppError::engine(format!("{} not in the duration set", value)));
        }
    }
    Ok(())
}

#[test]
fn summary_counts_only_billable_rows() -> AppResult<()> {
    let mut rows = vec![
        billable_row(10, true, 0),
        billable_row(20, false, 100),
        billable_row(30, true, 200),
    ];
    let mut cleanup = billable_row(99, true, 300);
    cleanup.disposition = CallDisposition::Cleanup;
    rows.push(cleanup);
    let mut skipped = billable_row(0, false, 400);
    skipped.disposition = CallDisposition::Skipped;
    rows.push(skipped);

    let summary = compute_summary(&rows, 500);
    if summary.total_requests != 3 || summary.successful != 2 || summary.failed != 1 {
        return Err(AppError::engine(format!(
            "Got {}/{}/{}",
            summary.total_requests, summary.successful, summary.failed
        )));
    }
    if (summary.error_rate - 100.0 / 3.0).abs() > 0.01 {
        return Err(AppError::engine(format!("error_rate = {}", summary.error_rate)));
    }
    if summary.max_latency_ms != 30 {
        return Err(AppError::engine("Cleanup latency leaked into the stats"));
    }
    if summary.status_code_distribution.get(&201).copied() != Some(2) {
        return Err(AppError::engine("Status histogram should count billable rows"));
    }
    Ok(())
}

#[test]
fn zero_timestamp_span_degrades_to_n() -> AppResult<()> {
    let rows = vec![
        billable_row(5, true, 0),
        billable_row(6, true, 0),
        billable_row(7, true, 0),
    ];
    let summary = compute_summary(&rows, 0);
    if (summary.requests_per_second - 3.0).abs() > f64::EPSILON {
        return Err(AppError::engine(format!("rps = {}", summary.requests_per_second)));
    }
    Ok(())
}

#[test]
fn invalid_configs_cannot_start() -> AppResult<()> {
    run_async_test(async {
        let scim = Arc::new(FakeScim::compliant());
        let (orchestrator, _sink) = engine(&scim);
        for bad in [
            config(0, 10, &[ScenarioKey::CreateUsers]),
            config(10, 0, &[ScenarioKey::CreateUsers]),
            config(10, 10, &[]),
        ] {
            if orchestrator.start("acme", bad).await.is_ok() {
                return Err(AppError::engine("Expected a ConfigError"));
            }
        }
        if !scim.calls().is_empty() {
            return Err(AppError::engine("No HTTP calls before a run starts"));
        }
        Ok(())
    })
}

#[test]
fn create_users_run_bills_creates_and_records_cleanup() -> AppResult<()> {
    run_async_test(async {
        let scim = Arc::new(FakeScim::compliant());
        let (orchestrator, sink) = engine(&scim);

        let (run_id, handle) = orchestrator
            .start("acme", config(50, 10, &[ScenarioKey::CreateUsers]))
            .await?;
        let summary = handle.await??;

        if summary.total_requests != 50 || summary.successful != 50 {
            return Err(AppError::engine(format!(
                "Got {}/{} billable",
                summary.total_requests, summary.successful
            )));
        }
        if summary.error_rate.abs() > f64::EPSILON {
            return Err(AppError::engine(format!("error_rate = {}", summary.error_rate)));
        }

        let rows = sink.load_results(&run_id).await?;
        let cleanup_rows = rows
            .iter()
            .filter(|row| row.disposition == CallDisposition::Cleanup)
            .count();
        if cleanup_rows != 50 {
            return Err(AppError::engine(format!("Expected 50 cleanup rows, got {}", cleanup_rows)));
        }
        if rows.len() != 100 {
            return Err(AppError::engine(format!("Expected 100 rows, got {}", rows.len())));
        }

        if scim.calls_matching(&Method::DELETE, "/Users/") != 50 {
            return Err(AppError::engine("Each create needs exactly one delete"));
        }
        if scim.live_resources() != 0 {
            return Err(AppError::engine("Load run leaked resources"));
        }

        let run = sink.run(&run_id).await?;
        if run.status != RunStatus::Completed {
            return Err(AppError::engine("Run should be completed"));
        }
        Ok(())
    })
}

#[test]
fn failed_creates_skip_dependent_steps() -> AppResult<()> {
    run_async_test(async {
        let scim = Arc::new(FakeScim::new(FakeScimOptions {
            fail_creates: true,
            latency_ms: 1,
            ..FakeScimOptions::default()
        }));
        let (orchestrator, sink) = engine(&scim);

        let (run_id, handle) = orchestrator
            .start("acme", config(5, 2, &[ScenarioKey::UserLifecycle]))
            .await?;
        let summary = handle.await??;

        // Only the failed creates are billable; reads and deletes are
        // recorded as skipped slots without any HTTP call.
        if summary.total_requests != 5 || summary.failed != 5 {
            return Err(AppError::engine(format!(
                "Got {}/{} billable",
                summary.total_requests, summary.failed
            )));
        }
        let rows = sink.load_results(&run_id).await?;
        let skipped = rows
            .iter()
            .filter(|row| row.disposition == CallDisposition::Skipped)
            .count();
        if skipped != 10 {
            return Err(AppError::engine(format!("Expected 10 skipped rows, got {}", skipped)));
        }
        if scim.calls_matching(&Method::GET, "/Users/") != 0
            || scim.calls_matching(&Method::DELETE, "/Users/") != 0
        {
            return Err(AppError::engine("Skipped steps must not issue calls"));
        }
        Ok(())
    })
}

#[test]
fn scenarios_interleave_round_robin() -> AppResult<()> {
    run_async_test(async {
        let scim = Arc::new(FakeScim::compliant());
        let (orchestrator, sink) = engine(&scim);

        let (run_id, handle) = orchestrator
            .start(
                "acme",
                config(4, 2, &[ScenarioKey::CreateUsers, ScenarioKey::UserLifecycle]),
            )
            .await?;
        let summary = handle.await??;

        // Units 0 and 2 are one-call creates; units 1 and 3 are
        // three-call lifecycles: 8 billable calls in total.
        if summary.total_requests != 8 {
            return Err(AppError::engine(format!("Got {} billable", summary.total_requests)));
        }
        let rows = sink.load_results(&run_id).await?;
        let cleanup_rows = rows
            .iter()
            .filter(|row| row.disposition == CallDisposition::Cleanup)
            .count();
        // Lifecycle units delete in-chain; only the bare creates need
        // a cleanup delete.
        if cleanup_rows != 2 {
            return Err(AppError::engine(format!("Expected 2 cleanup rows, got {}", cleanup_rows)));
        }
        if scim.live_resources() != 0 {
            return Err(AppError::engine("Round-robin run leaked resources"));
        }
        Ok(())
    })
}

/// Delays every call so cancellation can land mid-run.
struct SlowExecutor {
    inner: Arc<FakeScim>,
    delay: Duration,
}

#[async_trait]
impl RequestExecutor for SlowExecutor {
    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, TransportError> {
        tokio::time::sleep(self.delay).await;
        self.inner.execute(request).await
    }
}

#[test]
fn cancellation_stops_claiming_and_still_flushes_cleanup() -> AppResult<()> {
    run_async_test(async {
        let scim = Arc::new(FakeScim::compliant());
        let sink = Arc::new(MemorySink::new());
        let executor = Arc::new(SlowExecutor {
            inner: Arc::clone(&scim),
            delay: Duration::from_millis(2),
        });
        let orchestrator = LoadOrchestrator::new(
            executor,
            Arc::clone(&sink) as Arc<dyn ResultSink>,
            Arc::new(LogProgress),
        );

        let (run_id, handle) = orchestrator
            .start("acme", config(500, 4, &[ScenarioKey::CreateUsers]))
            .await?;
        tokio::time::sleep(Duration::from_millis(25)).await;
        run::stop(&run_id);
        let summary = handle.await??;

        let run = sink.run(&run_id).await?;
        if run.status != RunStatus::Cancelled {
            return Err(AppError::engine("Expected cancelled status"));
        }
        if summary.total_requests >= 500 {
            return Err(AppError::engine("Cancellation should stop new units"));
        }

        // Cleanup completeness holds for cancelled runs too: exactly
        // one delete attempt per successful create.
        let creates = scim.calls_matching(&Method::POST, "/Users");
        let deletes = scim.calls_matching(&Method::DELETE, "/Users/");
        if creates != deletes {
            return Err(AppError::engine(format!(
                "{} creates vs {} deletes",
                creates, deletes
            )));
        }
        if scim.live_resources() != 0 {
            return Err(AppError::engine("Cancelled run leaked resources"));
        }
        Ok(())
    })
}

#[test]
fn ramp_delay_spreads_workers_linearly() -> AppResult<()> {
    let ramp = Duration::from_secs(10);
    let tolerance = Duration::from_millis(1);
    for worker in 0..10 {
        let delay = super::orchestrator::ramp_delay(ramp, worker, 10);
        let expected = Duration::from_secs(worker as u64);
        let drift = delay.abs_diff(expected);
        if drift > tolerance {
            return Err(AppError::engine(format!("Worker {} delay {:?}", worker, delay)));
        }
    }
    if super::orchestrator::ramp_delay(Duration::ZERO, 3, 10) != Duration::ZERO {
        return Err(AppError::engine("Zero ramp should not delay anyone"));
    }
    Ok(())
}

#[test]
fn membership_churn_cleans_up_both_resources() -> AppResult<()> {
    run_async_test(async {
        let scim = Arc::new(FakeScim::compliant());
        let (orchestrator, sink) = engine(&scim);

        let (run_id, handle) = orchestrator
            .start("acme", config(3, 2, &[ScenarioKey::MembershipChurn]))
            .await?;
        let summary = handle.await??;

        // 4 primary calls per unit, all against a compliant target.
        if summary.total_requests != 12 || summary.failed != 0 {
            return Err(AppError::engine(format!(
                "Got {}/{} billable",
                summary.total_requests, summary.failed
            )));
        }
        let rows = sink.load_results(&run_id).await?;
        let cleanup_rows = rows
            .iter()
            .filter(|row| row.disposition == CallDisposition::Cleanup)
            .count();
        // One user and one group per unit, neither deleted in-chain.
        if cleanup_rows != 6 {
            return Err(AppError::engine(format!("Expected 6 cleanup rows, got {}", cleanup_rows)));
        }
        if scim.live_resources() != 0 {
            return Err(AppError::engine("Churn run leaked resources"));
        }
        Ok(())
    })
}

#[test]
fn final_progress_snapshot_reports_every_billable_call() -> AppResult<()> {
    run_async_test(async {
        let scim = Arc::new(FakeScim::compliant());
        let sink = Arc::new(MemorySink::new());
        let channel = BroadcastProgress::new(64);
        let mut receiver = channel.subscribe();
        let orchestrator = LoadOrchestrator::new(
            Arc::clone(&scim) as Arc<dyn RequestExecutor>,
            Arc::clone(&sink) as Arc<dyn ResultSink>,
            Arc::new(channel),
        );

        let (_run_id, handle) = orchestrator
            .start("acme", config(10, 4, &[ScenarioKey::CreateUsers]))
            .await?;
        handle.await??;

        let mut last_completed = 0usize;
        let mut last_snapshot = None;
        while let Ok(snapshot) = receiver.try_recv() {
            let ProgressSnapshot::Load(progress) = snapshot else {
                return Err(AppError::engine("Unexpected snapshot kind"));
            };
            if progress.completed < last_completed {
                return Err(AppError::engine("Progress went backwards"));
            }
            last_completed = progress.completed;
            last_snapshot = Some(progress);
        }
        let last = last_snapshot.ok_or_else(|| AppError::engine("No snapshots received"))?;
        if last.completed != 10 || last.total != 10 {
            return Err(AppError::engine(format!(
                "Final snapshot {}/{}",
                last.completed, last.total
            )));
        }
        Ok(())
    })
}
