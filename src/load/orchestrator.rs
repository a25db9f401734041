use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::catalog::{ScenarioDefinition, ScenarioKey, scenario};
use crate::cleanup::{CleanupLedger, delete_handle};
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{ApiRequest, RequestExecutor};
use crate::progress::ProgressChannel;
use crate::run::{self, Run, RunId, RunKind, RunState, RunStatus};
use crate::sink::ResultSink;

use super::collector::{CollectorEvent, spawn_collector};
use super::stats::compute_summary;
use super::types::{CallDisposition, LoadSummary};
use super::worker::{WorkerContext, build_row, run_worker};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    /// Scenario units to execute (one unit = one full step chain).
    pub total_units: usize,
    /// Fixed virtual-worker pool size.
    pub concurrency: usize,
    /// Window over which workers are released linearly.
    pub ramp_up: Duration,
    /// Selected scenarios, interleaved round-robin across units.
    pub scenarios: Vec<ScenarioKey>,
}

impl LoadTestConfig {
    /// Rejects configurations that cannot start. Surfaced before any
    /// run row exists.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for zero units, zero concurrency, or an
    /// empty scenario selection.
    pub fn validate(&self) -> AppResult<()> {
        if self.total_units == 0 {
            return Err(AppError::config(ConfigError::ZeroUnits));
        }
        if self.concurrency == 0 {
            return Err(AppError::config(ConfigError::ZeroConcurrency));
        }
        if self.scenarios.is_empty() {
            return Err(AppError::config(ConfigError::NoScenarios));
        }
        Ok(())
    }
}

/// Drives a pool of concurrent virtual workers through scenario step
/// chains, with guaranteed cleanup of every resource the run creates.
pub struct LoadOrchestrator {
    executor: Arc<dyn RequestExecutor>,
    sink: Arc<dyn ResultSink>,
    progress: Arc<dyn ProgressChannel>,
}

impl LoadOrchestrator {
    #[must_use]
    pub fn new(
        executor: Arc<dyn RequestExecutor>,
        sink: Arc<dyn ResultSink>,
        progress: Arc<dyn ProgressChannel>,
    ) -> Self {
        Self {
            executor,
            sink,
            progress,
        }
    }

    /// Starts a load run. Returns once the run row is persisted;
    /// execution continues on the returned handle.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the configuration cannot start a
    /// run, or a sink error when the run row cannot be recorded.
    pub async fn start(
        &self,
        target: &str,
        config: LoadTestConfig,
    ) -> AppResult<(RunId, JoinHandle<AppResult<LoadSummary>>)> {
        config.validate()?;

        let run_id = RunId::new();
        let run = Run::started(run_id.clone(), RunKind::Load, target);
        self.sink.insert_run(&run).await?;
        let state = run::register(&run_id);

        let task = RunTask {
            executor: Arc::clone(&self.executor),
            sink: Arc::clone(&self.sink),
            progress: Arc::clone(&self.progress),
            state,
            config,
        };
        let handle = tokio::spawn(task.run());
        Ok((run_id, handle))
    }
}

struct RunTask {
    executor: Arc<dyn RequestExecutor>,
    sink: Arc<dyn ResultSink>,
    progress: Arc<dyn ProgressChannel>,
    state: Arc<RunState>,
    config: LoadTestConfig,
}

impl RunTask {
    async fn run(self) -> AppResult<LoadSummary> {
        let run_id = self.state.run_id().clone();
        let result = self.execute().await;
        run::deregister(&run_id);
        if result.is_err() {
            if let Err(finalize_err) = self
                .sink
                .finalize_run(&run_id, RunStatus::Failed, None)
                .await
            {
                warn!(run_id = %run_id, error = %finalize_err, "failed to mark run as failed");
            }
        }
        result
    }

    async fn execute(&self) -> AppResult<LoadSummary> {
        let run_id = self.state.run_id().clone();
        let definitions: Arc<Vec<ScenarioDefinition>> =
            Arc::new(self.config.scenarios.iter().copied().map(scenario).collect());

        // Round-robin interleave: unit i runs scenarios[i % len], so the
        // progress total is the exact sum of each claimed unit's chain.
        let total_primary: usize = (0..self.config.total_units)
            .map(|unit| {
                let slot = unit.checked_rem(definitions.len()).unwrap_or(0);
                definitions
                    .get(slot)
                    .map_or(0, ScenarioDefinition::primary_calls)
            })
            .sum();

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let collector = spawn_collector(
            run_id.clone(),
            total_primary,
            Arc::clone(&self.progress),
            events_rx,
        );

        let ledger = Arc::new(CleanupLedger::new());
        let claim = Arc::new(AtomicUsize::new(0));
        let next_index = Arc::new(AtomicU64::new(0));
        let run_start = Instant::now();

        let mut workers = Vec::with_capacity(self.config.concurrency);
        for worker_id in 0..self.config.concurrency {
            let ctx = WorkerContext {
                worker_id,
                run_id: run_id.clone(),
                executor: Arc::clone(&self.executor),
                sink: Arc::clone(&self.sink),
                state: Arc::clone(&self.state),
                scenarios: Arc::clone(&definitions),
                total_units: self.config.total_units,
                claim: Arc::clone(&claim),
                next_index: Arc::clone(&next_index),
                ledger: Arc::clone(&ledger),
                events: events_tx.clone(),
                ramp_delay: ramp_delay(self.config.ramp_up, worker_id, self.config.concurrency),
            };
            workers.push(tokio::spawn(run_worker(ctx)));
        }

        for worker in workers {
            worker.await?;
        }

        // Teardown flush: whatever is still pending across all workers
        // gets deleted before the run is finalized, cancelled or not.
        drop(events_tx.send(CollectorEvent::Phase("cleanup")).await);
        self.flush_pending(&run_id, &ledger, &next_index, &events_tx)
            .await;
        drop(events_tx);
        collector.await?;

        let rows = self.sink.load_results(&run_id).await?;
        let total_duration_ms =
            u64::try_from(run_start.elapsed().as_millis()).unwrap_or(u64::MAX);
        let summary = compute_summary(&rows, total_duration_ms);

        let status = if self.state.is_cancelled() {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        let summary_json = serde_json::to_string(&summary)?;
        self.sink
            .finalize_run(&run_id, status, Some(summary_json))
            .await?;
        info!(
            run_id = %run_id,
            status = status.as_str(),
            requests = summary.total_requests,
            error_rate = summary.error_rate,
            "load run finished",
        );
        Ok(summary)
    }

    async fn flush_pending(
        &self,
        run_id: &RunId,
        ledger: &CleanupLedger,
        next_index: &AtomicU64,
        events_tx: &mpsc::Sender<CollectorEvent>,
    ) {
        let pending = ledger.drain();
        if pending.is_empty() {
            return;
        }
        info!(run_id = %run_id, resources = pending.len(), "flushing pending cleanup handles");
        for handle in pending {
            let attempt = delete_handle(self.executor.as_ref(), handle).await;
            let request = ApiRequest::delete(attempt.handle.delete_path());
            let index = next_index.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            let row = build_row(
                run_id,
                index,
                &request,
                &attempt.outcome,
                CallDisposition::Cleanup,
            );
            if !row.success {
                warn!(
                    run_id = %run_id,
                    id = %attempt.handle.id,
                    "teardown cleanup delete failed",
                );
            }
            if let Err(err) = self.sink.append_load_result(&row).await {
                warn!(run_id = %run_id, error = %err, "failed to persist cleanup row");
            }
            drop(
                events_tx
                    .send(CollectorEvent::Call {
                        disposition: CallDisposition::Cleanup,
                        success: row.success,
                        duration_ms: row.duration_ms,
                    })
                    .await,
            );
        }
    }
}

/// Worker *k* of *n* is released at `k * (ramp / n)` so active
/// concurrency grows roughly linearly over the ramp window.
pub(super) fn ramp_delay(ramp_up: Duration, worker_id: usize, concurrency: usize) -> Duration {
    if ramp_up.is_zero() || concurrency == 0 {
        return Duration::ZERO;
    }
    ramp_up.mul_f64(worker_id as f64 / concurrency as f64)
}
