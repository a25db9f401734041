use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval};

use crate::progress::{LoadProgress, ProgressChannel, ProgressSnapshot};
use crate::run::RunId;

use super::types::CallDisposition;

pub(super) const SNAPSHOT_INTERVAL: Duration = Duration::from_millis(500);
/// Trailing window for the live request-rate estimate.
const RATE_WINDOW: Duration = Duration::from_secs(2);

#[derive(Debug)]
pub(super) enum CollectorEvent {
    Call {
        disposition: CallDisposition,
        success: bool,
        duration_ms: u64,
    },
    Phase(&'static str),
}

/// Aggregates per-call events from the workers and publishes a
/// progress snapshot on every interval tick plus one final snapshot
/// when the event stream closes. Only billable calls move `completed`.
pub(super) fn spawn_collector(
    run_id: RunId,
    total: usize,
    progress: Arc<dyn ProgressChannel>,
    mut events_rx: mpsc::Receiver<CollectorEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut completed = 0usize;
        let mut error_count = 0usize;
        let mut latency_sum: u128 = 0;
        let mut window: VecDeque<Instant> = VecDeque::new();
        let mut phase = "running";

        let mut ticker = interval(SNAPSHOT_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let publish = |progress: &Arc<dyn ProgressChannel>,
                       phase: &str,
                       completed: usize,
                       error_count: usize,
                       latency_sum: u128,
                       window: &mut VecDeque<Instant>| {
            let now = Instant::now();
            while let Some(front) = window.front() {
                if now.duration_since(*front) > RATE_WINDOW {
                    window.pop_front();
                } else {
                    break;
                }
            }
            let current_rps = window.len() as f64 / RATE_WINDOW.as_secs_f64();
            let avg_latency_ms = if completed > 0 {
                latency_sum as f64 / completed as f64
            } else {
                0.0
            };
            progress.publish(ProgressSnapshot::Load(LoadProgress {
                run_id: run_id.clone(),
                phase: phase.to_owned(),
                completed,
                total,
                current_rps,
                avg_latency_ms,
                error_count,
            }));
        };

        loop {
            tokio::select! {
                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(CollectorEvent::Call { disposition, success, duration_ms }) => {
                            if disposition == CallDisposition::Primary {
                                completed = completed.saturating_add(1);
                                latency_sum = latency_sum.saturating_add(u128::from(duration_ms));
                                if !success {
                                    error_count = error_count.saturating_add(1);
                                }
                                window.push_back(Instant::now());
                            }
                        }
                        Some(CollectorEvent::Phase(next_phase)) => {
                            phase = next_phase;
                        }
                        None => break,
                    }
                },
                _ = ticker.tick() => {
                    publish(&progress, phase, completed, error_count, latency_sum, &mut window);
                },
            }
        }

        publish(
            &progress,
            phase,
            completed,
            error_count,
            latency_sum,
            &mut window,
        );
    })
}
