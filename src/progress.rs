//! Fire-and-forget progress reporting. The engine publishes snapshots
//! into a [`ProgressChannel`] and never blocks on, or retries for,
//! whatever is listening.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::run::RunId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationProgress {
    pub run_id: RunId,
    pub current_test: String,
    pub current_category: String,
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadProgress {
    pub run_id: RunId,
    pub phase: String,
    pub completed: usize,
    pub total: usize,
    pub current_rps: f64,
    pub avg_latency_ms: f64,
    pub error_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProgressSnapshot {
    Validation(ValidationProgress),
    Load(LoadProgress),
}

impl ProgressSnapshot {
    #[must_use]
    pub fn run_id(&self) -> &RunId {
        match self {
            ProgressSnapshot::Validation(progress) => &progress.run_id,
            ProgressSnapshot::Load(progress) => &progress.run_id,
        }
    }
}

/// At-least-once, unacknowledged delivery to an external subscriber.
pub trait ProgressChannel: Send + Sync {
    fn publish(&self, snapshot: ProgressSnapshot);
}

/// Logs snapshots through `tracing`; the default channel for CLI runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressChannel for LogProgress {
    fn publish(&self, snapshot: ProgressSnapshot) {
        match &snapshot {
            ProgressSnapshot::Validation(progress) => debug!(
                run_id = %progress.run_id,
                category = %progress.current_category,
                test = %progress.current_test,
                completed = progress.completed,
                total = progress.total,
                "validation progress",
            ),
            ProgressSnapshot::Load(progress) => debug!(
                run_id = %progress.run_id,
                phase = %progress.phase,
                completed = progress.completed,
                total = progress.total,
                rps = progress.current_rps,
                avg_latency_ms = progress.avg_latency_ms,
                errors = progress.error_count,
                "load progress",
            ),
        }
    }
}

/// Fans snapshots out over a tokio broadcast channel. Sends into a
/// channel with no live receivers are silently dropped.
#[derive(Debug, Clone)]
pub struct BroadcastProgress {
    sender: broadcast::Sender<ProgressSnapshot>,
}

impl BroadcastProgress {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ProgressSnapshot> {
        self.sender.subscribe()
    }
}

impl ProgressChannel for BroadcastProgress {
    fn publish(&self, snapshot: ProgressSnapshot) {
        drop(self.sender.send(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AppError, AppResult};

    #[test]
    fn broadcast_delivers_to_subscribers() -> AppResult<()> {
        let channel = BroadcastProgress::new(8);
        let mut receiver = channel.subscribe();
        let run_id = RunId::new();
        channel.publish(ProgressSnapshot::Validation(ValidationProgress {
            run_id: run_id.clone(),
            current_test: "GET /Schemas".to_owned(),
            current_category: "schema_discovery".to_owned(),
            completed: 0,
            total: 3,
        }));

        let snapshot = receiver
            .try_recv()
            .map_err(|err| AppError::engine(format!("No snapshot: {}", err)))?;
        if snapshot.run_id() != &run_id {
            return Err(AppError::engine("Wrong run id"));
        }
        Ok(())
    }

    #[test]
    fn publish_without_subscribers_is_silent() {
        let channel = BroadcastProgress::new(1);
        channel.publish(ProgressSnapshot::Load(LoadProgress {
            run_id: RunId::new(),
            phase: "running".to_owned(),
            completed: 1,
            total: 10,
            current_rps: 2.0,
            avg_latency_ms: 15.0,
            error_count: 0,
        }));
    }
}
