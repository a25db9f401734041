//! Run identity and per-run mutable state. Each in-flight run owns one
//! [`RunState`] held in a process-wide registry keyed by run id; the
//! entry is created at run start and removed once the run reaches a
//! terminal status.
mod registry;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SinkError;

pub use registry::{deregister, is_live, register, stop};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.0)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunKind {
    Validation,
    Load,
}

impl RunKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunKind::Validation => "validation",
            RunKind::Load => "load",
        }
    }

    /// Parses the persisted representation.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` for values not produced by [`Self::as_str`].
    pub fn parse(value: &str) -> Result<Self, SinkError> {
        match value {
            "validation" => Ok(RunKind::Validation),
            "load" => Ok(RunKind::Load),
            other => Err(SinkError::InvalidColumn {
                column: "kind",
                value: other.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    /// Parses the persisted representation.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` for values not produced by [`Self::as_str`].
    pub fn parse(value: &str) -> Result<Self, SinkError> {
        match value {
            "running" => Ok(RunStatus::Running),
            "completed" => Ok(RunStatus::Completed),
            "failed" => Ok(RunStatus::Failed),
            "cancelled" => Ok(RunStatus::Cancelled),
            other => Err(SinkError::InvalidColumn {
                column: "status",
                value: other.to_owned(),
            }),
        }
    }
}

/// One execution, as persisted in the result sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: RunId,
    pub kind: RunKind,
    pub target: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub summary_json: Option<String>,
}

impl Run {
    #[must_use]
    pub fn started(id: RunId, kind: RunKind, target: impl Into<String>) -> Self {
        Self {
            id,
            kind,
            target: target.into(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            completed_at: None,
            summary_json: None,
        }
    }
}

/// The single mutable object an orchestrator owns per in-flight run.
/// Cancellation is cooperative: workers poll the flag between steps
/// and never interrupt an in-flight call.
#[derive(Debug)]
pub struct RunState {
    run_id: RunId,
    cancel: AtomicBool,
}

impl RunState {
    #[must_use]
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            cancel: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn run_id(&self) -> &RunId {
        &self.run_id
    }

    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }
}
