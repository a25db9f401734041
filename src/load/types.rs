use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::run::RunId;

/// How a row entered the result stream. Only `Primary` calls count
/// toward throughput and error-rate statistics; `Cleanup` deletes and
/// `Skipped` step slots are recorded for the report but never billed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CallDisposition {
    Primary,
    Cleanup,
    Skipped,
}

impl CallDisposition {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CallDisposition::Primary => "primary",
            CallDisposition::Cleanup => "cleanup",
            CallDisposition::Skipped => "skipped",
        }
    }

    /// Parses the persisted representation.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` for values not produced by [`Self::as_str`].
    pub fn parse(value: &str) -> Result<Self, SinkError> {
        match value {
            "primary" => Ok(CallDisposition::Primary),
            "cleanup" => Ok(CallDisposition::Cleanup),
            "skipped" => Ok(CallDisposition::Skipped),
            other => Err(SinkError::InvalidColumn {
                column: "disposition",
                value: other.to_owned(),
            }),
        }
    }
}

/// One executed (or skipped) HTTP call, immutable once written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadResult {
    pub id: String,
    pub run_id: RunId,
    pub request_index: u64,
    pub method: String,
    pub url: String,
    pub request_body: Option<String>,
    pub status_code: Option<u16>,
    pub duration_ms: u64,
    pub success: bool,
    pub error_message: Option<String>,
    pub disposition: CallDisposition,
    pub timestamp: DateTime<Utc>,
}

impl LoadResult {
    #[must_use]
    pub fn is_billable(&self) -> bool {
        self.disposition == CallDisposition::Primary
    }
}

/// Final statistics over a run's billable calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSummary {
    pub total_requests: usize,
    pub successful: usize,
    pub failed: usize,
    pub error_rate: f64,
    pub total_duration_ms: u64,
    pub min_latency_ms: u64,
    pub max_latency_ms: u64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p75_latency_ms: u64,
    pub p90_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
    pub requests_per_second: f64,
    pub status_code_distribution: BTreeMap<u16, u64>,
}
