use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SinkError;
use crate::run::RunId;

/// Outcome of one executed (or skipped) validation case. Skipped is a
/// first-class outcome: it never issued an HTTP call and is excluded
/// from the compliance-score denominator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CaseOutcome {
    Passed,
    Failed,
    Skipped,
}

impl CaseOutcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CaseOutcome::Passed => "passed",
            CaseOutcome::Failed => "failed",
            CaseOutcome::Skipped => "skipped",
        }
    }

    /// Parses the persisted representation.
    ///
    /// # Errors
    ///
    /// Returns a `SinkError` for values not produced by [`Self::as_str`].
    pub fn parse(value: &str) -> Result<Self, SinkError> {
        match value {
            "passed" => Ok(CaseOutcome::Passed),
            "failed" => Ok(CaseOutcome::Failed),
            "skipped" => Ok(CaseOutcome::Skipped),
            other => Err(SinkError::InvalidColumn {
                column: "outcome",
                value: other.to_owned(),
            }),
        }
    }

    /// Whether this outcome counts toward the compliance denominator.
    #[must_use]
    pub const fn is_scored(self) -> bool {
        !matches!(self, CaseOutcome::Skipped)
    }
}

/// One executed case, immutable once written to the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub id: String,
    pub run_id: RunId,
    pub case_key: String,
    pub test_name: String,
    pub category: String,
    pub method: String,
    pub url: String,
    pub request_body: Option<String>,
    pub response_status: Option<u16>,
    pub response_body: Option<String>,
    pub duration_ms: u64,
    pub outcome: CaseOutcome,
    pub failure_reason: Option<String>,
    pub executed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySummary {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Derived from the run's rows; never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub compliance_score: f64,
    pub duration_ms: u64,
    pub categories: Vec<CategorySummary>,
}
