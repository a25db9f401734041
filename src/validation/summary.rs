use std::collections::BTreeMap;

use super::types::{CaseOutcome, CategorySummary, ValidationResult, ValidationSummary};

const PERCENT: f64 = 100.0;

/// Folds a run's rows into the compliance summary. The score counts
/// only passed and failed cases; skipped rows stay in the report but
/// never dilute the denominator.
#[must_use]
pub fn compute_summary(results: &[ValidationResult]) -> ValidationSummary {
    let total = results.len();
    let passed = count_outcome(results, CaseOutcome::Passed);
    let failed = count_outcome(results, CaseOutcome::Failed);
    let skipped = count_outcome(results, CaseOutcome::Skipped);

    let scored = passed.saturating_add(failed);
    let compliance_score = if scored > 0 {
        passed as f64 / scored as f64 * PERCENT
    } else {
        0.0
    };

    let duration_ms = results.iter().map(|row| row.duration_ms).sum();

    let mut by_category: BTreeMap<&str, CategorySummary> = BTreeMap::new();
    for row in results {
        let entry = by_category
            .entry(row.category.as_str())
            .or_insert_with(|| CategorySummary {
                name: row.category.clone(),
                total: 0,
                passed: 0,
                failed: 0,
                skipped: 0,
            });
        entry.total = entry.total.saturating_add(1);
        match row.outcome {
            CaseOutcome::Passed => entry.passed = entry.passed.saturating_add(1),
            CaseOutcome::Failed => entry.failed = entry.failed.saturating_add(1),
            CaseOutcome::Skipped => entry.skipped = entry.skipped.saturating_add(1),
        }
    }

    ValidationSummary {
        total,
        passed,
        failed,
        skipped,
        compliance_score,
        duration_ms,
        categories: by_category.into_values().collect(),
    }
}

fn count_outcome(results: &[ValidationResult], outcome: CaseOutcome) -> usize {
    results.iter().filter(|row| row.outcome == outcome).count()
}
