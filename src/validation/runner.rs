use std::sync::Arc;

use chrono::Utc;
use reqwest::Method;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::catalog::{
    BodySpec, CaseAction, CatalogInputs, Category, Expectation, ValidationCase, cases_for,
};
use crate::cleanup::{CleanupLedger, flush_handles};
use crate::config::FieldMappingRule;
use crate::error::{AppError, AppResult, ConfigError};
use crate::http::{ApiRequest, ApiResponse, RequestExecutor};
use crate::progress::{ProgressChannel, ProgressSnapshot, ValidationProgress};
use crate::run::{self, Run, RunId, RunKind, RunState, RunStatus};
use crate::scim::{ResourceKind, extract_id};
use crate::sink::ResultSink;

use super::asserts::{Verdict, evaluate};
use super::context::ChainContext;
use super::discovery::discover_schema_attributes;
use super::mapping::validate_field_rule;
use super::summary::compute_summary;
use super::types::{CaseOutcome, ValidationResult, ValidationSummary};

const DEFAULT_USER_JOINING: &str = "userName";
const DEFAULT_GROUP_JOINING: &str = "displayName";

#[derive(Debug, Clone)]
pub struct ValidationRunConfig {
    pub categories: Vec<Category>,
    pub user_joining_property: String,
    pub group_joining_property: String,
    pub field_mapping_rules: Vec<FieldMappingRule>,
}

impl Default for ValidationRunConfig {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            user_joining_property: DEFAULT_USER_JOINING.to_owned(),
            group_joining_property: DEFAULT_GROUP_JOINING.to_owned(),
            field_mapping_rules: Vec::new(),
        }
    }
}

impl ValidationRunConfig {
    /// Rejects configurations that cannot start. Surfaced before any
    /// run row exists.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for an empty category selection or an
    /// ill-formed field-mapping rule.
    pub fn validate(&self) -> AppResult<()> {
        if self.categories.is_empty() {
            return Err(AppError::config(ConfigError::NoCategories));
        }
        for rule in &self.field_mapping_rules {
            rule.validate()?;
        }
        Ok(())
    }
}

/// Drives categorized, dependency-ordered conformance cases strictly
/// sequentially, then a best-effort cleanup pass over everything the
/// run created.
pub struct ValidationOrchestrator {
    executor: Arc<dyn RequestExecutor>,
    sink: Arc<dyn ResultSink>,
    progress: Arc<dyn ProgressChannel>,
}

impl ValidationOrchestrator {
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

    /// Starts a validation run. Returns once the run row is persisted;
    /// execution continues on the returned handle.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the configuration cannot start a
    /// run, or a sink error when the run row cannot be recorded.
    pub async fn start(
        &self,
        target: &str,
        config: ValidationRunConfig,
    ) -> AppResult<(RunId, JoinHandle<AppResult<ValidationSummary>>)> {
        config.validate()?;

        let run_id = RunId::new();
        let run = Run::started(run_id.clone(), RunKind::Validation, target);
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
    config: ValidationRunConfig,
}

impl RunTask {
    async fn run(self) -> AppResult<ValidationSummary> {
        let run_id = self.state.run_id().clone();
        let result = self.execute().await;
        run::deregister(&run_id);
        if result.is_err() {
            // Engine-level failure after start; best-effort terminal mark.
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

    async fn execute(&self) -> AppResult<ValidationSummary> {
        let run_id = self.state.run_id().clone();
        let categories = Category::ordered(&self.config.categories);

        // Custom-schema cases depend on a network discovery; resolve it
        // up front so the progress total is accurate from the start.
        let custom_attributes = if categories.contains(&Category::CustomSchema) {
            discover_schema_attributes(self.executor.as_ref()).await
        } else {
            Vec::new()
        };
        let inputs = CatalogInputs {
            field_mapping_rules: self.config.field_mapping_rules.clone(),
            custom_attributes,
        };

        let case_lists: Vec<(Category, Vec<ValidationCase>)> = categories
            .iter()
            .map(|&category| (category, cases_for(category, &inputs)))
            .collect();
        let total: usize = case_lists.iter().map(|(_, cases)| cases.len()).sum();

        let ledger = CleanupLedger::new();
        let mut executed = CaseLog::default();
        let mut completed = 0usize;
        let mut cancelled = false;

        'categories: for (category, cases) in &case_lists {
            let mut ctx = ChainContext::new(
                &self.config.user_joining_property,
                &self.config.group_joining_property,
            );
            for case in cases {
                if self.state.is_cancelled() {
                    cancelled = true;
                    break 'categories;
                }
                self.publish_progress(&run_id, case, completed, total);

                let row = self
                    .execute_case(&run_id, *category, case, &mut ctx, &executed, &ledger)
                    .await;
                executed.record(&case.key, row.outcome);
                self.append_row(&row).await;
                completed = completed.saturating_add(1);
            }
        }

        self.cleanup(&run_id, &ledger).await;

        let rows = self.sink.validation_results(&run_id).await?;
        let summary = compute_summary(&rows);
        let status = if cancelled {
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
            score = summary.compliance_score,
            "validation run finished",
        );
        Ok(summary)
    }

    fn publish_progress(&self, run_id: &RunId, case: &ValidationCase, completed: usize, total: usize) {
        self.progress
            .publish(ProgressSnapshot::Validation(ValidationProgress {
                run_id: run_id.clone(),
                current_test: case.name.clone(),
                current_category: case.category.as_str().to_owned(),
                completed,
                total,
            }));
    }

    async fn execute_case(
        &self,
        run_id: &RunId,
        category: Category,
        case: &ValidationCase,
        ctx: &mut ChainContext,
        executed: &CaseLog,
        ledger: &CleanupLedger,
    ) -> ValidationResult {
        // Dependency policy: a dependency that did not pass (failed or
        // itself skipped) skips this case without any HTTP call.
        if let Some(dep) = case.depends_on.as_deref()
            && executed.outcome_of(dep) != Some(CaseOutcome::Passed)
        {
            let reason = format!("dependency '{}' did not pass", dep);
            return skipped_row(run_id, category, case, &reason);
        }

        match &case.action {
            CaseAction::Note { message } => note_row(run_id, category, case, message),
            CaseAction::FieldRule { rule } => self.field_rule_row(run_id, category, case, ctx, rule),
            CaseAction::Http {
                method,
                path,
                query,
                body,
                expect,
            } => {
                self.http_case_row(
                    run_id,
                    category,
                    case,
                    ctx,
                    ledger,
                    method,
                    path,
                    query,
                    body,
                    expect,
                )
                .await
            }
        }
    }

    fn field_rule_row(
        &self,
        run_id: &RunId,
        category: Category,
        case: &ValidationCase,
        ctx: &ChainContext,
        rule: &FieldMappingRule,
    ) -> ValidationResult {
        let start = Instant::now();
        let (passed, failure) = match ctx.sample_user() {
            Some(user) => validate_field_rule(user, rule),
            None => (
                false,
                Some("No sample user available for field mapping validation".to_owned()),
            ),
        };
        let outcome = if passed {
            CaseOutcome::Passed
        } else {
            CaseOutcome::Failed
        };
        ValidationResult {
            id: uuid::Uuid::new_v4().to_string(),
            run_id: run_id.clone(),
            case_key: case.key.clone(),
            test_name: case.name.clone(),
            category: category.as_str().to_owned(),
            method: "GET".to_owned(),
            url: "/Users".to_owned(),
            request_body: None,
            response_status: None,
            response_body: ctx
                .sample_user()
                .map(|user| serde_json::to_string_pretty(user).unwrap_or_default()),
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            outcome,
            failure_reason: failure,
            executed_at: Utc::now(),
        }
    }

    #[expect(clippy::too_many_arguments, reason = "one call site in execute_case")]
    async fn http_case_row(
        &self,
        run_id: &RunId,
        category: Category,
        case: &ValidationCase,
        ctx: &mut ChainContext,
        ledger: &CleanupLedger,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        body: &BodySpec,
        expect: &Expectation,
    ) -> ValidationResult {
        let rendered_path = match ctx.render_path(path) {
            Ok(rendered) => rendered,
            Err(reason) => return skipped_row(run_id, category, case, &reason),
        };
        let rendered_body = match ctx.render_body(body) {
            Ok(rendered) => rendered,
            Err(reason) => return skipped_row(run_id, category, case, &reason),
        };

        let mut request = ApiRequest::new(method.clone(), rendered_path);
        request.query = ctx.render_query(query);
        request.body = rendered_body;
        let url = request.display_url();

        match self.executor.execute(&request).await {
            Ok(response) => {
                self.track_side_effects(&request, &response, ctx, ledger);
                let verdict = evaluate(expect, &response, ctx);
                result_row(run_id, category, case, &request, &url, Some(&response), verdict)
            }
            Err(err) => {
                // Transport failures are local: recorded, never retried,
                // never abort the run.
                debug!(case = %case.key, error = %err, "transport failure");
                result_row(
                    run_id,
                    category,
                    case,
                    &request,
                    &url,
                    None,
                    Verdict {
                        failure: Some(err.message),
                        warning: None,
                    },
                )
            }
        }
    }

    /// Any successful create is tracked for cleanup the instant it
    /// happens, whatever the case was asserting; a successful in-chain
    /// delete confirms the handle away again.
    fn track_side_effects(
        &self,
        request: &ApiRequest,
        response: &ApiResponse,
        ctx: &mut ChainContext,
        ledger: &CleanupLedger,
    ) {
        if !response.is_success() {
            return;
        }
        if request.method == Method::POST {
            let kind = if request.path.starts_with("/Users") {
                Some(ResourceKind::User)
            } else if request.path.starts_with("/Groups") {
                Some(ResourceKind::Group)
            } else {
                None
            };
            if let Some(kind) = kind
                && let Some(id) = extract_id(&response.body)
            {
                ledger.register(kind, id.clone(), 0);
                ctx.capture(kind, id);
                if kind == ResourceKind::User
                    && let Some(json) = response.json()
                {
                    ctx.set_sample_user(json);
                }
            }
        }
        if request.method == Method::DELETE
            && let Some(id) = request.path.rsplit('/').next()
        {
            ledger.confirm_deleted(id);
        }
    }

    /// Best-effort DELETE of every resource the run created and did not
    /// already remove. Errors are logged, never surfaced, and never
    /// block finalization.
    async fn cleanup(&self, run_id: &RunId, ledger: &CleanupLedger) {
        let pending = ledger.drain();
        if pending.is_empty() {
            return;
        }
        info!(run_id = %run_id, resources = pending.len(), "cleaning up created resources");
        let attempts = flush_handles(self.executor.as_ref(), pending).await;
        for attempt in attempts {
            if attempt.succeeded() {
                debug!(run_id = %run_id, id = %attempt.handle.id, "cleanup delete ok");
            } else {
                warn!(
                    run_id = %run_id,
                    id = %attempt.handle.id,
                    kind = attempt.handle.kind.as_str(),
                    "cleanup delete failed",
                );
            }
        }
    }

    async fn append_row(&self, row: &ValidationResult) {
        if let Err(err) = self.sink.append_validation_result(row).await {
            warn!(case = %row.case_key, error = %err, "failed to persist validation result");
        }
    }
}

/// Outcomes of already-executed cases, for dependency checks.
#[derive(Debug, Default)]
struct CaseLog {
    outcomes: std::collections::HashMap<String, CaseOutcome>,
}

impl CaseLog {
    fn record(&mut self, key: &str, outcome: CaseOutcome) {
        self.outcomes.insert(key.to_owned(), outcome);
    }

    fn outcome_of(&self, key: &str) -> Option<CaseOutcome> {
        self.outcomes.get(key).copied()
    }
}

fn skipped_row(
    run_id: &RunId,
    category: Category,
    case: &ValidationCase,
    reason: &str,
) -> ValidationResult {
    let (method, url) = match &case.action {
        CaseAction::Http { method, path, .. } => (method.to_string(), path.clone()),
        CaseAction::FieldRule { .. } => ("GET".to_owned(), "/Users".to_owned()),
        CaseAction::Note { .. } => ("N/A".to_owned(), String::new()),
    };
    ValidationResult {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: run_id.clone(),
        case_key: case.key.clone(),
        test_name: case.name.clone(),
        category: category.as_str().to_owned(),
        method,
        url,
        request_body: None,
        response_status: None,
        response_body: None,
        duration_ms: 0,
        outcome: CaseOutcome::Skipped,
        failure_reason: Some(format!("Skipped: {}", reason)),
        executed_at: Utc::now(),
    }
}

fn note_row(
    run_id: &RunId,
    category: Category,
    case: &ValidationCase,
    message: &str,
) -> ValidationResult {
    ValidationResult {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: run_id.clone(),
        case_key: case.key.clone(),
        test_name: case.name.clone(),
        category: category.as_str().to_owned(),
        method: "N/A".to_owned(),
        url: String::new(),
        request_body: None,
        response_status: None,
        response_body: None,
        duration_ms: 0,
        outcome: CaseOutcome::Passed,
        failure_reason: Some(message.to_owned()),
        executed_at: Utc::now(),
    }
}

fn result_row(
    run_id: &RunId,
    category: Category,
    case: &ValidationCase,
    request: &ApiRequest,
    url: &str,
    response: Option<&ApiResponse>,
    verdict: Verdict,
) -> ValidationResult {
    let outcome = if verdict.passed() {
        CaseOutcome::Passed
    } else {
        CaseOutcome::Failed
    };
    let failure_reason = match (&verdict.failure, &verdict.warning) {
        (Some(failure), _) => Some(failure.clone()),
        (None, Some(warning)) => Some(warning.clone()),
        (None, None) => None,
    };
    ValidationResult {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: run_id.clone(),
        case_key: case.key.clone(),
        test_name: case.name.clone(),
        category: category.as_str().to_owned(),
        method: request.method.to_string(),
        url: url.to_owned(),
        request_body: request.body.clone(),
        response_status: response.map(|response| response.status),
        response_body: response.map(|response| response.body.clone()),
        duration_ms: response.map_or(0, |response| response.duration_ms),
        outcome,
        failure_reason,
        executed_at: Utc::now(),
    }
}
