use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::warn;

use crate::catalog::{ScenarioDefinition, ScenarioStep, StepBody, StepPath, StepRole};
use crate::cleanup::{CleanupLedger, delete_handle};
use crate::error::TransportError;
use crate::http::{ApiRequest, ApiResponse, RequestExecutor};
use crate::run::{RunId, RunState};
use crate::scim::{self, ResourceKind, extract_id};
use crate::sink::ResultSink;

use super::collector::CollectorEvent;
use super::types::{CallDisposition, LoadResult};

const LIST_PAGE_SIZE: usize = 10;
const NAME_SUFFIX_LEN: usize = 8;

const TEAM_NAMES: [&str; 10] = [
    "Engineering",
    "Marketing",
    "Sales",
    "Support",
    "Product",
    "Design",
    "DevOps",
    "QA",
    "Finance",
    "Legal",
];

/// Everything one virtual worker needs; all shared pieces are cheap
/// atomics, the lock-protected cleanup ledger, or channel ends.
pub(super) struct WorkerContext {
    pub(super) worker_id: usize,
    pub(super) run_id: RunId,
    pub(super) executor: Arc<dyn RequestExecutor>,
    pub(super) sink: Arc<dyn ResultSink>,
    pub(super) state: Arc<RunState>,
    pub(super) scenarios: Arc<Vec<ScenarioDefinition>>,
    pub(super) total_units: usize,
    pub(super) claim: Arc<AtomicUsize>,
    pub(super) next_index: Arc<AtomicU64>,
    pub(super) ledger: Arc<CleanupLedger>,
    pub(super) events: mpsc::Sender<CollectorEvent>,
    pub(super) ramp_delay: Duration,
}

/// Worker loop: wait out the ramp slot, then pull units off the shared
/// counter until the run is exhausted or cancelled. Cancellation is
/// observed between steps only; an in-flight call always completes and
/// is recorded.
pub(super) async fn run_worker(ctx: WorkerContext) {
    if !ctx.ramp_delay.is_zero() {
        sleep(ctx.ramp_delay).await;
    }

    loop {
        if ctx.state.is_cancelled() {
            break;
        }
        let unit = ctx.claim.fetch_add(1, Ordering::Relaxed);
        if unit >= ctx.total_units {
            break;
        }
        run_unit(&ctx, unit).await;
    }
}

async fn run_unit(ctx: &WorkerContext, unit: usize) {
    let scenario_slot = unit.checked_rem(ctx.scenarios.len()).unwrap_or(0);
    let Some(scenario) = ctx.scenarios.get(scenario_slot) else {
        return;
    };

    let mut captures: HashMap<ResourceKind, String> = HashMap::new();
    let mut cancelled_mid_unit = false;

    for step in &scenario.steps {
        if ctx.state.is_cancelled() {
            cancelled_mid_unit = true;
            break;
        }

        match build_step_request(step, unit, &captures) {
            Ok(request) => {
                let outcome = ctx.executor.execute(&request).await;
                track_step_effects(ctx, step, &captures, &outcome);
                if let Ok(response) = &outcome
                    && response.is_success()
                    && let Some(kind) = step.creates()
                    && let Some(id) = extract_id(&response.body)
                {
                    ctx.ledger.register(kind, id.clone(), ctx.worker_id);
                    captures.insert(kind, id);
                }
                record_call(ctx, &request, &outcome, CallDisposition::Primary).await;
            }
            Err(reason) => {
                // Same dependency policy as validation: steps that need
                // a failed create's output are skipped, not attempted.
                record_skip(ctx, step, &reason).await;
            }
        }
    }

    if cancelled_mid_unit {
        // Pending handles stay in the ledger; the teardown flush owns them.
        return;
    }

    // Resources whose chain has no delete of its own are cleaned up
    // right after the unit's primary steps.
    for kind in [ResourceKind::User, ResourceKind::Group] {
        if scenario.has_delete_for(kind) {
            continue;
        }
        let Some(id) = captures.get(&kind) else {
            continue;
        };
        let Some(handle) = ctx.ledger.take(id) else {
            continue;
        };
        let attempt = delete_handle(ctx.executor.as_ref(), handle).await;
        let request = ApiRequest::delete(attempt.handle.delete_path());
        record_call(ctx, &request, &attempt.outcome, CallDisposition::Cleanup).await;
    }
}

/// A successful in-chain delete confirms the handle away so teardown
/// does not delete the resource twice.
fn track_step_effects(
    ctx: &WorkerContext,
    step: &ScenarioStep,
    captures: &HashMap<ResourceKind, String>,
    outcome: &Result<ApiResponse, TransportError>,
) {
    if step.role != StepRole::Delete {
        return;
    }
    if let StepPath::ById(kind) = step.path
        && let Ok(response) = outcome
        && response.is_success()
        && let Some(id) = captures.get(&kind)
    {
        ctx.ledger.confirm_deleted(id);
    }
}

fn build_step_request(
    step: &ScenarioStep,
    unit: usize,
    captures: &HashMap<ResourceKind, String>,
) -> Result<ApiRequest, String> {
    let path = match step.path {
        StepPath::Collection(kind) => kind.endpoint().to_owned(),
        StepPath::ById(kind) => {
            let id = captures
                .get(&kind)
                .ok_or_else(|| format!("{} create failed", kind.as_str()))?;
            format!("{}/{}", kind.endpoint(), id)
        }
        StepPath::ListPage => ResourceKind::User.endpoint().to_owned(),
    };

    let mut request = ApiRequest::new(step.method.clone(), path);
    if step.path == StepPath::ListPage {
        let start_index = unit.saturating_mul(LIST_PAGE_SIZE).saturating_add(1);
        request = request
            .with_query("startIndex", start_index.to_string())
            .with_query("count", LIST_PAGE_SIZE.to_string());
    }

    request.body = match step.body {
        StepBody::None => None,
        StepBody::User => Some(generate_user_body(unit)),
        StepBody::Group => Some(generate_group_body(unit)),
        StepBody::PatchDisplayName => Some(scim::patch_display_name()),
        StepBody::PatchAddMember => {
            let user_id = captures
                .get(&ResourceKind::User)
                .ok_or_else(|| "user create failed".to_owned())?;
            Some(scim::patch_body(&[scim::PatchOperation::add(
                "members",
                serde_json::json!([{ "value": user_id }]),
            )]))
        }
        StepBody::PatchRemoveMember => {
            let user_id = captures
                .get(&ResourceKind::User)
                .ok_or_else(|| "user create failed".to_owned())?;
            Some(scim::patch_body(&[scim::PatchOperation::remove(format!(
                "members[value eq \"{}\"]",
                user_id
            ))]))
        }
    };

    Ok(request)
}

fn generate_user_body(unit: usize) -> String {
    let suffix = scim::random_suffix(NAME_SUFFIX_LEN);
    let user_name = format!("loadtest_{}_{:04}@test.example.com", suffix, unit);
    scim::user_body(&user_name, &format!("Load{}", unit), "Load Test User")
}

fn generate_group_body(unit: usize) -> String {
    let suffix = scim::random_suffix(NAME_SUFFIX_LEN);
    let team_slot = unit.checked_rem(TEAM_NAMES.len()).unwrap_or(0);
    let team = TEAM_NAMES.get(team_slot).copied().unwrap_or("Team");
    scim::group_body(&format!("{} Team {} {}", team, suffix, unit))
}

pub(super) async fn record_call(
    ctx: &WorkerContext,
    request: &ApiRequest,
    outcome: &Result<ApiResponse, TransportError>,
    disposition: CallDisposition,
) {
    let index = ctx.next_index.fetch_add(1, Ordering::Relaxed);
    let row = build_row(&ctx.run_id, index, request, outcome, disposition);
    let event = CollectorEvent::Call {
        disposition,
        success: row.success,
        duration_ms: row.duration_ms,
    };
    if let Err(err) = ctx.sink.append_load_result(&row).await {
        warn!(index, error = %err, "failed to persist load result");
    }
    drop(ctx.events.send(event).await);
}

async fn record_skip(ctx: &WorkerContext, step: &ScenarioStep, reason: &str) {
    let index = ctx.next_index.fetch_add(1, Ordering::Relaxed);
    let path = match step.path {
        StepPath::Collection(kind) | StepPath::ById(kind) => {
            format!("{}/{{id}}", kind.endpoint())
        }
        StepPath::ListPage => ResourceKind::User.endpoint().to_owned(),
    };
    let row = LoadResult {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: ctx.run_id.clone(),
        request_index: index,
        method: step.method.to_string(),
        url: path,
        request_body: None,
        status_code: None,
        duration_ms: 0,
        success: false,
        error_message: Some(format!("Skipped: {}", reason)),
        disposition: CallDisposition::Skipped,
        timestamp: Utc::now(),
    };
    if let Err(err) = ctx.sink.append_load_result(&row).await {
        warn!(index, error = %err, "failed to persist skipped step");
    }
    drop(
        ctx.events
            .send(CollectorEvent::Call {
                disposition: CallDisposition::Skipped,
                success: false,
                duration_ms: 0,
            })
            .await,
    );
}

pub(super) fn build_row(
    run_id: &RunId,
    index: u64,
    request: &ApiRequest,
    outcome: &Result<ApiResponse, TransportError>,
    disposition: CallDisposition,
) -> LoadResult {
    let (status_code, duration_ms, success, error_message) = match outcome {
        Ok(response) => {
            let success = response.status >= 200 && response.status < 400;
            let error = if success {
                None
            } else {
                Some(format!("Status {}", response.status))
            };
            (
                Some(response.status),
                response.duration_ms,
                success,
                error,
            )
        }
        Err(err) => (None, 0, false, Some(err.message.clone())),
    };

    LoadResult {
        id: uuid::Uuid::new_v4().to_string(),
        run_id: run_id.clone(),
        request_index: index,
        method: request.method.to_string(),
        url: request.display_url(),
        request_body: request.body.clone(),
        status_code,
        duration_ms,
        success,
        error_message,
        disposition,
        timestamp: Utc::now(),
    }
}
