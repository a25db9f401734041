use super::*;
use crate::error::{AppError, AppResult};

#[test]
fn stop_flips_the_cancel_flag_once_registered() -> AppResult<()> {
    let run_id = RunId::new();
    let state = register(&run_id);
    if state.is_cancelled() {
        return Err(AppError::engine("Fresh run must not be cancelled"));
    }
    if !stop(&run_id) {
        return Err(AppError::engine("Expected stop to find the run"));
    }
    if !state.is_cancelled() {
        return Err(AppError::engine("Cancel flag not set"));
    }
    deregister(&run_id);
    Ok(())
}

#[test]
fn stop_on_unknown_run_is_a_noop() -> AppResult<()> {
    let run_id = RunId::new();
    if stop(&run_id) {
        return Err(AppError::engine("Unknown run must be a no-op"));
    }
    Ok(())
}

#[test]
fn deregister_makes_stop_idempotent() -> AppResult<()> {
    let run_id = RunId::new();
    let _state = register(&run_id);
    if !is_live(&run_id) {
        return Err(AppError::engine("Run should be live after register"));
    }
    deregister(&run_id);
    if is_live(&run_id) {
        return Err(AppError::engine("Run should be gone after deregister"));
    }
    if stop(&run_id) {
        return Err(AppError::engine("Stop after deregister must be a no-op"));
    }
    Ok(())
}

#[test]
fn run_kind_and_status_round_trip() -> AppResult<()> {
    for kind in [RunKind::Validation, RunKind::Load] {
        if RunKind::parse(kind.as_str()).map_err(AppError::sink)? != kind {
            return Err(AppError::engine("RunKind round-trip failed"));
        }
    }
    for status in [
        RunStatus::Running,
        RunStatus::Completed,
        RunStatus::Failed,
        RunStatus::Cancelled,
    ] {
        if RunStatus::parse(status.as_str()).map_err(AppError::sink)? != status {
            return Err(AppError::engine("RunStatus round-trip failed"));
        }
    }
    if RunStatus::parse("bogus").is_ok() || RunKind::parse("bogus").is_ok() {
        return Err(AppError::engine("Bogus values must not parse"));
    }
    if RunStatus::Running.is_terminal() {
        return Err(AppError::engine("Running is not terminal"));
    }
    if !RunStatus::Cancelled.is_terminal() {
        return Err(AppError::engine("Cancelled is terminal"));
    }
    Ok(())
}
