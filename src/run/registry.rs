use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use tracing::debug;

use super::{RunId, RunState};

static REGISTRY: Lazy<Mutex<HashMap<String, Arc<RunState>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn with_registry<T>(f: impl FnOnce(&mut HashMap<String, Arc<RunState>>) -> T) -> T {
    match REGISTRY.lock() {
        Ok(mut guard) => f(&mut guard),
        Err(poisoned) => f(&mut poisoned.into_inner()),
    }
}

/// Creates and registers the state for a new run.
#[must_use]
pub fn register(run_id: &RunId) -> Arc<RunState> {
    let state = Arc::new(RunState::new(run_id.clone()));
    with_registry(|map| map.insert(run_id.as_str().to_owned(), Arc::clone(&state)));
    state
}

/// Requests cooperative cancellation of a live run. Idempotent: calling
/// it on an unknown or already-terminal run is a no-op and returns
/// `false`.
pub fn stop(run_id: &RunId) -> bool {
    with_registry(|map| {
        map.get(run_id.as_str()).map_or(false, |state| {
            debug!(run_id = %run_id, "cancellation requested");
            state.request_cancel();
            true
        })
    })
}

/// Removes a run's state once it reaches a terminal status.
pub fn deregister(run_id: &RunId) {
    with_registry(|map| map.remove(run_id.as_str()));
}

#[must_use]
pub fn is_live(run_id: &RunId) -> bool {
    with_registry(|map| map.contains_key(run_id.as_str()))
}
