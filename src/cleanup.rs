//! The cleanup guarantee shared by both orchestrators: every resource
//! a run creates is tracked as a handle the instant the create
//! succeeds, and every still-pending handle is flushed with a DELETE
//! at teardown, whether the run completed, errored, or was cancelled.

use std::sync::Mutex;

use crate::error::TransportError;
use crate::http::{ApiRequest, ApiResponse, RequestExecutor};
use crate::scim::ResourceKind;

/// Extra delete attempts after a transport failure. Non-transport
/// failures (the server answered) are not retried.
const CLEANUP_TRANSPORT_RETRIES: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedResourceHandle {
    pub kind: ResourceKind,
    pub id: String,
    pub owner_worker: usize,
}

impl CreatedResourceHandle {
    #[must_use]
    pub fn delete_path(&self) -> String {
        format!("{}/{}", self.kind.endpoint(), self.id)
    }
}

/// Lock-protected list of pending handles. Shared across load workers;
/// owned outright by a validation run.
#[derive(Debug, Default)]
pub struct CleanupLedger {
    handles: Mutex<Vec<CreatedResourceHandle>>,
}

impl CleanupLedger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_handles<T>(&self, f: impl FnOnce(&mut Vec<CreatedResourceHandle>) -> T) -> T {
        match self.handles.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    pub fn register(&self, kind: ResourceKind, id: impl Into<String>, owner_worker: usize) {
        let handle = CreatedResourceHandle {
            kind,
            id: id.into(),
            owner_worker,
        };
        self.with_handles(|handles| handles.push(handle));
    }

    /// Removes and returns the handle for `id`, if still pending.
    pub fn take(&self, id: &str) -> Option<CreatedResourceHandle> {
        self.with_handles(|handles| {
            let position = handles.iter().position(|handle| handle.id == id)?;
            Some(handles.remove(position))
        })
    }

    /// Marks a resource as confirmed-deleted (an in-chain delete step
    /// succeeded), dropping its handle.
    pub fn confirm_deleted(&self, id: &str) {
        drop(self.take(id));
    }

    /// Removes and returns every pending handle, for the teardown flush.
    #[must_use]
    pub fn drain(&self) -> Vec<CreatedResourceHandle> {
        self.with_handles(std::mem::take)
    }

    #[must_use]
    pub fn pending(&self) -> usize {
        self.with_handles(|handles| handles.len())
    }
}

#[derive(Debug)]
pub struct CleanupAttempt {
    pub handle: CreatedResourceHandle,
    pub outcome: Result<ApiResponse, TransportError>,
}

impl CleanupAttempt {
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.outcome
            .as_ref()
            .map_or(false, ApiResponse::is_success)
    }
}

/// Issues the DELETE for one handle, retrying once on transport
/// failure. The handle counts as confirmed either way; cleanup is
/// best-effort and never escalates.
pub async fn delete_handle(
    executor: &dyn RequestExecutor,
    handle: CreatedResourceHandle,
) -> CleanupAttempt {
    let request = ApiRequest::delete(handle.delete_path());
    let mut outcome = executor.execute(&request).await;
    for _ in 0..CLEANUP_TRANSPORT_RETRIES {
        if outcome.is_ok() {
            break;
        }
        outcome = executor.execute(&request).await;
    }
    CleanupAttempt { handle, outcome }
}

/// Flushes a batch of handles sequentially, returning each attempt so
/// callers can record or log them as they see fit.
pub async fn flush_handles(
    executor: &dyn RequestExecutor,
    handles: Vec<CreatedResourceHandle>,
) -> Vec<CleanupAttempt> {
    let mut attempts = Vec::with_capacity(handles.len());
    for handle in handles {
        attempts.push(delete_handle(executor, handle).await);
    }
    attempts
}
