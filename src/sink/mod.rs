//! Append-only persistence for runs and their result rows. Both
//! orchestrators write rows as they are produced and read them back
//! once for summarization; individual rows are never updated or
//! deleted from the engine side.
mod db;
mod memory;


use async_trait::async_trait;

use crate::error::AppResult;
use crate::load::LoadResult;
use crate::run::{Run, RunId, RunStatus};
use crate::validation::ValidationResult;

pub use db::SqliteSink;
pub use memory::MemorySink;

#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Records a freshly started run.
    async fn insert_run(&self, run: &Run) -> AppResult<()>;

    /// Appends one validation result row.
    async fn append_validation_result(&self, row: &ValidationResult) -> AppResult<()>;

    /// Appends one load result row.
    async fn append_load_result(&self, row: &LoadResult) -> AppResult<()>;

    /// Moves a run to a terminal status and stores its summary.
    async fn finalize_run(
        &self,
        run_id: &RunId,
        status: RunStatus,
        summary_json: Option<String>,
    ) -> AppResult<()>;

    /// Fetches a run by id.
    async fn run(&self, run_id: &RunId) -> AppResult<Run>;

    /// All validation rows for a run, in insertion order.
    async fn validation_results(&self, run_id: &RunId) -> AppResult<Vec<ValidationResult>>;

    /// All load rows for a run, in insertion order.
    async fn load_results(&self, run_id: &RunId) -> AppResult<Vec<LoadResult>>;
}
