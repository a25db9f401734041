use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::{AppError, AppResult, SinkError};
use crate::load::LoadResult;
use crate::run::{Run, RunId, RunStatus};
use crate::validation::ValidationResult;

use super::ResultSink;

#[derive(Debug, Default)]
struct Store {
    runs: HashMap<String, Run>,
    validation: Vec<ValidationResult>,
    load: Vec<LoadResult>,
}

/// In-process sink; the default for one-shot CLI runs and tests.
#[derive(Debug, Default)]
pub struct MemorySink {
    store: Mutex<Store>,
}

impl MemorySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_store<T>(&self, f: impl FnOnce(&mut Store) -> T) -> T {
        match self.store.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn insert_run(&self, run: &Run) -> AppResult<()> {
        self.with_store(|store| {
            store.runs.insert(run.id.as_str().to_owned(), run.clone());
        });
        Ok(())
    }

    async fn append_validation_result(&self, row: &ValidationResult) -> AppResult<()> {
        self.with_store(|store| store.validation.push(row.clone()));
        Ok(())
    }

    async fn append_load_result(&self, row: &LoadResult) -> AppResult<()> {
        self.with_store(|store| store.load.push(row.clone()));
        Ok(())
    }

    async fn finalize_run(
        &self,
        run_id: &RunId,
        status: RunStatus,
        summary_json: Option<String>,
    ) -> AppResult<()> {
        self.with_store(|store| {
            let run = store.runs.get_mut(run_id.as_str()).ok_or_else(|| {
                AppError::sink(SinkError::UnknownRun {
                    run_id: run_id.as_str().to_owned(),
                })
            })?;
            run.status = status;
            run.completed_at = Some(Utc::now());
            run.summary_json = summary_json;
            Ok(())
        })
    }

    async fn run(&self, run_id: &RunId) -> AppResult<Run> {
        self.with_store(|store| {
            store.runs.get(run_id.as_str()).cloned().ok_or_else(|| {
                AppError::sink(SinkError::UnknownRun {
                    run_id: run_id.as_str().to_owned(),
                })
            })
        })
    }

    async fn validation_results(&self, run_id: &RunId) -> AppResult<Vec<ValidationResult>> {
        Ok(self.with_store(|store| {
            store
                .validation
                .iter()
                .filter(|row| &row.run_id == run_id)
                .cloned()
                .collect()
        }))
    }

    async fn load_results(&self, run_id: &RunId) -> AppResult<Vec<LoadResult>> {
        Ok(self.with_store(|store| {
            store
                .load
                .iter()
                .filter(|row| &row.run_id == run_id)
                .cloned()
                .collect()
        }))
    }
}
