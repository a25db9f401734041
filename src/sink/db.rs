use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::Connection;

use crate::error::{AppError, AppResult, SinkError};
use crate::load::{CallDisposition, LoadResult};
use crate::run::{Run, RunId, RunKind, RunStatus};
use crate::validation::{CaseOutcome, ValidationResult};

use super::ResultSink;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    kind TEXT NOT NULL,
    target TEXT NOT NULL,
    status TEXT NOT NULL,
    started_at TEXT NOT NULL,
    completed_at TEXT,
    summary_json TEXT
);
CREATE TABLE IF NOT EXISTS validation_results (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    case_key TEXT NOT NULL,
    test_name TEXT NOT NULL,
    category TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    request_body TEXT,
    response_status INTEGER,
    response_body TEXT,
    duration_ms INTEGER NOT NULL,
    outcome TEXT NOT NULL,
    failure_reason TEXT,
    executed_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS load_results (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    request_index INTEGER NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    request_body TEXT,
    status_code INTEGER,
    duration_ms INTEGER NOT NULL,
    success INTEGER NOT NULL,
    error_message TEXT,
    disposition TEXT NOT NULL,
    timestamp TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_validation_results_run
    ON validation_results(run_id);
CREATE INDEX IF NOT EXISTS idx_load_results_run
    ON load_results(run_id);
";

/// SQLite-backed sink. All statements run on the connection's
/// dedicated blocking thread via `tokio-rusqlite`.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Opens (and migrates) a database file.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be opened or the schema
    /// cannot be applied.
    pub async fn open(path: &str) -> AppResult<Self> {
        let conn = Connection::open(path).await.map_err(|err| {
            AppError::sink(SinkError::OpenDatabase {
                path: path.to_owned(),
                source: Box::new(err),
            })
        })?;
        Self::from_connection(conn).await
    }

    /// Opens an in-memory database, for tests.
    ///
    /// # Errors
    ///
    /// Returns an error when the schema cannot be applied.
    pub async fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory().await.map_err(|err| {
            AppError::sink(SinkError::OpenDatabase {
                path: ":memory:".to_owned(),
                source: Box::new(err),
            })
        })?;
        Self::from_connection(conn).await
    }

    async fn from_connection(conn: Connection) -> AppResult<Self> {
        conn.call(|conn| {
            conn.execute_batch("PRAGMA foreign_keys = ON;")?;
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await
        .map_err(db_error("apply schema"))?;
        Ok(Self { conn })
    }
}

fn db_error(context: &'static str) -> impl FnOnce(tokio_rusqlite::Error) -> AppError {
    move |err| {
        AppError::sink(SinkError::Database {
            context,
            source: Box::new(err),
        })
    }
}

fn clamp_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_timestamp(column: &'static str, value: &str) -> Result<DateTime<Utc>, SinkError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| SinkError::InvalidColumn {
            column,
            value: value.to_owned(),
        })
}

type RunRow = (
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<String>,
);

type ValidationRow = (
    String,
    String,
    String,
    String,
    String,
    String,
    String,
    Option<String>,
    Option<i64>,
    Option<String>,
    i64,
    String,
    Option<String>,
    String,
);

type LoadRow = (
    String,
    String,
    i64,
    String,
    String,
    Option<String>,
    Option<i64>,
    i64,
    bool,
    Option<String>,
    String,
    String,
);

#[async_trait]
impl ResultSink for SqliteSink {
    async fn insert_run(&self, run: &Run) -> AppResult<()> {
        let row = (
            run.id.as_str().to_owned(),
            run.kind.as_str().to_owned(),
            run.target.clone(),
            run.status.as_str().to_owned(),
            run.started_at.to_rfc3339(),
            run.completed_at.map(|ts| ts.to_rfc3339()),
            run.summary_json.clone(),
        );
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO runs (id, kind, target, status, started_at, completed_at, summary_json)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    rusqlite::params![row.0, row.1, row.2, row.3, row.4, row.5, row.6],
                )?;
                Ok(())
            })
            .await
            .map_err(db_error("insert run"))
    }

    async fn append_validation_result(&self, row: &ValidationResult) -> AppResult<()> {
        let values = (
            row.id.clone(),
            row.run_id.as_str().to_owned(),
            row.case_key.clone(),
            row.test_name.clone(),
            row.category.clone(),
            row.method.clone(),
            row.url.clone(),
            row.request_body.clone(),
            row.response_status.map(i64::from),
            row.response_body.clone(),
            clamp_i64(row.duration_ms),
            row.outcome.as_str().to_owned(),
            row.failure_reason.clone(),
            row.executed_at.to_rfc3339(),
        );
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO validation_results
                     (id, run_id, case_key, test_name, category, method, url, request_body,
                      response_status, response_body, duration_ms, outcome, failure_reason, executed_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                    rusqlite::params![
                        values.0, values.1, values.2, values.3, values.4, values.5, values.6,
                        values.7, values.8, values.9, values.10, values.11, values.12, values.13,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(db_error("append validation result"))
    }

    async fn append_load_result(&self, row: &LoadResult) -> AppResult<()> {
        let values = (
            row.id.clone(),
            row.run_id.as_str().to_owned(),
            clamp_i64(row.request_index),
            row.method.clone(),
            row.url.clone(),
            row.request_body.clone(),
            row.status_code.map(i64::from),
            clamp_i64(row.duration_ms),
            row.success,
            row.error_message.clone(),
            row.disposition.as_str().to_owned(),
            row.timestamp.to_rfc3339(),
        );
        self.conn
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO load_results
                     (id, run_id, request_index, method, url, request_body, status_code,
                      duration_ms, success, error_message, disposition, timestamp)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    rusqlite::params![
                        values.0, values.1, values.2, values.3, values.4, values.5, values.6,
                        values.7, values.8, values.9, values.10, values.11,
                    ],
                )?;
                Ok(())
            })
            .await
            .map_err(db_error("append load result"))
    }

    async fn finalize_run(
        &self,
        run_id: &RunId,
        status: RunStatus,
        summary_json: Option<String>,
    ) -> AppResult<()> {
        let id = run_id.as_str().to_owned();
        let status_str = status.as_str().to_owned();
        let completed_at = Utc::now().to_rfc3339();
        let updated = self
            .conn
            .call(move |conn| {
                let updated = conn.execute(
                    "UPDATE runs SET status = ?2, completed_at = ?3, summary_json = ?4 WHERE id = ?1",
                    rusqlite::params![id, status_str, completed_at, summary_json],
                )?;
                Ok(updated)
            })
            .await
            .map_err(db_error("finalize run"))?;
        if updated == 0 {
            return Err(AppError::sink(SinkError::UnknownRun {
                run_id: run_id.as_str().to_owned(),
            }));
        }
        Ok(())
    }

    async fn run(&self, run_id: &RunId) -> AppResult<Run> {
        let id = run_id.as_str().to_owned();
        let row: Option<RunRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, kind, target, status, started_at, completed_at, summary_json
                     FROM runs WHERE id = ?1",
                )?;
                let mut rows = stmt.query_map(rusqlite::params![id], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                    ))
                })?;
                rows.next().transpose().map_err(tokio_rusqlite::Error::from)
            })
            .await
            .map_err(db_error("fetch run"))?;

        let row = row.ok_or_else(|| {
            AppError::sink(SinkError::UnknownRun {
                run_id: run_id.as_str().to_owned(),
            })
        })?;

        let completed_at = row
            .5
            .as_deref()
            .map(|value| parse_timestamp("completed_at", value))
            .transpose()
            .map_err(AppError::sink)?;

        Ok(Run {
            id: RunId::from(row.0),
            kind: RunKind::parse(&row.1).map_err(AppError::sink)?,
            target: row.2,
            status: RunStatus::parse(&row.3).map_err(AppError::sink)?,
            started_at: parse_timestamp("started_at", &row.4).map_err(AppError::sink)?,
            completed_at,
            summary_json: row.6,
        })
    }

    async fn validation_results(&self, run_id: &RunId) -> AppResult<Vec<ValidationResult>> {
        let id = run_id.as_str().to_owned();
        let raw: Vec<ValidationRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, run_id, case_key, test_name, category, method, url, request_body,
                            response_status, response_body, duration_ms, outcome, failure_reason,
                            executed_at
                     FROM validation_results WHERE run_id = ?1 ORDER BY rowid",
                )?;
                let rows = stmt.query_map(rusqlite::params![id], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                        row.get(11)?,
                        row.get(12)?,
                        row.get(13)?,
                    ))
                })?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(tokio_rusqlite::Error::from)
            })
            .await
            .map_err(db_error("fetch validation results"))?;

        let mut results = Vec::with_capacity(raw.len());
        for row in raw {
            results.push(ValidationResult {
                id: row.0,
                run_id: RunId::from(row.1),
                case_key: row.2,
                test_name: row.3,
                category: row.4,
                method: row.5,
                url: row.6,
                request_body: row.7,
                response_status: row.8.and_then(|status| u16::try_from(status).ok()),
                response_body: row.9,
                duration_ms: u64::try_from(row.10).unwrap_or(0),
                outcome: CaseOutcome::parse(&row.11).map_err(AppError::sink)?,
                failure_reason: row.12,
                executed_at: parse_timestamp("executed_at", &row.13).map_err(AppError::sink)?,
            });
        }
        Ok(results)
    }

    async fn load_results(&self, run_id: &RunId) -> AppResult<Vec<LoadResult>> {
        let id = run_id.as_str().to_owned();
        let raw: Vec<LoadRow> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT id, run_id, request_index, method, url, request_body, status_code,
                            duration_ms, success, error_message, disposition, timestamp
                     FROM load_results WHERE run_id = ?1 ORDER BY rowid",
                )?;
                let rows = stmt.query_map(rusqlite::params![id], |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                        row.get(5)?,
                        row.get(6)?,
                        row.get(7)?,
                        row.get(8)?,
                        row.get(9)?,
                        row.get(10)?,
                        row.get(11)?,
                    ))
                })?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(tokio_rusqlite::Error::from)
            })
            .await
            .map_err(db_error("fetch load results"))?;

        let mut results = Vec::with_capacity(raw.len());
        for row in raw {
            results.push(LoadResult {
                id: row.0,
                run_id: RunId::from(row.1),
                request_index: u64::try_from(row.2).unwrap_or(0),
                method: row.3,
                url: row.4,
                request_body: row.5,
                status_code: row.6.and_then(|status| u16::try_from(status).ok()),
                duration_ms: u64::try_from(row.7).unwrap_or(0),
                success: row.8,
                error_message: row.9,
                disposition: CallDisposition::parse(&row.10).map_err(AppError::sink)?,
                timestamp: parse_timestamp("timestamp", &row.11).map_err(AppError::sink)?,
            });
        }
        Ok(results)
    }
}
