use thiserror::Error;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Failed to open results database '{path}': {source}")]
    OpenDatabase {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("{context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
    #[error("Unknown run '{run_id}'.")]
    UnknownRun { run_id: String },
    #[error("Invalid value '{value}' in column '{column}'.")]
    InvalidColumn {
        column: &'static str,
        value: String,
    },
    #[cfg(test)]
    #[error("Test expectation failed: {message}")]
    TestExpectation { message: &'static str },
    #[cfg(test)]
    #[error("Test expectation failed: {message}: {value}")]
    TestExpectationValue {
        message: &'static str,
        value: String,
    },
}
