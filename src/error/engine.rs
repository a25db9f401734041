use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Run '{run_id}' was not registered before execution.")]
    RunNotRegistered { run_id: String },
    #[error("Run '{run_id}' has no stored summary.")]
    SummaryMissing { run_id: String },
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
