use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config '{path}': {source}")]
    ReadConfig {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse TOML config '{path}': {source}")]
    ParseToml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("Config file must have a .toml extension.")]
    UnsupportedExtension,
    #[error("No target named '{name}' in the config file.")]
    UnknownTarget { name: String },
    #[error("A target requires either --base-url or --config with --target.")]
    MissingTarget,
    #[error("Invalid base URL '{url}': {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("Basic auth must be in 'user:password' format.")]
    InvalidBasicAuth,
    #[error("--api-key-header and --api-key-value must be set together.")]
    IncompleteApiKey,
    #[error("At least one validation category must be selected.")]
    NoCategories,
    #[error("Unknown validation category '{name}'.")]
    UnknownCategory { name: String },
    #[error("At least one load scenario must be selected.")]
    NoScenarios,
    #[error("Unknown load scenario '{name}'.")]
    UnknownScenario { name: String },
    #[error("Total units must be greater than zero.")]
    ZeroUnits,
    #[error("Concurrency must be greater than zero.")]
    ZeroConcurrency,
    #[error("Field mapping rule '{rule}' uses the regex format but has no pattern.")]
    MissingRegexPattern { rule: String },
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
