use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult, ConfigError};

/// One named target in `scimstress.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TargetEntry {
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthScheme,
    /// Per-request timeout in seconds.
    pub timeout_secs: Option<u64>,
    /// Accept self-signed certificates.
    #[serde(default)]
    pub insecure: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub targets: BTreeMap<String, TargetEntry>,
    #[serde(default)]
    pub field_mappings: Vec<FieldMappingRule>,
}

impl ConfigFile {
    /// Resolves a named target into a [`TargetConfig`].
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when no target with that name exists.
    pub fn resolve_target(&self, name: &str) -> AppResult<TargetConfig> {
        let entry = self.targets.get(name).ok_or_else(|| {
            AppError::config(ConfigError::UnknownTarget {
                name: name.to_owned(),
            })
        })?;
        TargetConfig::from_entry(name, entry)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthScheme {
    #[default]
    None,
    Bearer {
        token: String,
    },
    Basic {
        username: String,
        password: String,
    },
    ApiKey {
        header: String,
        value: String,
    },
}

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A fully resolved target the engine can run against.
#[derive(Debug, Clone)]
pub struct TargetConfig {
    pub name: String,
    pub base_url: String,
    pub auth: AuthScheme,
    pub timeout: Duration,
    pub insecure: bool,
}

impl TargetConfig {
    /// Builds a target from a config-file entry, validating the URL.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the base URL does not parse.
    pub fn from_entry(name: &str, entry: &TargetEntry) -> AppResult<Self> {
        let base_url = normalize_base_url(&entry.base_url)?;
        Ok(Self {
            name: name.to_owned(),
            base_url,
            auth: entry.auth.clone(),
            timeout: entry
                .timeout_secs
                .map_or(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs),
            insecure: entry.insecure,
        })
    }
}

/// Validates a base URL and strips any trailing slash so paths can be
/// joined with a single separator.
///
/// # Errors
///
/// Returns a `ConfigError` when the URL does not parse.
pub(crate) fn normalize_base_url(raw: &str) -> AppResult<String> {
    url::Url::parse(raw).map_err(|err| {
        AppError::config(ConfigError::InvalidBaseUrl {
            url: raw.to_owned(),
            source: err,
        })
    })?;
    Ok(raw.trim_end_matches('/').to_owned())
}

/// Expected value shape for a field-mapping rule.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FieldFormat {
    #[default]
    None,
    Email,
    Uri,
    Phone,
    Boolean,
    Integer,
    Datetime,
    Regex,
}

/// A conformance rule asserted against a live resource: the attribute
/// at `scim_attribute` (dotted path, optional `[index]`) must be
/// present when `required` and match `format` when present.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FieldMappingRule {
    pub scim_attribute: String,
    pub display_name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub format: FieldFormat,
    pub regex_pattern: Option<String>,
}

impl FieldMappingRule {
    /// Checks structural validity before a run starts.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the regex format has no pattern.
    pub fn validate(&self) -> AppResult<()> {
        if self.format == FieldFormat::Regex && self.regex_pattern.is_none() {
            return Err(AppError::config(ConfigError::MissingRegexPattern {
                rule: self.display_name.clone(),
            }));
        }
        Ok(())
    }
}
