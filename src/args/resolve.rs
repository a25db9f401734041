use std::time::Duration;

use crate::catalog::{Category, ScenarioKey};
use crate::config::{AuthScheme, ConfigFile, TargetConfig};
use crate::error::{AppError, AppResult, ConfigError};

use super::cli::TargetArgs;

/// Resolves the target from flags or the config file. An explicit
/// `--base-url` wins; otherwise `--target` names a config-file entry.
///
/// # Errors
///
/// Returns a `ConfigError` when no target can be resolved or the auth
/// flags are inconsistent.
pub fn resolve_target(args: &TargetArgs, config: Option<&ConfigFile>) -> AppResult<TargetConfig> {
    if let Some(base_url) = args.base_url.as_deref() {
        let base_url = crate::config::normalize_base_url(base_url)?;
        return Ok(TargetConfig {
            name: args.target.clone().unwrap_or_else(|| "cli".to_owned()),
            base_url,
            auth: auth_from_flags(args)?,
            timeout: Duration::from_secs(args.timeout),
            insecure: args.insecure,
        });
    }

    let name = args
        .target
        .as_deref()
        .ok_or_else(|| AppError::config(ConfigError::MissingTarget))?;
    let config = config.ok_or_else(|| AppError::config(ConfigError::MissingTarget))?;
    config.resolve_target(name)
}

fn auth_from_flags(args: &TargetArgs) -> AppResult<AuthScheme> {
    if let Some(token) = args.bearer_token.as_deref() {
        return Ok(AuthScheme::Bearer {
            token: token.to_owned(),
        });
    }
    if let Some(credentials) = args.basic_auth.as_deref() {
        let (username, password) = credentials
            .split_once(':')
            .ok_or_else(|| AppError::config(ConfigError::InvalidBasicAuth))?;
        return Ok(AuthScheme::Basic {
            username: username.to_owned(),
            password: password.to_owned(),
        });
    }
    match (args.api_key_header.as_deref(), args.api_key_value.as_deref()) {
        (Some(header), Some(value)) => Ok(AuthScheme::ApiKey {
            header: header.to_owned(),
            value: value.to_owned(),
        }),
        (None, None) => Ok(AuthScheme::None),
        (Some(_), None) | (None, Some(_)) => {
            Err(AppError::config(ConfigError::IncompleteApiKey))
        }
    }
}

/// Parses `--categories`; an empty selection means all of them.
///
/// # Errors
///
/// Returns a `ConfigError` for an unknown category name.
pub fn resolve_categories(names: &[String]) -> AppResult<Vec<Category>> {
    if names.is_empty() {
        return Ok(Category::ALL.to_vec());
    }
    names
        .iter()
        .map(|name| Category::parse(name.trim()).map_err(AppError::config))
        .collect()
}

/// Parses `--scenarios`.
///
/// # Errors
///
/// Returns a `ConfigError` for an unknown scenario name.
pub fn resolve_scenarios(names: &[String]) -> AppResult<Vec<ScenarioKey>> {
    names
        .iter()
        .map(|name| ScenarioKey::parse(name.trim()).map_err(AppError::config))
        .collect()
}
