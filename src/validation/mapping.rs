use regex::Regex;
use serde_json::Value;

use crate::config::{FieldFormat, FieldMappingRule};
use crate::scim::resolve_attribute_path;

const EMAIL_PATTERN: &str = r"^[a-zA-Z0-9._%+\-]+@[a-zA-Z0-9.\-]+\.[a-zA-Z]{2,}$";
const PHONE_PATTERN: &str = r"^[\+]?[\d\s\-\(\)\.]{7,20}$";

fn matches_pattern(pattern: &str, value: &str) -> bool {
    Regex::new(pattern)
        .map(|regex| regex.is_match(value))
        .unwrap_or(false)
}

/// Asserts one field-mapping rule against a live resource. Returns
/// `(passed, failure_reason)`.
pub(super) fn validate_field_rule(
    resource: &Value,
    rule: &FieldMappingRule,
) -> (bool, Option<String>) {
    let value = resolve_attribute_path(resource, &rule.scim_attribute);

    if rule.required {
        match &value {
            None => {
                return (
                    false,
                    Some(format!("Required field '{}' is missing", rule.scim_attribute)),
                );
            }
            Some(Value::Null) => {
                return (
                    false,
                    Some(format!("Required field '{}' is null", rule.scim_attribute)),
                );
            }
            Some(Value::String(text)) if text.is_empty() => {
                return (
                    false,
                    Some(format!("Required field '{}' is empty", rule.scim_attribute)),
                );
            }
            Some(_) => {}
        }
    }

    // Absent-and-optional passes without a format check.
    let value = match value {
        Some(value) if !value.is_null() => value,
        _ => return (true, None),
    };

    let text = match &value {
        Value::String(text) => text.clone(),
        Value::Bool(flag) => flag.to_string(),
        Value::Number(number) => number.to_string(),
        other => other.to_string(),
    };

    match rule.format {
        FieldFormat::None => (true, None),
        FieldFormat::Email => {
            if matches_pattern(EMAIL_PATTERN, &text) {
                (true, None)
            } else {
                (
                    false,
                    Some(format!(
                        "'{}' value '{}' is not a valid email address",
                        rule.scim_attribute, text
                    )),
                )
            }
        }
        FieldFormat::Uri => {
            if text.starts_with("urn:") || url::Url::parse(&text).is_ok() {
                (true, None)
            } else {
                (
                    false,
                    Some(format!(
                        "'{}' value '{}' is not a valid URI",
                        rule.scim_attribute, text
                    )),
                )
            }
        }
        FieldFormat::Phone => {
            if matches_pattern(PHONE_PATTERN, &text) {
                (true, None)
            } else {
                (
                    false,
                    Some(format!(
                        "'{}' value '{}' is not a valid phone number",
                        rule.scim_attribute, text
                    )),
                )
            }
        }
        FieldFormat::Boolean => match &value {
            Value::Bool(_) => (true, None),
            Value::String(text) if text == "true" || text == "false" => (true, None),
            _ => (
                false,
                Some(format!(
                    "'{}' value '{}' is not a boolean",
                    rule.scim_attribute, text
                )),
            ),
        },
        FieldFormat::Integer => match &value {
            Value::Number(number) if number.is_i64() || number.is_u64() => (true, None),
            Value::String(text) if text.parse::<i64>().is_ok() => (true, None),
            _ => (
                false,
                Some(format!(
                    "'{}' value '{}' is not a valid integer",
                    rule.scim_attribute, text
                )),
            ),
        },
        FieldFormat::Datetime => {
            if chrono::DateTime::parse_from_rfc3339(&text).is_ok() {
                (true, None)
            } else {
                (
                    false,
                    Some(format!(
                        "'{}' value '{}' is not a valid ISO 8601 date-time",
                        rule.scim_attribute, text
                    )),
                )
            }
        }
        FieldFormat::Regex => match rule.regex_pattern.as_deref() {
            Some(pattern) => match Regex::new(pattern) {
                Ok(regex) => {
                    if regex.is_match(&text) {
                        (true, None)
                    } else {
                        (
                            false,
                            Some(format!(
                                "'{}' value '{}' does not match pattern '{}'",
                                rule.scim_attribute, text, pattern
                            )),
                        )
                    }
                }
                Err(err) => (
                    false,
                    Some(format!("Invalid regex pattern '{}': {}", pattern, err)),
                ),
            },
            None => (
                false,
                Some("Regex format selected but no pattern provided".to_owned()),
            ),
        },
    }
}
