use serde_json::Value;

use crate::catalog::Expectation;
use crate::http::ApiResponse;
use crate::scim::{ResourceKind, get_resources, resolve_attribute_path};

use super::context::ChainContext;

/// The result of interpreting an [`Expectation`]. `failure` means the
/// case failed; `warning` annotates a pass (e.g. a SHOULD-level RFC
/// deviation) without affecting the outcome.
#[derive(Debug, Default)]
pub(super) struct Verdict {
    pub(super) failure: Option<String>,
    pub(super) warning: Option<String>,
}

impl Verdict {
    fn pass() -> Self {
        Self::default()
    }

    fn fail(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            warning: None,
        }
    }

    fn pass_with_warning(warning: impl Into<String>) -> Self {
        Self {
            failure: None,
            warning: Some(warning.into()),
        }
    }

    pub(super) fn passed(&self) -> bool {
        self.failure.is_none()
    }
}

fn expect_status(response: &ApiResponse, expected: u16) -> Result<(), Verdict> {
    if response.status == expected {
        Ok(())
    } else {
        Err(Verdict::fail(format!(
            "Expected status {}, got {}",
            expected, response.status
        )))
    }
}

fn parse_json(response: &ApiResponse) -> Result<Value, Verdict> {
    response
        .json()
        .ok_or_else(|| Verdict::fail("Response body is not valid JSON"))
}

pub(super) fn evaluate(
    expect: &Expectation,
    response: &ApiResponse,
    ctx: &ChainContext,
) -> Verdict {
    match expect {
        Expectation::Status(code) => match expect_status(response, *code) {
            Ok(()) => Verdict::pass(),
            Err(verdict) => verdict,
        },
        Expectation::StatusIn(codes) => {
            if codes.contains(&response.status) {
                Verdict::pass()
            } else {
                Verdict::fail(format!(
                    "Expected status in {:?}, got {}",
                    codes, response.status
                ))
            }
        }
        Expectation::ServiceProviderConfig => service_provider_config(response),
        Expectation::SchemasListing => schemas_listing(response),
        Expectation::Created(_) => created(response),
        Expectation::JoiningEcho(kind) => joining_echo(response, ctx, *kind),
        Expectation::ListConsistent => list_consistent(response),
        Expectation::UpdatedFamilyName => updated_family_name(response),
        Expectation::Deleted => {
            if response.status == 204 || response.status == 200 {
                Verdict::pass()
            } else {
                Verdict::fail(format!(
                    "Expected status 204 or 200, got {}",
                    response.status
                ))
            }
        }
        Expectation::NotFound => match expect_status(response, 404) {
            Ok(()) => Verdict::pass(),
            Err(verdict) => verdict,
        },
        Expectation::Conflict => {
            if response.status == 409 {
                Verdict::pass()
            } else {
                Verdict::fail(format!(
                    "Expected 409 for a duplicate joining value, got {}",
                    response.status
                ))
            }
        }
        Expectation::FilterFindsUser => filter_finds_user(response),
        Expectation::PagedList => paged_list(response),
        Expectation::InvalidFilterRejected => invalid_filter(response),
        Expectation::Inactive => inactive(response),
        Expectation::GroupHasMember => group_has_member(response, ctx),
        Expectation::ExtensionEcho {
            schema_urn,
            attr_name,
            value,
        } => extension_echo(response, schema_urn, attr_name, value),
    }
}

fn service_provider_config(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    match parse_json(response) {
        Ok(json) if json.get("schemas").is_some() => Verdict::pass(),
        Ok(_) => Verdict::fail("Response missing 'schemas' field"),
        Err(verdict) => verdict,
    }
}

fn schemas_listing(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    match parse_json(response) {
        Ok(json) if get_resources(&json).is_some() || json.is_array() => Verdict::pass(),
        Ok(_) => Verdict::fail("Response should contain a 'Resources' array or be a schema array"),
        Err(verdict) => verdict,
    }
}

fn created(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 201) {
        return verdict;
    }
    match parse_json(response) {
        Ok(json) => match json.get("id").and_then(Value::as_str) {
            Some(id) if !id.is_empty() => Verdict::pass(),
            Some(_) | None => Verdict::fail("Response missing 'id' field"),
        },
        Err(verdict) => verdict,
    }
}

fn joining_echo(response: &ApiResponse, ctx: &ChainContext, kind: ResourceKind) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    let json = match parse_json(response) {
        Ok(json) => json,
        Err(verdict) => return verdict,
    };
    let property = ctx.joining_property(kind);
    let expected = ctx.joining_value(kind);
    match resolve_attribute_path(&json, property) {
        Some(Value::String(actual)) if actual == expected => Verdict::pass(),
        Some(actual) => Verdict::fail(format!(
            "Returned {} '{}' does not match '{}'",
            property, actual, expected
        )),
        None => Verdict::fail(format!("Response missing '{}' attribute", property)),
    }
}

fn list_consistent(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    let json = match parse_json(response) {
        Ok(json) => json,
        Err(verdict) => return verdict,
    };
    let Some(total) = json.get("totalResults").and_then(Value::as_u64) else {
        return Verdict::fail("Response missing 'totalResults' field");
    };
    if total == 0 {
        // Resources is optional for an empty result set (RFC 7644 §3.4.2).
        return Verdict::pass();
    }
    match get_resources(&json).and_then(Value::as_array) {
        Some(resources) if resources.is_empty() => {
            Verdict::fail("'Resources' array is empty but totalResults > 0")
        }
        Some(_) => Verdict::pass(),
        None => Verdict::fail("Response missing 'Resources' array (totalResults > 0)"),
    }
}

fn updated_family_name(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    match parse_json(response) {
        Ok(json) => {
            if json.pointer("/name/familyName").and_then(Value::as_str) == Some("UpdatedUser") {
                Verdict::pass()
            } else {
                Verdict::fail("familyName was not updated to 'UpdatedUser'")
            }
        }
        Err(verdict) => verdict,
    }
}

fn filter_finds_user(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    match parse_json(response) {
        Ok(json) => {
            let total = json
                .get("totalResults")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            if total >= 1 {
                Verdict::pass()
            } else {
                Verdict::fail("Filter returned 0 results, expected at least 1")
            }
        }
        Err(verdict) => verdict,
    }
}

fn paged_list(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    match parse_json(response) {
        Ok(json) if json.get("totalResults").is_some() => Verdict::pass(),
        Ok(_) => Verdict::fail("Response missing 'totalResults' for pagination"),
        Err(verdict) => verdict,
    }
}

/// RFC 7644 §3.4.2.2: servers SHOULD reject an undecipherable filter
/// with 400. Many accept it silently; that passes with a warning.
fn invalid_filter(response: &ApiResponse) -> Verdict {
    match response.status {
        400 => Verdict::pass(),
        200 => Verdict::pass_with_warning(
            "Server returned 200 instead of 400 for an invalid filter (RFC 7644 §3.4.2.2 \
             recommends 400 with scimType \"invalidFilter\")",
        ),
        other => Verdict::fail(format!("Expected 400 for an invalid filter, got {}", other)),
    }
}

fn inactive(response: &ApiResponse) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    match parse_json(response) {
        Ok(json) => match json.get("active").and_then(Value::as_bool) {
            Some(false) => Verdict::pass(),
            Some(true) => Verdict::fail("'active' is still true after soft delete"),
            None => Verdict::fail("Response missing 'active' attribute"),
        },
        Err(verdict) => verdict,
    }
}

fn group_has_member(response: &ApiResponse, ctx: &ChainContext) -> Verdict {
    if let Err(verdict) = expect_status(response, 200) {
        return verdict;
    }
    let Some(user_id) = ctx.captured_id(ResourceKind::User) else {
        return Verdict::fail("No member user id captured");
    };
    match parse_json(response) {
        Ok(json) => {
            let present = json
                .get("members")
                .and_then(Value::as_array)
                .is_some_and(|members| {
                    members
                        .iter()
                        .any(|member| member.get("value").and_then(Value::as_str) == Some(user_id))
                });
            if present {
                Verdict::pass()
            } else {
                Verdict::fail(format!("Group members do not contain '{}'", user_id))
            }
        }
        Err(verdict) => verdict,
    }
}

fn extension_echo(
    response: &ApiResponse,
    schema_urn: &str,
    attr_name: &str,
    expected: &Value,
) -> Verdict {
    if let Err(verdict) = expect_status(response, 201) {
        return verdict;
    }
    let json = match parse_json(response) {
        Ok(json) => json,
        Err(verdict) => return verdict,
    };
    match json.get(schema_urn).and_then(|ext| ext.get(attr_name)) {
        None => Verdict::fail(format!(
            "Response missing extension attribute {}.{}",
            schema_urn, attr_name
        )),
        Some(actual) => {
            let matches = if expected.is_boolean() {
                actual.as_bool() == expected.as_bool()
            } else {
                actual == expected
            };
            if matches {
                Verdict::pass()
            } else {
                Verdict::fail(format!(
                    "Expected {}.{} = {}, got {}",
                    schema_urn, attr_name, expected, actual
                ))
            }
        }
    }
}
