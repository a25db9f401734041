use serde_json::Value;

use super::*;
use crate::error::{AppError, AppResult};

#[test]
fn patch_body_renders_tagged_operations() -> AppResult<()> {
    let body = patch_body(&[
        PatchOperation::add("title", Value::String("Engineer".to_owned())),
        PatchOperation::replace("displayName", Value::String("New Name".to_owned())),
        PatchOperation::remove("title"),
    ]);
    let json: Value = serde_json::from_str(&body)?;

    let schemas = json
        .get("schemas")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::engine("Missing schemas array"))?;
    if schemas.first().and_then(Value::as_str) != Some(PATCH_OP_SCHEMA) {
        return Err(AppError::engine("Wrong PatchOp schema urn"));
    }

    let ops = json
        .get("Operations")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::engine("Missing Operations array"))?;
    if ops.len() != 3 {
        return Err(AppError::engine(format!("Expected 3 ops, got {}", ops.len())));
    }
    let op_names: Vec<&str> = ops
        .iter()
        .filter_map(|op| op.get("op").and_then(Value::as_str))
        .collect();
    if op_names != ["add", "replace", "remove"] {
        return Err(AppError::engine(format!("Unexpected op tags: {:?}", op_names)));
    }
    if ops.get(2).and_then(|op| op.get("value")).is_some() {
        return Err(AppError::engine("Remove must not carry a value"));
    }
    Ok(())
}

#[test]
fn user_body_carries_joining_value_everywhere() -> AppResult<()> {
    let body = user_body("probe@example.com", "TestUser", "Scim Test User");
    let json: Value = serde_json::from_str(&body)?;
    if json.get("userName").and_then(Value::as_str) != Some("probe@example.com") {
        return Err(AppError::engine("userName missing"));
    }
    if json.pointer("/emails/0/value").and_then(Value::as_str) != Some("probe@example.com") {
        return Err(AppError::engine("email should mirror the userName"));
    }
    if json.get("active").and_then(Value::as_bool) != Some(true) {
        return Err(AppError::engine("active should default to true"));
    }
    Ok(())
}

#[test]
fn extension_body_nests_attribute_under_urn() -> AppResult<()> {
    let urn = "urn:example:params:scim:schemas:extension:hr:2.0:User";
    let body = user_body_with_extension("x@example.com", urn, "costCenter", &Value::from("CC-7"));
    let json: Value = serde_json::from_str(&body)?;
    let schemas = json
        .get("schemas")
        .and_then(Value::as_array)
        .ok_or_else(|| AppError::engine("Missing schemas"))?;
    if !schemas.iter().any(|s| s.as_str() == Some(urn)) {
        return Err(AppError::engine("Extension urn missing from schemas"));
    }
    if json.get(urn).and_then(|ext| ext.get("costCenter")).and_then(Value::as_str) != Some("CC-7") {
        return Err(AppError::engine("Extension attribute not nested under urn"));
    }
    Ok(())
}

#[test]
fn resources_lookup_is_case_insensitive() -> AppResult<()> {
    let upper = serde_json::json!({ "Resources": [1] });
    let lower = serde_json::json!({ "resources": [2] });
    let neither = serde_json::json!({ "totalResults": 0 });
    if get_resources(&upper).is_none() || get_resources(&lower).is_none() {
        return Err(AppError::engine("Resources lookup failed"));
    }
    if get_resources(&neither).is_some() {
        return Err(AppError::engine("Expected no Resources key"));
    }
    Ok(())
}

#[test]
fn attribute_paths_resolve_nested_and_indexed() -> AppResult<()> {
    let user = serde_json::json!({
        "userName": "a@example.com",
        "name": { "givenName": "Ada" },
        "emails": [{ "value": "a@example.com" }],
    });
    if resolve_attribute_path(&user, "name.givenName").as_ref().and_then(Value::as_str)
        != Some("Ada")
    {
        return Err(AppError::engine("Dotted path failed"));
    }
    if resolve_attribute_path(&user, "emails[0].value").as_ref().and_then(Value::as_str)
        != Some("a@example.com")
    {
        return Err(AppError::engine("Indexed path failed"));
    }
    if resolve_attribute_path(&user, "missing.attr").is_some() {
        return Err(AppError::engine("Missing path should be None"));
    }
    Ok(())
}

#[test]
fn random_suffix_is_lowercase_alpha() -> AppResult<()> {
    let suffix = random_suffix(12);
    if suffix.len() != 12 {
        return Err(AppError::engine(format!("Expected 12 chars, got {}", suffix.len())));
    }
    if !suffix.chars().all(|ch| ch.is_ascii_lowercase()) {
        return Err(AppError::engine(format!("Non-alpha suffix: {}", suffix)));
    }
    Ok(())
}

#[test]
fn extract_id_reads_created_resource() -> AppResult<()> {
    if extract_id(r#"{"id":"42","userName":"x"}"#).as_deref() != Some("42") {
        return Err(AppError::engine("id not extracted"));
    }
    if extract_id(r#"{"userName":"x"}"#).is_some() {
        return Err(AppError::engine("Expected no id"));
    }
    if extract_id("not json").is_some() {
        return Err(AppError::engine("Malformed body should yield None"));
    }
    Ok(())
}
