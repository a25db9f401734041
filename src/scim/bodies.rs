use rand::Rng;
use serde_json::{Map, Value};

use super::patch::PatchOperation;
use super::{GROUP_SCHEMA, USER_SCHEMA, patch_body};

const SUFFIX_ALPHABET_LEN: u8 = 26;

/// Lowercase-alphabetic suffix for unique resource names.
#[must_use]
pub fn random_suffix(len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| {
            let idx = rng.gen_range(0..SUFFIX_ALPHABET_LEN);
            char::from(b'a'.wrapping_add(idx))
        })
        .collect()
}

/// A full User create/replace body. The joining attribute (usually
/// `userName`) carries the caller-provided unique value; everything
/// else is plausible fixture data.
#[must_use]
pub fn user_body(user_name: &str, family_name: &str, display_name: &str) -> String {
    serde_json::json!({
        "schemas": [USER_SCHEMA],
        "userName": user_name,
        "name": {
            "givenName": "Scim",
            "familyName": family_name,
        },
        "emails": [{
            "value": user_name,
            "type": "work",
            "primary": true,
        }],
        "displayName": display_name,
        "active": true,
    })
    .to_string()
}

/// A User create body carrying one extension-schema attribute, nested
/// under its schema URN as RFC 7643 requires.
#[must_use]
pub fn user_body_with_extension(
    user_name: &str,
    schema_urn: &str,
    attr_name: &str,
    value: &Value,
) -> String {
    let mut body = Map::new();
    body.insert(
        "schemas".to_owned(),
        serde_json::json!([USER_SCHEMA, schema_urn]),
    );
    body.insert("userName".to_owned(), Value::String(user_name.to_owned()));
    body.insert(
        "name".to_owned(),
        serde_json::json!({ "givenName": "Scim", "familyName": "ExtensionTest" }),
    );
    body.insert(
        "emails".to_owned(),
        serde_json::json!([{ "value": user_name, "type": "work", "primary": true }]),
    );
    body.insert(
        "displayName".to_owned(),
        Value::String("Scim Extension Test".to_owned()),
    );
    body.insert("active".to_owned(), Value::Bool(true));

    let mut extension = Map::new();
    extension.insert(attr_name.to_owned(), value.clone());
    body.insert(schema_urn.to_owned(), Value::Object(extension));

    Value::Object(body).to_string()
}

#[must_use]
pub fn group_body(display_name: &str) -> String {
    serde_json::json!({
        "schemas": [GROUP_SCHEMA],
        "displayName": display_name,
        "members": [],
    })
    .to_string()
}

/// A patch that replaces `displayName` with a fresh random value.
#[must_use]
pub fn patch_display_name() -> String {
    let suffix = random_suffix(6);
    patch_body(&[PatchOperation::replace(
        "displayName",
        Value::String(format!("Updated_{}", suffix)),
    )])
}
