use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const PATCH_OP_SCHEMA: &str = "urn:ietf:params:scim:api:messages:2.0:PatchOp";

/// One SCIM patch operation. A tagged variant rather than an untyped
/// map so bodies are structurally valid before they hit the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum PatchOperation {
    Add {
        path: String,
        value: Value,
    },
    Replace {
        #[serde(skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        value: Value,
    },
    Remove {
        path: String,
    },
}

impl PatchOperation {
    #[must_use]
    pub fn add(path: impl Into<String>, value: Value) -> Self {
        PatchOperation::Add {
            path: path.into(),
            value,
        }
    }

    #[must_use]
    pub fn replace(path: impl Into<String>, value: Value) -> Self {
        PatchOperation::Replace {
            path: Some(path.into()),
            value,
        }
    }

    #[must_use]
    pub fn remove(path: impl Into<String>) -> Self {
        PatchOperation::Remove { path: path.into() }
    }
}

/// Renders a full `PatchOp` message body.
#[must_use]
pub fn patch_body(operations: &[PatchOperation]) -> String {
    serde_json::json!({
        "schemas": [PATCH_OP_SCHEMA],
        "Operations": operations,
    })
    .to_string()
}
