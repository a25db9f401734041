//! SCIM 2.0 wire vocabulary: resource kinds, request bodies, patch
//! operations, and response JSON helpers.
mod bodies;
mod json;
mod patch;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};

pub use bodies::{group_body, patch_display_name, random_suffix, user_body, user_body_with_extension};
pub use json::{extract_id, get_resources, resolve_attribute_path};
pub use patch::{PATCH_OP_SCHEMA, PatchOperation, patch_body};

pub const USER_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:User";
pub const GROUP_SCHEMA: &str = "urn:ietf:params:scim:schemas:core:2.0:Group";

/// Prefixes of schema URNs whose attributes are covered by the core
/// test categories and skipped during extension-attribute discovery.
pub const CORE_SCHEMA_PREFIXES: [&str; 2] = [
    "urn:ietf:params:scim:schemas:core:2.0:",
    "urn:ietf:params:scim:api:messages:2.0:",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    User,
    Group,
}

impl ResourceKind {
    #[must_use]
    pub const fn endpoint(self) -> &'static str {
        match self {
            ResourceKind::User => "/Users",
            ResourceKind::Group => "/Groups",
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ResourceKind::User => "user",
            ResourceKind::Group => "group",
        }
    }
}
