use std::collections::HashMap;

use serde_json::Value;

use crate::catalog::BodySpec;
use crate::scim::{
    self, PatchOperation, ResourceKind, patch_body, random_suffix, user_body,
    user_body_with_extension,
};

const NAME_SUFFIX_LEN: usize = 8;

/// Per-category mutable state threaded through a case chain: the
/// unique joining values, ids captured from successful creates, and
/// the sample-user JSON field-mapping rules are asserted against.
#[derive(Debug)]
pub(super) struct ChainContext {
    user_joining_property: String,
    group_joining_property: String,
    user_name: String,
    group_name: String,
    user_create_body: Option<String>,
    captured: HashMap<ResourceKind, String>,
    sample_user: Option<Value>,
}

impl ChainContext {
    pub(super) fn new(user_joining_property: &str, group_joining_property: &str) -> Self {
        let suffix = random_suffix(NAME_SUFFIX_LEN);
        Self {
            user_joining_property: user_joining_property.to_owned(),
            group_joining_property: group_joining_property.to_owned(),
            user_name: format!("scimstress_{}@test.example.com", suffix),
            group_name: format!("scimstress_group_{}", suffix),
            user_create_body: None,
            captured: HashMap::new(),
            sample_user: None,
        }
    }

    pub(super) fn joining_property(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::User => &self.user_joining_property,
            ResourceKind::Group => &self.group_joining_property,
        }
    }

    pub(super) fn joining_value(&self, kind: ResourceKind) -> &str {
        match kind {
            ResourceKind::User => &self.user_name,
            ResourceKind::Group => &self.group_name,
        }
    }

    pub(super) fn capture(&mut self, kind: ResourceKind, id: String) {
        self.captured.insert(kind, id);
    }

    pub(super) fn captured_id(&self, kind: ResourceKind) -> Option<&str> {
        self.captured.get(&kind).map(String::as_str)
    }

    pub(super) fn set_sample_user(&mut self, user: Value) {
        self.sample_user = Some(user);
    }

    pub(super) fn sample_user(&self) -> Option<&Value> {
        self.sample_user.as_ref()
    }

    /// Resolves `{user_id}` / `{group_id}` / `{random_id}` placeholders.
    /// A placeholder with no captured value means the producing case
    /// did not run; the caller records the case as skipped.
    pub(super) fn render_path(&self, template: &str) -> Result<String, String> {
        let mut rendered = template.to_owned();
        if rendered.contains("{user_id}") {
            let id = self
                .captured_id(ResourceKind::User)
                .ok_or_else(|| "no user id captured".to_owned())?;
            rendered = rendered.replace("{user_id}", id);
        }
        if rendered.contains("{group_id}") {
            let id = self
                .captured_id(ResourceKind::Group)
                .ok_or_else(|| "no group id captured".to_owned())?;
            rendered = rendered.replace("{group_id}", id);
        }
        if rendered.contains("{random_id}") {
            rendered = rendered.replace("{random_id}", &uuid::Uuid::new_v4().to_string());
        }
        Ok(rendered)
    }

    /// Resolves `{joining_filter}` in query values.
    pub(super) fn render_query(&self, query: &[(String, String)]) -> Vec<(String, String)> {
        query
            .iter()
            .map(|(key, value)| {
                let rendered = value.replace(
                    "{joining_filter}",
                    &format!("{} eq \"{}\"", self.user_joining_property, self.user_name),
                );
                (key.clone(), rendered)
            })
            .collect()
    }

    /// Renders a body spec. `Err` carries the reason the body cannot be
    /// built (a missing captured id), which the caller records as skip.
    pub(super) fn render_body(&mut self, spec: &BodySpec) -> Result<Option<String>, String> {
        match spec {
            BodySpec::None => Ok(None),
            BodySpec::CreateUser => Ok(Some(self.user_create_body())),
            BodySpec::CreateUserDuplicate => {
                // Byte-identical re-send; builds the body if the chain
                // never created one (the dependency rules prevent that).
                Ok(Some(self.user_create_body()))
            }
            BodySpec::ReplaceUser => Ok(Some(user_body(
                &self.user_name,
                "UpdatedUser",
                "Scim Updated User",
            ))),
            BodySpec::CreateGroup => Ok(Some(scim::group_body(&self.group_name))),
            BodySpec::Patch(operations) => Ok(Some(patch_body(operations))),
            BodySpec::PatchAddMember => {
                let user_id = self
                    .captured_id(ResourceKind::User)
                    .ok_or_else(|| "no user id captured".to_owned())?;
                Ok(Some(patch_body(&[PatchOperation::add(
                    "members",
                    serde_json::json!([{ "value": user_id }]),
                )])))
            }
            BodySpec::PatchRemoveMember => {
                let user_id = self
                    .captured_id(ResourceKind::User)
                    .ok_or_else(|| "no user id captured".to_owned())?;
                Ok(Some(patch_body(&[PatchOperation::remove(format!(
                    "members[value eq \"{}\"]",
                    user_id
                ))])))
            }
            BodySpec::PatchDeactivate => Ok(Some(patch_body(&[PatchOperation::replace(
                "active",
                Value::Bool(false),
            )]))),
            BodySpec::CreateUserWithExtension {
                schema_urn,
                attr_name,
                value,
            } => {
                let suffix = random_suffix(NAME_SUFFIX_LEN);
                let user_name = format!("scimstress_ext_{}@test.example.com", suffix);
                Ok(Some(user_body_with_extension(
                    &user_name, schema_urn, attr_name, value,
                )))
            }
        }
    }

    /// The chain's user create body, cached so duplicate-detection can
    /// re-send the identical joining value.
    fn user_create_body(&mut self) -> String {
        if let Some(body) = self.user_create_body.as_ref() {
            return body.clone();
        }
        let body = self.build_user_body();
        self.user_create_body = Some(body.clone());
        body
    }

    fn build_user_body(&self) -> String {
        let body = user_body(&self.user_name, "TestUser", "Scim Test User");
        if self.user_joining_property == "userName" {
            return body;
        }
        // A non-default top-level joining attribute also carries the
        // unique value so duplicate detection and echo checks hold.
        let Ok(mut json) = serde_json::from_str::<Value>(&body) else {
            return body;
        };
        if !self.user_joining_property.contains('.')
            && let Some(object) = json.as_object_mut()
        {
            object.insert(
                self.user_joining_property.clone(),
                Value::String(self.user_name.clone()),
            );
        }
        json.to_string()
    }
}
