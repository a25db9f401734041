use reqwest::Method;
use serde_json::Value;

use crate::config::FieldMappingRule;
use crate::scim::{PatchOperation, ResourceKind};
use crate::validation::DiscoveredSchemaAttribute;

use super::Category;

/// Runtime inputs the static catalog is resolved against.
#[derive(Debug, Default)]
pub struct CatalogInputs {
    pub field_mapping_rules: Vec<FieldMappingRule>,
    pub custom_attributes: Vec<DiscoveredSchemaAttribute>,
}

/// One conformance check. `depends_on` names a prior case in the same
/// category whose captured output (usually a created resource id) this
/// case needs; when that case did not pass, this one is recorded as
/// skipped without issuing any HTTP call.
#[derive(Debug, Clone)]
pub struct ValidationCase {
    pub key: String,
    pub name: String,
    pub category: Category,
    pub depends_on: Option<String>,
    pub action: CaseAction,
}

#[derive(Debug, Clone)]
pub enum CaseAction {
    Http {
        method: Method,
        /// Path template; `{user_id}`, `{group_id}`, and `{random_id}`
        /// are resolved against the chain context at execution time.
        path: String,
        /// Query pairs; values may carry `{user_name}` placeholders.
        query: Vec<(String, String)>,
        body: BodySpec,
        expect: Expectation,
    },
    /// Local assertion of a field-mapping rule against the sample
    /// user captured by the dependency case. No HTTP call.
    FieldRule { rule: FieldMappingRule },
    /// Informational placeholder (e.g. nothing to test); always passes.
    Note { message: String },
}

/// Request-body recipe, rendered against the chain context.
#[derive(Debug, Clone)]
pub enum BodySpec {
    None,
    /// Fresh user carrying the chain's unique joining value.
    CreateUser,
    /// Byte-identical re-send of the chain's create body, for
    /// duplicate detection.
    CreateUserDuplicate,
    /// PUT replacement with `familyName` set to `UpdatedUser`.
    ReplaceUser,
    CreateGroup,
    Patch(Vec<PatchOperation>),
    /// PATCH add of the chain's captured user to a group.
    PatchAddMember,
    PatchRemoveMember,
    /// PATCH replace of `active` to `false`.
    PatchDeactivate,
    CreateUserWithExtension {
        schema_urn: String,
        attr_name: String,
        value: Value,
    },
}

/// Interpreted assertion over the response, evaluated by the runner.
#[derive(Debug, Clone)]
pub enum Expectation {
    Status(u16),
    StatusIn(Vec<u16>),
    /// 200 with a `schemas` attribute present.
    ServiceProviderConfig,
    /// 200 with a `Resources` array or a bare schema array.
    SchemasListing,
    /// 201 with an `id`; captures the id into the chain context.
    Created(ResourceKind),
    /// 200 and the configured joining attribute echoes the chain value.
    JoiningEcho(ResourceKind),
    /// 200 with consistent `totalResults`/`Resources`.
    ListConsistent,
    /// 200 and `name.familyName` equals `UpdatedUser`.
    UpdatedFamilyName,
    /// 204 or 200.
    Deleted,
    NotFound,
    /// 409 uniqueness rejection.
    Conflict,
    /// 200 and the filter matched at least the chain's user.
    FilterFindsUser,
    /// 200 with `totalResults` present.
    PagedList,
    /// 400 for a malformed filter.
    InvalidFilterRejected,
    /// 200 and `active == false`.
    Inactive,
    /// 200 and the group's members contain the chain's user id.
    GroupHasMember,
    /// 201 and the extension attribute is echoed unchanged.
    ExtensionEcho {
        schema_urn: String,
        attr_name: String,
        value: Value,
    },
}

fn http_case(
    category: Category,
    key: &str,
    name: &str,
    depends_on: Option<&str>,
    method: Method,
    path: &str,
    body: BodySpec,
    expect: Expectation,
) -> ValidationCase {
    ValidationCase {
        key: format!("{}.{}", category.as_str(), key),
        name: name.to_owned(),
        category,
        depends_on: depends_on.map(|dep| format!("{}.{}", category.as_str(), dep)),
        action: CaseAction::Http {
            method,
            path: path.to_owned(),
            query: Vec::new(),
            body,
            expect,
        },
    }
}

fn query_case(
    category: Category,
    key: &str,
    name: &str,
    depends_on: Option<&str>,
    query: &[(&str, &str)],
    expect: Expectation,
) -> ValidationCase {
    ValidationCase {
        key: format!("{}.{}", category.as_str(), key),
        name: name.to_owned(),
        category,
        depends_on: depends_on.map(|dep| format!("{}.{}", category.as_str(), dep)),
        action: CaseAction::Http {
            method: Method::GET,
            path: "/Users".to_owned(),
            query: query
                .iter()
                .map(|(key, value)| ((*key).to_owned(), (*value).to_owned()))
                .collect(),
            body: BodySpec::None,
            expect,
        },
    }
}

/// Resolves one category into its ordered case list.
#[must_use]
pub fn cases_for(category: Category, inputs: &CatalogInputs) -> Vec<ValidationCase> {
    match category {
        Category::SchemaDiscovery => schema_discovery(),
        Category::UsersCrud => resource_crud(category, ResourceKind::User),
        Category::GroupsCrud => resource_crud(category, ResourceKind::Group),
        Category::PatchOperations => patch_operations(),
        Category::DuplicateDetection => duplicate_detection(),
        Category::SoftDelete => soft_delete(),
        Category::FilteringPagination => filtering_pagination(),
        Category::GroupMembership => group_membership(),
        Category::FieldMapping => field_mapping(&inputs.field_mapping_rules),
        Category::CustomSchema => custom_schema(&inputs.custom_attributes),
    }
}

fn schema_discovery() -> Vec<ValidationCase> {
    let category = Category::SchemaDiscovery;
    vec![
        http_case(
            category,
            "service_provider_config",
            "GET /ServiceProviderConfig",
            None,
            Method::GET,
            "/ServiceProviderConfig",
            BodySpec::None,
            Expectation::ServiceProviderConfig,
        ),
        http_case(
            category,
            "schemas",
            "GET /Schemas",
            None,
            Method::GET,
            "/Schemas",
            BodySpec::None,
            Expectation::SchemasListing,
        ),
        http_case(
            category,
            "resource_types",
            "GET /ResourceTypes",
            None,
            Method::GET,
            "/ResourceTypes",
            BodySpec::None,
            Expectation::Status(200),
        ),
    ]
}

fn resource_crud(category: Category, kind: ResourceKind) -> Vec<ValidationCase> {
    let endpoint = kind.endpoint();
    let by_id = format!("{}/{{{}_id}}", endpoint, kind.as_str());
    let label = match kind {
        ResourceKind::User => "User",
        ResourceKind::Group => "Group",
    };
    let create_body = match kind {
        ResourceKind::User => BodySpec::CreateUser,
        ResourceKind::Group => BodySpec::CreateGroup,
    };
    let update_body = match kind {
        ResourceKind::User => BodySpec::ReplaceUser,
        ResourceKind::Group => BodySpec::Patch(vec![PatchOperation::replace(
            "displayName",
            Value::String("Updated Test Group".to_owned()),
        )]),
    };
    let update_expect = match kind {
        ResourceKind::User => Expectation::UpdatedFamilyName,
        ResourceKind::Group => Expectation::StatusIn(vec![200, 204]),
    };
    let update_method = match kind {
        ResourceKind::User => Method::PUT,
        ResourceKind::Group => Method::PATCH,
    };

    vec![
        http_case(
            category,
            "create",
            &format!("POST {} - Create Test {}", endpoint, label),
            None,
            Method::POST,
            endpoint,
            create_body,
            Expectation::Created(kind),
        ),
        http_case(
            category,
            "read",
            &format!("GET {}/{{id}} - Read Test {}", endpoint, label),
            Some("create"),
            Method::GET,
            &by_id,
            BodySpec::None,
            Expectation::JoiningEcho(kind),
        ),
        http_case(
            category,
            "list",
            &format!("GET {} - List {}s", endpoint, label),
            None,
            Method::GET,
            endpoint,
            BodySpec::None,
            Expectation::ListConsistent,
        ),
        http_case(
            category,
            "update",
            &format!("{} {}/{{id}} - Update Test {}", update_method, endpoint, label),
            Some("create"),
            update_method,
            &by_id,
            update_body,
            update_expect,
        ),
        http_case(
            category,
            "delete",
            &format!("DELETE {}/{{id}} - Delete Test {}", endpoint, label),
            Some("create"),
            Method::DELETE,
            &by_id,
            BodySpec::None,
            Expectation::Deleted,
        ),
        http_case(
            category,
            "verify_deletion",
            &format!("GET {}/{{id}} - Verify Deletion (expect 404)", endpoint),
            Some("delete"),
            Method::GET,
            &by_id,
            BodySpec::None,
            Expectation::NotFound,
        ),
    ]
}

fn patch_operations() -> Vec<ValidationCase> {
    let category = Category::PatchOperations;
    vec![
        http_case(
            category,
            "create",
            "POST /Users - Create Patch Target",
            None,
            Method::POST,
            "/Users",
            BodySpec::CreateUser,
            Expectation::Created(ResourceKind::User),
        ),
        http_case(
            category,
            "add",
            "PATCH /Users/{id} - Add attribute (title)",
            Some("create"),
            Method::PATCH,
            "/Users/{user_id}",
            BodySpec::Patch(vec![PatchOperation::add(
                "title",
                Value::String("Engineer".to_owned()),
            )]),
            Expectation::Status(200),
        ),
        http_case(
            category,
            "replace",
            "PATCH /Users/{id} - Replace attribute (displayName)",
            Some("create"),
            Method::PATCH,
            "/Users/{user_id}",
            BodySpec::Patch(vec![PatchOperation::replace(
                "displayName",
                Value::String("Updated Patch User".to_owned()),
            )]),
            Expectation::Status(200),
        ),
        http_case(
            category,
            "remove",
            "PATCH /Users/{id} - Remove attribute (title)",
            Some("create"),
            Method::PATCH,
            "/Users/{user_id}",
            BodySpec::Patch(vec![PatchOperation::remove("title")]),
            Expectation::StatusIn(vec![200, 204]),
        ),
        http_case(
            category,
            "not_found",
            "PATCH /Users/{nonexistent} - Expect 404",
            None,
            Method::PATCH,
            "/Users/{random_id}",
            BodySpec::Patch(vec![PatchOperation::add(
                "title",
                Value::String("Test".to_owned()),
            )]),
            Expectation::NotFound,
        ),
    ]
}

fn duplicate_detection() -> Vec<ValidationCase> {
    let category = Category::DuplicateDetection;
    vec![
        http_case(
            category,
            "create",
            "POST /Users - Create Original User",
            None,
            Method::POST,
            "/Users",
            BodySpec::CreateUser,
            Expectation::Created(ResourceKind::User),
        ),
        http_case(
            category,
            "conflict",
            "POST /Users - Duplicate joining value (expect 409)",
            Some("create"),
            Method::POST,
            "/Users",
            BodySpec::CreateUserDuplicate,
            Expectation::Conflict,
        ),
    ]
}

fn soft_delete() -> Vec<ValidationCase> {
    let category = Category::SoftDelete;
    vec![
        http_case(
            category,
            "create",
            "POST /Users - Create Soft-Delete Target",
            None,
            Method::POST,
            "/Users",
            BodySpec::CreateUser,
            Expectation::Created(ResourceKind::User),
        ),
        http_case(
            category,
            "deactivate",
            "PATCH /Users/{id} - Set active=false",
            Some("create"),
            Method::PATCH,
            "/Users/{user_id}",
            BodySpec::PatchDeactivate,
            Expectation::StatusIn(vec![200, 204]),
        ),
        http_case(
            category,
            "verify_inactive",
            "GET /Users/{id} - Verify active=false",
            Some("deactivate"),
            Method::GET,
            "/Users/{user_id}",
            BodySpec::None,
            Expectation::Inactive,
        ),
    ]
}

fn filtering_pagination() -> Vec<ValidationCase> {
    let category = Category::FilteringPagination;
    vec![
        http_case(
            category,
            "create",
            "POST /Users - Create Filter Target",
            None,
            Method::POST,
            "/Users",
            BodySpec::CreateUser,
            Expectation::Created(ResourceKind::User),
        ),
        query_case(
            category,
            "filter_eq",
            "GET /Users?filter - Filter by joining attribute eq",
            Some("create"),
            &[("filter", "{joining_filter}")],
            Expectation::FilterFindsUser,
        ),
        query_case(
            category,
            "pagination",
            "GET /Users?startIndex&count - Pagination",
            None,
            &[("startIndex", "1"), ("count", "2")],
            Expectation::PagedList,
        ),
        query_case(
            category,
            "sort",
            "GET /Users?sortBy - Sort by joining attribute",
            None,
            &[("sortBy", "userName"), ("count", "5")],
            Expectation::Status(200),
        ),
        query_case(
            category,
            "invalid_filter",
            "GET /Users?filter - Invalid filter (expect 400)",
            None,
            &[("filter", "invalidAttribute zz \"bad\"")],
            Expectation::InvalidFilterRejected,
        ),
    ]
}

fn group_membership() -> Vec<ValidationCase> {
    let category = Category::GroupMembership;
    vec![
        http_case(
            category,
            "create_group",
            "POST /Groups - Create Membership Group",
            None,
            Method::POST,
            "/Groups",
            BodySpec::CreateGroup,
            Expectation::Created(ResourceKind::Group),
        ),
        http_case(
            category,
            "create_user",
            "POST /Users - Create Member User",
            Some("create_group"),
            Method::POST,
            "/Users",
            BodySpec::CreateUser,
            Expectation::Created(ResourceKind::User),
        ),
        http_case(
            category,
            "add_member",
            "PATCH /Groups/{id} - Add member",
            Some("create_user"),
            Method::PATCH,
            "/Groups/{group_id}",
            BodySpec::PatchAddMember,
            Expectation::StatusIn(vec![200, 204]),
        ),
        http_case(
            category,
            "verify_member",
            "GET /Groups/{id} - Verify member present",
            Some("add_member"),
            Method::GET,
            "/Groups/{group_id}",
            BodySpec::None,
            Expectation::GroupHasMember,
        ),
        http_case(
            category,
            "remove_member",
            "PATCH /Groups/{id} - Remove member",
            Some("add_member"),
            Method::PATCH,
            "/Groups/{group_id}",
            BodySpec::PatchRemoveMember,
            Expectation::StatusIn(vec![200, 204]),
        ),
    ]
}

fn field_mapping(rules: &[FieldMappingRule]) -> Vec<ValidationCase> {
    let category = Category::FieldMapping;
    if rules.is_empty() {
        return vec![ValidationCase {
            key: format!("{}.none", category.as_str()),
            name: "No field mapping rules defined".to_owned(),
            category,
            depends_on: None,
            action: CaseAction::Note {
                message: "No field mapping rules configured for this target".to_owned(),
            },
        }];
    }

    let mut cases = vec![http_case(
        category,
        "create",
        "POST /Users - Create Sample User",
        None,
        Method::POST,
        "/Users",
        BodySpec::CreateUser,
        Expectation::Created(ResourceKind::User),
    )];
    for (index, rule) in rules.iter().enumerate() {
        cases.push(ValidationCase {
            key: format!("{}.rule_{}", category.as_str(), index),
            name: format!("Field: {} ({})", rule.display_name, rule.scim_attribute),
            category,
            depends_on: Some(format!("{}.create", category.as_str())),
            action: CaseAction::FieldRule { rule: rule.clone() },
        });
    }
    cases
}

fn custom_schema(attributes: &[DiscoveredSchemaAttribute]) -> Vec<ValidationCase> {
    let category = Category::CustomSchema;
    if attributes.is_empty() {
        return vec![ValidationCase {
            key: format!("{}.none", category.as_str()),
            name: "No custom schema attributes discovered".to_owned(),
            category,
            depends_on: None,
            action: CaseAction::Note {
                message: "No extension schema attributes found in /Schemas".to_owned(),
            },
        }];
    }

    let mut cases = Vec::new();
    for (index, attr) in attributes.iter().enumerate() {
        for value in attr.probe_values() {
            let value_display = match &value {
                Value::String(text) => format!("\"{}\"", text),
                other => other.to_string(),
            };
            let short_schema = attr
                .schema_urn
                .rsplit(':')
                .next()
                .unwrap_or(attr.schema_urn.as_str());
            cases.push(ValidationCase {
                key: format!(
                    "{}.attr_{}_{}",
                    category.as_str(),
                    index,
                    cases.len()
                ),
                name: format!(
                    "POST /Users - Create with {}.{} = {}",
                    short_schema, attr.attr_name, value_display
                ),
                category,
                depends_on: None,
                action: CaseAction::Http {
                    method: Method::POST,
                    path: "/Users".to_owned(),
                    query: Vec::new(),
                    body: BodySpec::CreateUserWithExtension {
                        schema_urn: attr.schema_urn.clone(),
                        attr_name: attr.attr_name.clone(),
                        value: value.clone(),
                    },
                    expect: Expectation::ExtensionEcho {
                        schema_urn: attr.schema_urn.clone(),
                        attr_name: attr.attr_name.clone(),
                        value,
                    },
                },
            });
        }
    }
    cases
}
