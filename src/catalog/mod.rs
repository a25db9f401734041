//! The scenario catalog: static definitions of validation cases and
//! load scenario chains. Pure data plus lookup; execution lives in
//! the orchestrators. Categories whose cases depend on runtime inputs
//! (configured field-mapping rules, discovered schema attributes) are
//! produced by builder functions over those inputs.
mod load;
mod validation;


use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub use load::{
    ScenarioDefinition, ScenarioKey, ScenarioStep, StepBody, StepPath, StepRole, scenario,
};
pub use validation::{
    BodySpec, CaseAction, CatalogInputs, Expectation, ValidationCase, cases_for,
};

/// Validation categories in catalog-fixed execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SchemaDiscovery,
    UsersCrud,
    GroupsCrud,
    PatchOperations,
    DuplicateDetection,
    SoftDelete,
    FilteringPagination,
    GroupMembership,
    FieldMapping,
    CustomSchema,
}

impl Category {
    pub const ALL: [Category; 10] = [
        Category::SchemaDiscovery,
        Category::UsersCrud,
        Category::GroupsCrud,
        Category::PatchOperations,
        Category::DuplicateDetection,
        Category::SoftDelete,
        Category::FilteringPagination,
        Category::GroupMembership,
        Category::FieldMapping,
        Category::CustomSchema,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::SchemaDiscovery => "schema_discovery",
            Category::UsersCrud => "users_crud",
            Category::GroupsCrud => "groups_crud",
            Category::PatchOperations => "patch_operations",
            Category::DuplicateDetection => "duplicate_detection",
            Category::SoftDelete => "soft_delete",
            Category::FilteringPagination => "filtering_pagination",
            Category::GroupMembership => "group_membership",
            Category::FieldMapping => "field_mapping",
            Category::CustomSchema => "custom_schema",
        }
    }

    /// Parses a user-facing category name.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for unknown names.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        Category::ALL
            .into_iter()
            .find(|category| category.as_str() == value)
            .ok_or_else(|| ConfigError::UnknownCategory {
                name: value.to_owned(),
            })
    }

    /// Orders an arbitrary selection into catalog execution order,
    /// dropping duplicates.
    #[must_use]
    pub fn ordered(selection: &[Category]) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| selection.contains(category))
            .collect()
    }
}
