use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::scim::ResourceKind;

/// Built-in load scenarios. One scenario run ("unit") executes the
/// whole step chain for one logical resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioKey {
    CreateUsers,
    CreateUpdateUsers,
    UserLifecycle,
    ListUsers,
    CreateGroups,
    GroupLifecycle,
    UpdateGroups,
    MembershipChurn,
}

impl ScenarioKey {
    pub const ALL: [ScenarioKey; 8] = [
        ScenarioKey::CreateUsers,
        ScenarioKey::CreateUpdateUsers,
        ScenarioKey::UserLifecycle,
        ScenarioKey::ListUsers,
        ScenarioKey::CreateGroups,
        ScenarioKey::GroupLifecycle,
        ScenarioKey::UpdateGroups,
        ScenarioKey::MembershipChurn,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ScenarioKey::CreateUsers => "create_users",
            ScenarioKey::CreateUpdateUsers => "create_update_users",
            ScenarioKey::UserLifecycle => "user_lifecycle",
            ScenarioKey::ListUsers => "list_users",
            ScenarioKey::CreateGroups => "create_groups",
            ScenarioKey::GroupLifecycle => "group_lifecycle",
            ScenarioKey::UpdateGroups => "update_groups",
            ScenarioKey::MembershipChurn => "membership_churn",
        }
    }

    /// Parses a user-facing scenario name.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` for unknown names.
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        ScenarioKey::ALL
            .into_iter()
            .find(|key| key.as_str() == value)
            .ok_or_else(|| ConfigError::UnknownScenario {
                name: value.to_owned(),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepRole {
    Create,
    Read,
    Update,
    Delete,
    List,
}

/// Where a step's request goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPath {
    /// The collection endpoint (`/Users`, `/Groups`).
    Collection(ResourceKind),
    /// A resource created earlier in the same unit.
    ById(ResourceKind),
    /// A paging window over `/Users` derived from the unit index.
    ListPage,
}

/// What the step sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepBody {
    None,
    User,
    Group,
    PatchDisplayName,
    /// Adds the unit's created user to the unit's created group.
    PatchAddMember,
    PatchRemoveMember,
}

#[derive(Debug, Clone)]
pub struct ScenarioStep {
    pub role: StepRole,
    pub method: Method,
    pub path: StepPath,
    pub body: StepBody,
}

impl ScenarioStep {
    const fn new(role: StepRole, method: Method, path: StepPath, body: StepBody) -> Self {
        Self {
            role,
            method,
            path,
            body,
        }
    }

    /// The resource kind this step's create produces, if any.
    #[must_use]
    pub fn creates(&self) -> Option<ResourceKind> {
        if self.role == StepRole::Create
            && let StepPath::Collection(kind) = self.path
        {
            return Some(kind);
        }
        None
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioDefinition {
    pub key: ScenarioKey,
    pub name: &'static str,
    pub steps: Vec<ScenarioStep>,
}

impl ScenarioDefinition {
    /// Billable HTTP calls per unit.
    #[must_use]
    pub fn primary_calls(&self) -> usize {
        self.steps.len()
    }

    /// Whether the chain itself deletes resources of `kind`; if so the
    /// worker leaves their cleanup to the in-chain step.
    #[must_use]
    pub fn has_delete_for(&self, kind: ResourceKind) -> bool {
        self.steps
            .iter()
            .any(|step| step.role == StepRole::Delete && step.path == StepPath::ById(kind))
    }
}

/// Looks up a scenario's step chain.
#[must_use]
pub fn scenario(key: ScenarioKey) -> ScenarioDefinition {
    let steps = match key {
        ScenarioKey::CreateUsers => vec![ScenarioStep::new(
            StepRole::Create,
            Method::POST,
            StepPath::Collection(ResourceKind::User),
            StepBody::User,
        )],
        ScenarioKey::CreateUpdateUsers => vec![
            ScenarioStep::new(
                StepRole::Create,
                Method::POST,
                StepPath::Collection(ResourceKind::User),
                StepBody::User,
            ),
            ScenarioStep::new(
                StepRole::Update,
                Method::PATCH,
                StepPath::ById(ResourceKind::User),
                StepBody::PatchDisplayName,
            ),
        ],
        ScenarioKey::UserLifecycle => vec![
            ScenarioStep::new(
                StepRole::Create,
                Method::POST,
                StepPath::Collection(ResourceKind::User),
                StepBody::User,
            ),
            ScenarioStep::new(
                StepRole::Read,
                Method::GET,
                StepPath::ById(ResourceKind::User),
                StepBody::None,
            ),
            ScenarioStep::new(
                StepRole::Delete,
                Method::DELETE,
                StepPath::ById(ResourceKind::User),
                StepBody::None,
            ),
        ],
        ScenarioKey::ListUsers => vec![ScenarioStep::new(
            StepRole::List,
            Method::GET,
            StepPath::ListPage,
            StepBody::None,
        )],
        ScenarioKey::CreateGroups => vec![ScenarioStep::new(
            StepRole::Create,
            Method::POST,
            StepPath::Collection(ResourceKind::Group),
            StepBody::Group,
        )],
        ScenarioKey::GroupLifecycle => vec![
            ScenarioStep::new(
                StepRole::Create,
                Method::POST,
                StepPath::Collection(ResourceKind::Group),
                StepBody::Group,
            ),
            ScenarioStep::new(
                StepRole::Read,
                Method::GET,
                StepPath::ById(ResourceKind::Group),
                StepBody::None,
            ),
            ScenarioStep::new(
                StepRole::Delete,
                Method::DELETE,
                StepPath::ById(ResourceKind::Group),
                StepBody::None,
            ),
        ],
        ScenarioKey::UpdateGroups => vec![
            ScenarioStep::new(
                StepRole::Create,
                Method::POST,
                StepPath::Collection(ResourceKind::Group),
                StepBody::Group,
            ),
            ScenarioStep::new(
                StepRole::Update,
                Method::PATCH,
                StepPath::ById(ResourceKind::Group),
                StepBody::PatchDisplayName,
            ),
        ],
        ScenarioKey::MembershipChurn => vec![
            ScenarioStep::new(
                StepRole::Create,
                Method::POST,
                StepPath::Collection(ResourceKind::Group),
                StepBody::Group,
            ),
            ScenarioStep::new(
                StepRole::Create,
                Method::POST,
                StepPath::Collection(ResourceKind::User),
                StepBody::User,
            ),
            ScenarioStep::new(
                StepRole::Update,
                Method::PATCH,
                StepPath::ById(ResourceKind::Group),
                StepBody::PatchAddMember,
            ),
            ScenarioStep::new(
                StepRole::Update,
                Method::PATCH,
                StepPath::ById(ResourceKind::Group),
                StepBody::PatchRemoveMember,
            ),
        ],
    };

    let name = match key {
        ScenarioKey::CreateUsers => "Create Users",
        ScenarioKey::CreateUpdateUsers => "Create + Update Users",
        ScenarioKey::UserLifecycle => "User Lifecycle",
        ScenarioKey::ListUsers => "List Users",
        ScenarioKey::CreateGroups => "Create Groups",
        ScenarioKey::GroupLifecycle => "Group Lifecycle",
        ScenarioKey::UpdateGroups => "Update Groups",
        ScenarioKey::MembershipChurn => "Membership Churn",
    };

    ScenarioDefinition { key, name, steps }
}
