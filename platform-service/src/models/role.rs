//! Role model - named bundles of permission grants, scoped to the platform
//! or to a single tenant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use super::permission::{normalize_code, ResourceType};

/// Role type codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoleType {
    System,
    Tenant,
    Custom,
}

impl RoleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleType::System => "system",
            RoleType::Tenant => "tenant",
            RoleType::Custom => "custom",
        }
    }
}

impl fmt::Display for RoleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mutation scope of a role. Names are unique within a scope and writes are
/// serialized per scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RoleScope {
    System,
    Tenant(String),
}

impl RoleScope {
    pub fn tenant_id(&self) -> Option<&str> {
        match self {
            RoleScope::System => None,
            RoleScope::Tenant(id) => Some(id),
        }
    }
}

impl fmt::Display for RoleScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoleScope::System => f.write_str("system"),
            RoleScope::Tenant(id) => write!(f, "tenant:{}", id),
        }
    }
}

/// Dynamic conditions attached to a grant. Every present condition must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct GrantConditions {
    /// Resource owner must be the requesting user.
    #[serde(default)]
    pub owner_only: bool,
    /// Resource status must be one of these values.
    pub status: Option<Vec<String>>,
    /// Context attributes that must match exactly.
    #[schema(value_type = Option<Object>)]
    pub custom: Option<BTreeMap<String, serde_json::Value>>,
}

impl GrantConditions {
    pub fn is_empty(&self) -> bool {
        !self.owner_only
            && self.status.is_none()
            && self.custom.as_ref().map_or(true, |c| c.is_empty())
    }
}

/// A single permission grant inside a role.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PermissionGrant {
    #[schema(example = "CREATE_STORY")]
    pub permission: String,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    pub conditions: Option<GrantConditions>,
}

/// Identity of a grant for deduplication.
pub type GrantKey = (String, ResourceType, Option<String>);

impl PermissionGrant {
    pub fn new(permission: &str, resource_type: ResourceType) -> Self {
        Self {
            permission: normalize_code(permission),
            resource_type,
            resource_id: None,
            conditions: None,
        }
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_conditions(mut self, conditions: GrantConditions) -> Self {
        self.conditions = Some(conditions);
        self
    }

    pub fn key(&self) -> GrantKey {
        (
            self.permission.clone(),
            self.resource_type,
            self.resource_id.clone(),
        )
    }

    pub(crate) fn normalized(mut self) -> Self {
        self.permission = normalize_code(&self.permission);
        if self.conditions.as_ref().is_some_and(|c| c.is_empty()) {
            self.conditions = None;
        }
        self
    }
}

/// Normalize a role name: trimmed, lower-case.
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Role entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub role_type: RoleType,
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,
    #[serde(default)]
    pub inherits_from: Vec<String>,
    pub is_active: bool,
    pub is_built_in: bool,
    pub created_by: String,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Role {
    /// Create a new role from a request. Invariants are checked by the role
    /// store, not here.
    pub fn new(input: NewRole) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            name: normalize_name(&input.name),
            display_name: input.display_name.trim().to_string(),
            description: input.description.map(|d| d.trim().to_string()),
            role_type: input.role_type,
            tenant_id: input.tenant_id,
            permissions: input
                .permissions
                .into_iter()
                .map(PermissionGrant::normalized)
                .collect(),
            inherits_from: input.inherits_from,
            is_active: true,
            is_built_in: false,
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a built-in role granting each permission on its catalog
    /// resource type.
    pub fn built_in(
        id: String,
        name: &str,
        display_name: &str,
        role_type: RoleType,
        tenant_id: Option<String>,
        permissions: Vec<PermissionGrant>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: normalize_name(name),
            display_name: display_name.to_string(),
            description: None,
            role_type,
            tenant_id,
            permissions,
            inherits_from: Vec::new(),
            is_active: true,
            is_built_in: true,
            created_by: "system".to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    /// The scope this role lives in. Roles that break the type/tenant pairing
    /// are rejected before they reach storage, so a tenant-typed role without
    /// a tenant id is reported under the system scope.
    pub fn scope(&self) -> RoleScope {
        match (&self.role_type, &self.tenant_id) {
            (RoleType::System, _) | (_, None) => RoleScope::System,
            (_, Some(tenant_id)) => RoleScope::Tenant(tenant_id.clone()),
        }
    }
}

/// Request to create a role.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewRole {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    #[schema(example = "senior_editor")]
    pub name: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    #[schema(example = "Senior editor")]
    pub display_name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub role_type: RoleType,

    pub tenant_id: Option<String>,

    #[serde(default)]
    pub permissions: Vec<PermissionGrant>,

    #[serde(default)]
    pub inherits_from: Vec<String>,

    #[validate(length(min = 1, message = "created_by is required"))]
    pub created_by: String,
}

/// Changes to a role. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct RoleUpdate {
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub permissions: Option<Vec<PermissionGrant>>,

    pub inherits_from: Option<Vec<String>>,

    pub is_active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_role(role_type: RoleType, tenant_id: Option<&str>) -> NewRole {
        NewRole {
            name: "  Senior_Editor ".to_string(),
            display_name: "Senior editor".to_string(),
            description: None,
            role_type,
            tenant_id: tenant_id.map(str::to_string),
            permissions: vec![PermissionGrant::new("edit_story", ResourceType::Story)
                .with_conditions(GrantConditions::default())],
            inherits_from: vec![],
            created_by: "admin".to_string(),
        }
    }

    #[test]
    fn test_new_role_normalizes_name_and_grants() {
        let role = Role::new(new_role(RoleType::Custom, Some("t1")));
        assert_eq!(role.name, "senior_editor");
        assert_eq!(role.permissions[0].permission, "EDIT_STORY");
        assert!(role.permissions[0].conditions.is_none());
        assert!(!role.is_built_in);
        assert_eq!(role.scope(), RoleScope::Tenant("t1".to_string()));
    }

    #[test]
    fn test_system_role_scope() {
        let role = Role::new(new_role(RoleType::System, None));
        assert_eq!(role.scope(), RoleScope::System);
        assert_eq!(role.scope().to_string(), "system");
    }

    #[test]
    fn test_grant_key_includes_resource_id() {
        let a = PermissionGrant::new("EDIT_STORY", ResourceType::Story);
        let b = a.clone().with_resource_id("story-1");
        assert_ne!(a.key(), b.key());
    }
}
