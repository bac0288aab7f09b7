use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::models::{
    Permission, PermissionGrant, ResourceType, Role, RoleType, UserRoleAssignments,
};
use crate::rbac::{Decision, EffectiveGrants, ResolvedGrant};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PermissionResponse {
    #[schema(example = "PUBLISH_STORY")]
    pub code: String,
    pub display_name: String,
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub category: String,
    pub is_system_level: bool,
    pub is_built_in: bool,
    pub is_active: bool,
    pub parent_permission_id: Option<String>,
    pub required_permissions: Vec<String>,
    pub conflicting_permissions: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Permission> for PermissionResponse {
    fn from(p: Permission) -> Self {
        Self {
            code: p.code,
            display_name: p.display_name,
            description: p.description,
            resource_type: p.resource_type,
            category: p.category,
            is_system_level: p.is_system_level,
            is_built_in: p.is_built_in,
            is_active: p.is_active,
            parent_permission_id: p.parent_permission_id,
            required_permissions: p.required_permissions,
            conflicting_permissions: p.conflicting_permissions,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

/// Query parameters for listing permissions.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PermissionListQuery {
    pub resource_type: Option<ResourceType>,
    pub category: Option<String>,
    /// Include deactivated permissions.
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RoleResponse {
    pub id: String,
    #[schema(example = "editor")]
    pub name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub role_type: RoleType,
    pub tenant_id: Option<String>,
    pub permissions: Vec<PermissionGrant>,
    pub inherits_from: Vec<String>,
    pub is_active: bool,
    pub is_built_in: bool,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(r: Role) -> Self {
        Self {
            id: r.id,
            name: r.name,
            display_name: r.display_name,
            description: r.description,
            role_type: r.role_type,
            tenant_id: r.tenant_id,
            permissions: r.permissions,
            inherits_from: r.inherits_from,
            is_active: r.is_active,
            is_built_in: r.is_built_in,
            created_by: r.created_by,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EffectiveGrantsResponse {
    pub role_id: String,
    pub permissions: Vec<String>,
    pub grants: Vec<ResolvedGrant>,
}

impl From<EffectiveGrants> for EffectiveGrantsResponse {
    fn from(e: EffectiveGrants) -> Self {
        let permissions = e.permission_codes().into_iter().map(String::from).collect();
        Self {
            role_id: e.role_id,
            permissions,
            grants: e.grants,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignmentsResponse {
    pub user_id: String,
    pub system_role_id: Option<String>,
    #[schema(value_type = Object)]
    pub tenant_roles: std::collections::BTreeMap<String, String>,
    pub custom_role_ids: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<UserRoleAssignments> for AssignmentsResponse {
    fn from(a: UserRoleAssignments) -> Self {
        Self {
            user_id: a.user_id,
            system_role_id: a.system_role_id,
            tenant_roles: a.tenant_roles,
            custom_role_ids: a.custom_role_ids,
            updated_at: a.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthorizationResponse {
    pub decision: Decision,
    pub user_id: String,
    pub tenant_id: Option<String>,
    #[schema(example = "EDIT_STORY")]
    pub permission: String,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
}
