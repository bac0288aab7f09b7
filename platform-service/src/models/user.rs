//! User role assignments. Identity itself lives outside this service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use utoipa::ToSchema;

/// Roles held by a single user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRoleAssignments {
    #[serde(rename = "_id")]
    pub user_id: String,
    /// At most one system role.
    pub system_role_id: Option<String>,
    /// Tenant id to tenant role id, at most one per tenant.
    #[serde(default)]
    pub tenant_roles: BTreeMap<String, String>,
    #[serde(default)]
    pub custom_role_ids: Vec<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl UserRoleAssignments {
    /// A user with no roles at all.
    pub fn empty(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            system_role_id: None,
            tenant_roles: BTreeMap::new(),
            custom_role_ids: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn with_system_role(mut self, role_id: impl Into<String>) -> Self {
        self.system_role_id = Some(role_id.into());
        self
    }

    pub fn with_tenant_role(
        mut self,
        tenant_id: impl Into<String>,
        role_id: impl Into<String>,
    ) -> Self {
        self.tenant_roles.insert(tenant_id.into(), role_id.into());
        self
    }
}

/// Replacement for a user's assignments.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct AssignmentUpdate {
    pub system_role_id: Option<String>,
    #[serde(default)]
    pub tenant_roles: BTreeMap<String, String>,
    #[serde(default)]
    pub custom_role_ids: Vec<String>,
}
