use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::RoleResponse;
use crate::models::{Tenant, TenantStatus};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantResponse {
    pub id: String,
    #[schema(example = "acme")]
    pub code: String,
    pub name: String,
    pub domain: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub is_active: bool,
    pub allow_comments: bool,
    pub allow_rating: bool,
    pub status: TenantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Tenant> for TenantResponse {
    fn from(t: Tenant) -> Self {
        Self {
            id: t.id,
            code: t.code,
            name: t.name,
            domain: t.domain,
            contact_email: t.contact_email,
            contact_phone: t.contact_phone,
            is_active: t.is_active,
            allow_comments: t.allow_comments,
            allow_rating: t.allow_rating,
            status: t.status,
            created_at: t.created_at,
            updated_at: t.updated_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct TenantCreatedResponse {
    pub tenant: TenantResponse,
    /// Built-in roles provisioned for the tenant.
    pub roles: Vec<RoleResponse>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TenantStatusRequest {
    pub is_active: bool,
}
