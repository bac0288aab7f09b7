//! Tenant model - isolation boundary for tenant and custom roles.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Tenant status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum TenantStatus {
    Active,
    Inactive,
}

impl TenantStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TenantStatus::Active => "active",
            TenantStatus::Inactive => "inactive",
        }
    }
}

/// Tenant entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(rename = "_id")]
    pub id: String,
    pub code: String,
    pub name: String,
    pub domain: String,
    pub contact_email: String,
    pub contact_phone: String,
    pub is_active: bool,
    pub allow_comments: bool,
    pub allow_rating: bool,
    pub status: TenantStatus,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Create a new active tenant.
    pub fn new(input: NewTenant) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            code: input.code.trim().to_lowercase(),
            name: input.name.trim().to_string(),
            domain: input.domain.trim().to_lowercase(),
            contact_email: input.contact_email.trim().to_string(),
            contact_phone: input.contact_phone.trim().to_string(),
            is_active: true,
            allow_comments: input.allow_comments.unwrap_or(true),
            allow_rating: input.allow_rating.unwrap_or(true),
            status: TenantStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        self.status = if active {
            TenantStatus::Active
        } else {
            TenantStatus::Inactive
        };
        self.updated_at = Utc::now();
    }
}

/// Request to create a tenant.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewTenant {
    #[validate(length(min = 2, max = 50, message = "Code must be 2-50 characters"))]
    #[schema(example = "acme")]
    pub code: String,

    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 3, max = 253, message = "Domain must be 3-253 characters"))]
    #[schema(example = "acme.example.com")]
    pub domain: String,

    #[validate(email(message = "Invalid contact email"))]
    pub contact_email: String,

    #[validate(length(min = 3, max = 32, message = "Contact phone must be 3-32 characters"))]
    pub contact_phone: String,

    pub allow_comments: Option<bool>,
    pub allow_rating: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_tenant() -> NewTenant {
        NewTenant {
            code: " ACME ".to_string(),
            name: "Acme Stories".to_string(),
            domain: "Acme.Example.com".to_string(),
            contact_email: "ops@acme.example.com".to_string(),
            contact_phone: "+1 555 0100".to_string(),
            allow_comments: None,
            allow_rating: Some(false),
        }
    }

    #[test]
    fn test_new_tenant_defaults() {
        let tenant = Tenant::new(new_tenant());
        assert_eq!(tenant.code, "acme");
        assert_eq!(tenant.domain, "acme.example.com");
        assert!(tenant.is_active);
        assert!(tenant.allow_comments);
        assert!(!tenant.allow_rating);
        assert_eq!(tenant.status, TenantStatus::Active);
    }

    #[test]
    fn test_set_active_tracks_status() {
        let mut tenant = Tenant::new(new_tenant());
        tenant.set_active(false);
        assert!(!tenant.is_active);
        assert_eq!(tenant.status.as_str(), "inactive");
    }

    #[test]
    fn test_invalid_email_rejected() {
        let mut input = new_tenant();
        input.contact_email = "not-an-email".to_string();
        assert!(input.validate().is_err());
    }
}
