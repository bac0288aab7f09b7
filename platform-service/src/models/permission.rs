//! Permission model - platform-wide capability catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use validator::Validate;

/// Resource types a permission or grant applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    System,
    Tenant,
    Story,
    Chapter,
    User,
    Comment,
    Category,
}

impl ResourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::System => "system",
            ResourceType::Tenant => "tenant",
            ResourceType::Story => "story",
            ResourceType::Chapter => "chapter",
            ResourceType::User => "user",
            ResourceType::Comment => "comment",
            ResourceType::Category => "category",
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "system" => Ok(ResourceType::System),
            "tenant" => Ok(ResourceType::Tenant),
            "story" => Ok(ResourceType::Story),
            "chapter" => Ok(ResourceType::Chapter),
            "user" => Ok(ResourceType::User),
            "comment" => Ok(ResourceType::Comment),
            "category" => Ok(ResourceType::Category),
            _ => Err(format!("Invalid resource type: {}", s)),
        }
    }
}

/// Normalize a permission code: trimmed, upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Permission entity. The code doubles as the document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    #[serde(rename = "_id")]
    pub code: String,
    pub display_name: String,
    pub description: Option<String>,
    pub resource_type: ResourceType,
    pub category: String,
    pub is_system_level: bool,
    pub is_built_in: bool,
    pub is_active: bool,
    pub parent_permission_id: Option<String>,
    #[serde(default)]
    pub required_permissions: Vec<String>,
    #[serde(default)]
    pub conflicting_permissions: Vec<String>,
    pub created_by: Option<String>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Permission {
    /// Build a custom (non-built-in) permission from a registration request.
    pub fn custom(input: NewPermission) -> Self {
        let now = Utc::now();
        Self {
            code: normalize_code(&input.code),
            display_name: input.display_name.trim().to_string(),
            description: input.description.map(|d| d.trim().to_string()),
            resource_type: input.resource_type,
            category: input.category.trim().to_lowercase(),
            is_system_level: input.is_system_level,
            is_built_in: false,
            is_active: true,
            parent_permission_id: input.parent_permission_id.as_deref().map(normalize_code),
            required_permissions: input
                .required_permissions
                .iter()
                .map(|c| normalize_code(c))
                .collect(),
            conflicting_permissions: input
                .conflicting_permissions
                .iter()
                .map(|c| normalize_code(c))
                .collect(),
            created_by: input.created_by,
            created_at: now,
            updated_at: now,
        }
    }

    /// Build a built-in permission. Built-ins are immutable once seeded.
    pub fn built_in(
        code: &str,
        display_name: &str,
        resource_type: ResourceType,
        category: &str,
        is_system_level: bool,
    ) -> Self {
        let now = Utc::now();
        Self {
            code: normalize_code(code),
            display_name: display_name.to_string(),
            description: None,
            resource_type,
            category: category.to_string(),
            is_system_level,
            is_built_in: true,
            is_active: true,
            parent_permission_id: None,
            required_permissions: Vec::new(),
            conflicting_permissions: Vec::new(),
            created_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn requires(mut self, codes: &[&str]) -> Self {
        self.required_permissions = codes.iter().map(|c| normalize_code(c)).collect();
        self
    }

    /// Whether `other` is declared as mutually exclusive with this permission.
    pub fn conflicts_with(&self, other: &str) -> bool {
        self.conflicting_permissions.iter().any(|c| c == other)
    }
}

/// Request to register a custom permission.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct NewPermission {
    #[validate(length(min = 1, max = 64, message = "Code must be 1-64 characters"))]
    #[schema(example = "REVIEW_STORY")]
    pub code: String,

    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    #[schema(example = "Review story")]
    pub display_name: String,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub resource_type: ResourceType,

    #[validate(length(min = 1, max = 50, message = "Category must be 1-50 characters"))]
    #[schema(example = "content")]
    pub category: String,

    #[serde(default)]
    pub is_system_level: bool,

    pub parent_permission_id: Option<String>,

    #[serde(default)]
    pub required_permissions: Vec<String>,

    #[serde(default)]
    pub conflicting_permissions: Vec<String>,

    pub created_by: Option<String>,
}

/// Changes to a custom permission. Absent fields are left untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct PermissionUpdate {
    #[validate(length(min = 1, max = 100, message = "Display name must be 1-100 characters"))]
    pub display_name: Option<String>,

    #[validate(length(max = 500, message = "Description must be at most 500 characters"))]
    pub description: Option<String>,

    pub is_active: Option<bool>,

    pub parent_permission_id: Option<String>,

    pub required_permissions: Option<Vec<String>>,

    pub conflicting_permissions: Option<Vec<String>>,
}

/// Listing filter for the permission catalog.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PermissionFilter {
    pub resource_type: Option<ResourceType>,
    pub category: Option<String>,
    pub active_only: bool,
}

impl PermissionFilter {
    pub fn matches(&self, permission: &Permission) -> bool {
        if self.active_only && !permission.is_active {
            return false;
        }
        if let Some(resource_type) = self.resource_type {
            if permission.resource_type != resource_type {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &permission.category != category {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_type_round_trips_through_str() {
        for rt in [
            ResourceType::System,
            ResourceType::Story,
            ResourceType::Comment,
        ] {
            assert_eq!(rt.as_str().parse::<ResourceType>(), Ok(rt));
        }
        assert!("novel".parse::<ResourceType>().is_err());
    }

    #[test]
    fn test_custom_permission_normalizes_codes() {
        let perm = Permission::custom(NewPermission {
            code: " review_story ".to_string(),
            display_name: "Review story".to_string(),
            description: None,
            resource_type: ResourceType::Story,
            category: " Content ".to_string(),
            is_system_level: false,
            parent_permission_id: Some("edit_story".to_string()),
            required_permissions: vec!["edit_story".to_string()],
            conflicting_permissions: vec![],
            created_by: Some("admin".to_string()),
        });

        assert_eq!(perm.code, "REVIEW_STORY");
        assert_eq!(perm.category, "content");
        assert_eq!(perm.parent_permission_id.as_deref(), Some("EDIT_STORY"));
        assert_eq!(perm.required_permissions, vec!["EDIT_STORY".to_string()]);
        assert!(!perm.is_built_in);
        assert!(perm.is_active);
    }

    #[test]
    fn test_filter_skips_inactive() {
        let mut perm = Permission::built_in("COMMENT", "Comment", ResourceType::Comment, "interaction", false);
        let filter = PermissionFilter {
            active_only: true,
            ..Default::default()
        };
        assert!(filter.matches(&perm));
        perm.is_active = false;
        assert!(!filter.matches(&perm));
    }
}
