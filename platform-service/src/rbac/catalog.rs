//! Built-in permission catalog and role templates.

use tracing::instrument;

use super::error::{RbacError, RbacResult};
use super::registry::PermissionRegistry;
use super::roles::RoleStore;
use crate::models::{Permission, PermissionGrant, ResourceType, Role, RoleType};

struct PermissionDef {
    code: &'static str,
    display_name: &'static str,
    resource_type: ResourceType,
    category: &'static str,
    system_level: bool,
}

const fn def(
    code: &'static str,
    display_name: &'static str,
    resource_type: ResourceType,
    category: &'static str,
    system_level: bool,
) -> PermissionDef {
    PermissionDef {
        code,
        display_name,
        resource_type,
        category,
        system_level,
    }
}

// Prerequisites must come before the permissions that require them.
const PERMISSIONS: &[PermissionDef] = &[
    def("MANAGE_SYSTEM", "Manage system", ResourceType::System, "system", true),
    def("MANAGE_TENANTS", "Manage tenants", ResourceType::Tenant, "system", true),
    def("VIEW_SYSTEM_ANALYTICS", "View system analytics", ResourceType::System, "system", true),
    def("MANAGE_SYSTEM_USERS", "Manage system users", ResourceType::User, "system", true),
    def("MANAGE_TENANT_SETTINGS", "Manage tenant settings", ResourceType::Tenant, "tenant", false),
    def("MANAGE_TENANT_USERS", "Manage tenant users", ResourceType::User, "tenant", false),
    def("VIEW_TENANT_ANALYTICS", "View tenant analytics", ResourceType::Tenant, "tenant", false),
    def("MANAGE_TENANT_BILLING", "Manage tenant billing", ResourceType::Tenant, "tenant", false),
    def("CREATE_STORY", "Create story", ResourceType::Story, "content", false),
    def("EDIT_STORY", "Edit story", ResourceType::Story, "content", false),
    def("DELETE_STORY", "Delete story", ResourceType::Story, "content", false),
    def("PUBLISH_STORY", "Publish story", ResourceType::Story, "content", false),
    def("MODERATE_CONTENT", "Moderate content", ResourceType::Story, "content", false),
    def("MANAGE_CATEGORIES", "Manage categories", ResourceType::Category, "content", false),
    def("CREATE_CHAPTER", "Create chapter", ResourceType::Chapter, "chapter", false),
    def("EDIT_CHAPTER", "Edit chapter", ResourceType::Chapter, "chapter", false),
    def("DELETE_CHAPTER", "Delete chapter", ResourceType::Chapter, "chapter", false),
    def("PUBLISH_CHAPTER", "Publish chapter", ResourceType::Chapter, "chapter", false),
    def("CREATE_TRANSLATION", "Create translation", ResourceType::Chapter, "translation", false),
    def("EDIT_TRANSLATION", "Edit translation", ResourceType::Chapter, "translation", false),
    def("MANAGE_LANGUAGES", "Manage languages", ResourceType::Tenant, "translation", false),
    def("COMMENT", "Comment", ResourceType::Comment, "interaction", false),
    def("RATE_STORY", "Rate story", ResourceType::Story, "interaction", false),
    def("BOOKMARK", "Bookmark", ResourceType::Story, "interaction", false),
    def("FOLLOW_AUTHOR", "Follow author", ResourceType::User, "interaction", false),
    def("MODERATE_COMMENTS", "Moderate comments", ResourceType::Comment, "moderation", false),
    def("BAN_USERS", "Ban users", ResourceType::User, "moderation", false),
    def("DELETE_COMMENTS", "Delete comments", ResourceType::Comment, "moderation", false),
    def("VIEW_STORY_ANALYTICS", "View story analytics", ResourceType::Story, "analytics", false),
    def("VIEW_USER_ANALYTICS", "View user analytics", ResourceType::User, "analytics", false),
    def("EXPORT_DATA", "Export data", ResourceType::Tenant, "analytics", false),
];

const PREREQUISITES: &[(&str, &str)] = &[
    ("PUBLISH_STORY", "EDIT_STORY"),
    ("PUBLISH_CHAPTER", "EDIT_CHAPTER"),
    ("DELETE_COMMENTS", "MODERATE_COMMENTS"),
];

struct RoleDef {
    name: &'static str,
    display_name: &'static str,
    permissions: &'static [&'static str],
}

const SYSTEM_ROLES: &[RoleDef] = &[
    RoleDef {
        name: "super_admin",
        display_name: "Super admin",
        permissions: &[
            "MANAGE_SYSTEM",
            "MANAGE_TENANTS",
            "VIEW_SYSTEM_ANALYTICS",
            "MANAGE_SYSTEM_USERS",
        ],
    },
    RoleDef {
        name: "system_admin",
        display_name: "System admin",
        permissions: &["MANAGE_TENANTS", "VIEW_SYSTEM_ANALYTICS", "MANAGE_SYSTEM_USERS"],
    },
    RoleDef {
        name: "platform_manager",
        display_name: "Platform manager",
        permissions: &["VIEW_SYSTEM_ANALYTICS", "MANAGE_TENANTS"],
    },
    RoleDef {
        name: "support",
        display_name: "Support",
        permissions: &["VIEW_SYSTEM_ANALYTICS"],
    },
];

const TENANT_ROLES: &[RoleDef] = &[
    RoleDef {
        name: "tenant_owner",
        display_name: "Tenant owner",
        permissions: &[
            "MANAGE_TENANT_SETTINGS",
            "MANAGE_TENANT_USERS",
            "VIEW_TENANT_ANALYTICS",
            "MANAGE_TENANT_BILLING",
            "CREATE_STORY",
            "EDIT_STORY",
            "DELETE_STORY",
            "PUBLISH_STORY",
            "MODERATE_CONTENT",
            "MANAGE_CATEGORIES",
            "CREATE_CHAPTER",
            "EDIT_CHAPTER",
            "DELETE_CHAPTER",
            "PUBLISH_CHAPTER",
            "MODERATE_COMMENTS",
            "BAN_USERS",
            "DELETE_COMMENTS",
            "VIEW_STORY_ANALYTICS",
            "VIEW_USER_ANALYTICS",
            "EXPORT_DATA",
        ],
    },
    RoleDef {
        name: "tenant_admin",
        display_name: "Tenant admin",
        permissions: &[
            "MANAGE_TENANT_USERS",
            "VIEW_TENANT_ANALYTICS",
            "MODERATE_CONTENT",
            "MODERATE_COMMENTS",
            "BAN_USERS",
            "DELETE_COMMENTS",
            "VIEW_STORY_ANALYTICS",
            "VIEW_USER_ANALYTICS",
        ],
    },
    RoleDef {
        name: "editor_in_chief",
        display_name: "Editor in chief",
        permissions: &[
            "CREATE_STORY",
            "EDIT_STORY",
            "DELETE_STORY",
            "PUBLISH_STORY",
            "MODERATE_CONTENT",
            "MANAGE_CATEGORIES",
            "CREATE_CHAPTER",
            "EDIT_CHAPTER",
            "DELETE_CHAPTER",
            "PUBLISH_CHAPTER",
            "MODERATE_COMMENTS",
            "VIEW_STORY_ANALYTICS",
        ],
    },
    RoleDef {
        name: "editor",
        display_name: "Editor",
        permissions: &[
            "EDIT_STORY",
            "MODERATE_CONTENT",
            "CREATE_CHAPTER",
            "EDIT_CHAPTER",
            "DELETE_CHAPTER",
            "MODERATE_COMMENTS",
        ],
    },
    RoleDef {
        name: "author",
        display_name: "Author",
        permissions: &[
            "CREATE_STORY",
            "EDIT_STORY",
            "CREATE_CHAPTER",
            "EDIT_CHAPTER",
            "PUBLISH_CHAPTER",
            "VIEW_STORY_ANALYTICS",
        ],
    },
    RoleDef {
        name: "moderator",
        display_name: "Moderator",
        permissions: &["MODERATE_CONTENT", "MODERATE_COMMENTS", "DELETE_COMMENTS"],
    },
    RoleDef {
        name: "translator",
        display_name: "Translator",
        permissions: &["CREATE_TRANSLATION", "EDIT_TRANSLATION", "MANAGE_LANGUAGES"],
    },
    RoleDef {
        name: "reader",
        display_name: "Reader",
        permissions: &["COMMENT", "RATE_STORY", "BOOKMARK", "FOLLOW_AUTHOR"],
    },
];

/// The built-in permission catalog with prerequisites applied.
pub fn built_in_permissions() -> Vec<Permission> {
    PERMISSIONS
        .iter()
        .map(|d| {
            let permission = Permission::built_in(
                d.code,
                d.display_name,
                d.resource_type,
                d.category,
                d.system_level,
            );
            let required: Vec<&str> = PREREQUISITES
                .iter()
                .filter(|(code, _)| *code == d.code)
                .map(|(_, required)| *required)
                .collect();
            if required.is_empty() {
                permission
            } else {
                permission.requires(&required)
            }
        })
        .collect()
}

/// Names of the built-in tenant roles, in provisioning order.
pub fn tenant_role_names() -> impl Iterator<Item = &'static str> {
    TENANT_ROLES.iter().map(|r| r.name)
}

/// Id of a built-in tenant role. Deterministic so provisioning is idempotent.
pub fn tenant_role_id(tenant_id: &str, name: &str) -> String {
    format!("{}:{}", tenant_id, name)
}

fn grants_for(codes: &[&str]) -> RbacResult<Vec<PermissionGrant>> {
    codes
        .iter()
        .map(|code| {
            PERMISSIONS
                .iter()
                .find(|d| d.code == *code)
                .map(|d| PermissionGrant::new(d.code, d.resource_type))
                .ok_or_else(|| {
                    RbacError::integrity(format!("Built-in role references unknown {}", code))
                })
        })
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SeedReport {
    pub permissions_created: usize,
    pub roles_created: usize,
}

/// Register built-in permissions and system roles that are not yet stored.
#[instrument(skip_all)]
pub async fn seed_built_ins(
    registry: &PermissionRegistry,
    roles: &RoleStore,
) -> RbacResult<SeedReport> {
    let mut report = SeedReport::default();

    for permission in built_in_permissions() {
        match registry.lookup(&permission.code).await {
            Ok(_) => continue,
            Err(RbacError::NotFound { .. }) => {
                registry.register_permission(permission).await?;
                report.permissions_created += 1;
            }
            Err(e) => return Err(e),
        }
    }

    for def in SYSTEM_ROLES {
        match roles.get_role(def.name).await {
            Ok(_) => continue,
            Err(RbacError::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }
        let role = Role::built_in(
            def.name.to_string(),
            def.name,
            def.display_name,
            RoleType::System,
            None,
            grants_for(def.permissions)?,
        );
        roles.ensure_built_in(role).await?;
        report.roles_created += 1;
    }

    tracing::info!(
        permissions_created = report.permissions_created,
        roles_created = report.roles_created,
        "Built-in catalog seeded"
    );
    Ok(report)
}

/// Create the built-in tenant roles for a tenant. Existing ones are kept.
#[instrument(skip(roles))]
pub async fn provision_tenant_roles(roles: &RoleStore, tenant_id: &str) -> RbacResult<Vec<Role>> {
    let mut provisioned = Vec::with_capacity(TENANT_ROLES.len());
    for def in TENANT_ROLES {
        let role = Role::built_in(
            tenant_role_id(tenant_id, def.name),
            def.name,
            def.display_name,
            RoleType::Tenant,
            Some(tenant_id.to_string()),
            grants_for(def.permissions)?,
        );
        provisioned.push(roles.ensure_built_in(role).await?);
    }
    Ok(provisioned)
}
