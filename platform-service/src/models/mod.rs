pub mod permission;
pub mod role;
pub mod tenant;
pub mod user;

pub use permission::{
    normalize_code, NewPermission, Permission, PermissionFilter, PermissionUpdate, ResourceType,
};
pub use role::{
    normalize_name, GrantConditions, GrantKey, NewRole, PermissionGrant, Role, RoleScope,
    RoleType, RoleUpdate,
};
pub use tenant::{NewTenant, Tenant, TenantStatus};
pub use user::{AssignmentUpdate, UserRoleAssignments};
