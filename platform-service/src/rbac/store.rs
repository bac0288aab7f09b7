//! Persistence collaborator for the RBAC core.
//!
//! Lookups return `Ok(None)` for missing entities; callers decide whether a
//! miss is a `NotFound` or an `Integrity` failure.

use async_trait::async_trait;

use super::error::RbacResult;
use super::locks::ScopeLease;
use crate::models::{Permission, PermissionFilter, Role, RoleScope, Tenant, UserRoleAssignments};

#[async_trait]
pub trait RbacStore: Send + Sync {
    async fn fetch_permission(&self, code: &str) -> RbacResult<Option<Permission>>;
    /// Permissions matching `filter`, ordered by code.
    async fn fetch_permissions(&self, filter: &PermissionFilter) -> RbacResult<Vec<Permission>>;
    async fn insert_permission(&self, permission: &Permission) -> RbacResult<()>;
    async fn replace_permission(&self, permission: &Permission) -> RbacResult<()>;

    async fn fetch_role(&self, id: &str) -> RbacResult<Option<Role>>;
    async fn fetch_role_by_name(
        &self,
        tenant_id: Option<&str>,
        name: &str,
    ) -> RbacResult<Option<Role>>;
    /// Tenant and custom roles of a tenant, ordered by name.
    async fn fetch_roles_by_tenant(&self, tenant_id: &str) -> RbacResult<Vec<Role>>;
    /// System roles, ordered by name.
    async fn fetch_system_roles(&self) -> RbacResult<Vec<Role>>;
    /// Roles listing `role_id` in `inherits_from`.
    async fn fetch_roles_inheriting(&self, role_id: &str) -> RbacResult<Vec<Role>>;
    async fn insert_role(&self, role: &Role) -> RbacResult<()>;
    async fn replace_role(&self, role: &Role) -> RbacResult<()>;
    async fn delete_role(&self, id: &str) -> RbacResult<bool>;

    async fn fetch_tenant(&self, id: &str) -> RbacResult<Option<Tenant>>;
    async fn fetch_tenant_by_code(&self, code: &str) -> RbacResult<Option<Tenant>>;
    async fn fetch_tenant_by_domain(&self, domain: &str) -> RbacResult<Option<Tenant>>;
    async fn insert_tenant(&self, tenant: &Tenant) -> RbacResult<()>;
    async fn replace_tenant(&self, tenant: &Tenant) -> RbacResult<()>;

    async fn fetch_assignments(&self, user_id: &str) -> RbacResult<Option<UserRoleAssignments>>;
    async fn upsert_assignments(&self, assignments: &UserRoleAssignments) -> RbacResult<()>;

    /// Hold `scope` exclusively against every writer sharing this store,
    /// waiting for the current holder if there is one.
    async fn lock_scope(&self, scope: &RoleScope) -> RbacResult<ScopeLease>;

    async fn health_check(&self) -> RbacResult<()>;
}
