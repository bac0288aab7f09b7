//! In-memory `RbacStore`, used by tests and the `memory` persistence backend.

use async_trait::async_trait;
use dashmap::DashMap;

use super::error::{RbacError, RbacResult};
use super::locks::{ScopeLease, ScopeLocks};
use super::store::RbacStore;
use crate::models::{Permission, PermissionFilter, Role, RoleScope, Tenant, UserRoleAssignments};

#[derive(Default)]
pub struct InMemoryStore {
    permissions: DashMap<String, Permission>,
    roles: DashMap<String, Role>,
    tenants: DashMap<String, Tenant>,
    assignments: DashMap<String, UserRoleAssignments>,
    locks: ScopeLocks,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sorted_roles(&self, predicate: impl Fn(&Role) -> bool) -> Vec<Role> {
        let mut roles: Vec<Role> = self
            .roles
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        roles
    }
}

#[async_trait]
impl RbacStore for InMemoryStore {
    async fn fetch_permission(&self, code: &str) -> RbacResult<Option<Permission>> {
        Ok(self.permissions.get(code).map(|p| p.value().clone()))
    }

    async fn fetch_permissions(&self, filter: &PermissionFilter) -> RbacResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> = self
            .permissions
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn insert_permission(&self, permission: &Permission) -> RbacResult<()> {
        if self.permissions.contains_key(&permission.code) {
            return Err(RbacError::validation(format!(
                "Permission {} already exists",
                permission.code
            )));
        }
        self.permissions
            .insert(permission.code.clone(), permission.clone());
        Ok(())
    }

    async fn replace_permission(&self, permission: &Permission) -> RbacResult<()> {
        self.permissions
            .insert(permission.code.clone(), permission.clone());
        Ok(())
    }

    async fn fetch_role(&self, id: &str) -> RbacResult<Option<Role>> {
        Ok(self.roles.get(id).map(|r| r.value().clone()))
    }

    async fn fetch_role_by_name(
        &self,
        tenant_id: Option<&str>,
        name: &str,
    ) -> RbacResult<Option<Role>> {
        Ok(self
            .roles
            .iter()
            .find(|entry| {
                let role = entry.value();
                role.name == name && role.tenant_id.as_deref() == tenant_id
            })
            .map(|entry| entry.value().clone()))
    }

    async fn fetch_roles_by_tenant(&self, tenant_id: &str) -> RbacResult<Vec<Role>> {
        Ok(self.sorted_roles(|role| role.tenant_id.as_deref() == Some(tenant_id)))
    }

    async fn fetch_system_roles(&self) -> RbacResult<Vec<Role>> {
        Ok(self.sorted_roles(|role| role.tenant_id.is_none()))
    }

    async fn fetch_roles_inheriting(&self, role_id: &str) -> RbacResult<Vec<Role>> {
        Ok(self.sorted_roles(|role| role.inherits_from.iter().any(|p| p == role_id)))
    }

    async fn insert_role(&self, role: &Role) -> RbacResult<()> {
        self.roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn replace_role(&self, role: &Role) -> RbacResult<()> {
        self.roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn delete_role(&self, id: &str) -> RbacResult<bool> {
        Ok(self.roles.remove(id).is_some())
    }

    async fn fetch_tenant(&self, id: &str) -> RbacResult<Option<Tenant>> {
        Ok(self.tenants.get(id).map(|t| t.value().clone()))
    }

    async fn fetch_tenant_by_code(&self, code: &str) -> RbacResult<Option<Tenant>> {
        Ok(self
            .tenants
            .iter()
            .find(|entry| entry.value().code == code)
            .map(|entry| entry.value().clone()))
    }

    async fn fetch_tenant_by_domain(&self, domain: &str) -> RbacResult<Option<Tenant>> {
        Ok(self
            .tenants
            .iter()
            .find(|entry| entry.value().domain == domain)
            .map(|entry| entry.value().clone()))
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> RbacResult<()> {
        self.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn replace_tenant(&self, tenant: &Tenant) -> RbacResult<()> {
        self.tenants.insert(tenant.id.clone(), tenant.clone());
        Ok(())
    }

    async fn fetch_assignments(&self, user_id: &str) -> RbacResult<Option<UserRoleAssignments>> {
        Ok(self.assignments.get(user_id).map(|a| a.value().clone()))
    }

    async fn upsert_assignments(&self, assignments: &UserRoleAssignments) -> RbacResult<()> {
        self.assignments
            .insert(assignments.user_id.clone(), assignments.clone());
        Ok(())
    }

    async fn lock_scope(&self, scope: &RoleScope) -> RbacResult<ScopeLease> {
        Ok(ScopeLease::new(self.locks.lock(scope).await))
    }

    async fn health_check(&self) -> RbacResult<()> {
        Ok(())
    }
}
