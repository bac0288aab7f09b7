//! Role store: create, update and delete roles while keeping the inheritance
//! graph acyclic and scope-consistent.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use super::error::{format_chain, RbacError, RbacResult};
use super::graph::{cycle_through, Graph};
use super::store::RbacStore;
use crate::models::{NewRole, PermissionGrant, Role, RoleScope, RoleType, RoleUpdate};

#[derive(Clone)]
pub struct RoleStore {
    store: Arc<dyn RbacStore>,
}

impl RoleStore {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, input), fields(name = %input.name, role_type = %input.role_type))]
    pub async fn create_role(&self, input: NewRole) -> RbacResult<Role> {
        let scope = scope_for(input.role_type, input.tenant_id.as_deref())?;
        let role = Role::new(input);
        self.insert_checked(scope, role).await
    }

    /// Insert a built-in role unless one with the same name already exists in
    /// its scope. Returns the stored role either way.
    pub async fn ensure_built_in(&self, role: Role) -> RbacResult<Role> {
        let scope = scope_for(role.role_type, role.tenant_id.as_deref())?;
        if let Some(existing) = self
            .store
            .fetch_role_by_name(scope.tenant_id(), &role.name)
            .await?
        {
            return Ok(existing);
        }
        self.insert_checked(scope, role).await
    }

    async fn insert_checked(&self, scope: RoleScope, role: Role) -> RbacResult<Role> {
        let _lease = self.store.lock_scope(&scope).await?;

        if role.name.is_empty() {
            return Err(RbacError::validation("Role name must not be empty"));
        }
        if let Some(tenant_id) = scope.tenant_id() {
            if self.store.fetch_tenant(tenant_id).await?.is_none() {
                return Err(RbacError::validation(format!(
                    "Tenant {} does not exist",
                    tenant_id
                )));
            }
        }
        if self
            .store
            .fetch_role_by_name(scope.tenant_id(), &role.name)
            .await?
            .is_some()
        {
            return Err(RbacError::validation(format!(
                "Role name {} already exists in scope {}",
                role.name, scope
            )));
        }
        self.check_grants(&scope, &role.permissions).await?;
        self.check_inheritance(&scope, &role).await?;

        self.store.insert_role(&role).await?;
        tracing::info!(role_id = %role.id, name = %role.name, scope = %scope, "Role created");
        Ok(role)
    }

    #[instrument(skip(self, changes))]
    pub async fn update_role(&self, id: &str, changes: RoleUpdate) -> RbacResult<Role> {
        let current = self.get_role(id).await?;
        let scope = current.scope();
        let _lease = self.store.lock_scope(&scope).await?;

        // Re-read under the lock so concurrent writers see each other's edges.
        let mut role = self.get_role(id).await?;
        if role.is_built_in {
            return Err(RbacError::conflict(format!(
                "Built-in role {} cannot be modified",
                role.name
            )));
        }

        if let Some(display_name) = changes.display_name {
            role.display_name = display_name.trim().to_string();
        }
        if let Some(description) = changes.description {
            role.description = Some(description.trim().to_string());
        }
        if let Some(is_active) = changes.is_active {
            role.is_active = is_active;
        }
        if let Some(permissions) = changes.permissions {
            role.permissions = permissions
                .into_iter()
                .map(PermissionGrant::normalized)
                .collect();
            self.check_grants(&scope, &role.permissions).await?;
        }
        if let Some(inherits_from) = changes.inherits_from {
            role.inherits_from = inherits_from;
            self.check_inheritance(&scope, &role).await?;
        }

        role.updated_at = Utc::now();
        self.store.replace_role(&role).await?;
        tracing::info!(role_id = %role.id, "Role updated");
        Ok(role)
    }

    #[instrument(skip(self))]
    pub async fn delete_role(&self, id: &str) -> RbacResult<()> {
        let current = self.get_role(id).await?;
        let _lease = self.store.lock_scope(&current.scope()).await?;

        let role = self.get_role(id).await?;
        if role.is_built_in {
            return Err(RbacError::conflict(format!(
                "Built-in role {} cannot be deleted",
                role.name
            )));
        }
        let dependents = self.store.fetch_roles_inheriting(id).await?;
        if !dependents.is_empty() {
            let ids: Vec<&str> = dependents.iter().map(|r| r.id.as_str()).collect();
            return Err(RbacError::conflict(format!(
                "Role {} is still inherited by: {}",
                id,
                ids.join(", ")
            )));
        }

        self.store.delete_role(id).await?;
        tracing::info!(role_id = %id, "Role deleted");
        Ok(())
    }

    pub async fn get_role(&self, id: &str) -> RbacResult<Role> {
        self.store
            .fetch_role(id)
            .await?
            .ok_or_else(|| RbacError::not_found("Role", id))
    }

    pub async fn list_tenant_roles(&self, tenant_id: &str) -> RbacResult<Vec<Role>> {
        self.store.fetch_roles_by_tenant(tenant_id).await
    }

    pub async fn list_system_roles(&self) -> RbacResult<Vec<Role>> {
        self.store.fetch_system_roles().await
    }

    /// Granted permissions must exist. Tenant-scoped roles may not grant
    /// system-level permissions.
    async fn check_grants(&self, scope: &RoleScope, grants: &[PermissionGrant]) -> RbacResult<()> {
        for grant in grants {
            let permission = self
                .store
                .fetch_permission(&grant.permission)
                .await?
                .ok_or_else(|| {
                    RbacError::validation(format!(
                        "Grant references unknown permission {}",
                        grant.permission
                    ))
                })?;
            if permission.is_system_level && scope.tenant_id().is_some() {
                return Err(RbacError::validation(format!(
                    "System-level permission {} cannot be granted in scope {}",
                    permission.code, scope
                )));
            }
        }
        Ok(())
    }

    /// Parents must exist, be unique, live in the same scope, and not close an
    /// inheritance cycle.
    async fn check_inheritance(&self, scope: &RoleScope, role: &Role) -> RbacResult<()> {
        let mut seen = HashSet::new();
        for parent_id in &role.inherits_from {
            if !seen.insert(parent_id.as_str()) {
                return Err(RbacError::validation(format!(
                    "Role {} lists parent {} more than once",
                    role.name, parent_id
                )));
            }
            if parent_id == &role.id {
                return Err(RbacError::validation(format!(
                    "Inheritance cycle: {}",
                    format_chain(&[role.id.clone(), role.id.clone()])
                )));
            }
            let parent = self.store.fetch_role(parent_id).await?.ok_or_else(|| {
                RbacError::validation(format!("Parent role {} does not exist", parent_id))
            })?;
            if &parent.scope() != scope {
                return Err(RbacError::validation(format!(
                    "Parent role {} is in scope {}, expected {}",
                    parent_id,
                    parent.scope(),
                    scope
                )));
            }
        }

        let siblings = match scope {
            RoleScope::System => self.store.fetch_system_roles().await?,
            RoleScope::Tenant(tenant_id) => self.store.fetch_roles_by_tenant(tenant_id).await?,
        };
        let graph: Graph = siblings
            .into_iter()
            .filter(|r| r.id != role.id)
            .map(|r| (r.id, r.inherits_from))
            .collect();
        if let Some(cycle) = cycle_through(&graph, &role.id, &role.inherits_from) {
            return Err(RbacError::validation(format!(
                "Inheritance cycle: {}",
                format_chain(&cycle)
            )));
        }
        Ok(())
    }
}

/// Check the type/tenant pairing and derive the mutation scope.
fn scope_for(role_type: RoleType, tenant_id: Option<&str>) -> RbacResult<RoleScope> {
    match (role_type, tenant_id) {
        (RoleType::System, None) => Ok(RoleScope::System),
        (RoleType::System, Some(_)) => Err(RbacError::validation(
            "System roles must not carry a tenant id",
        )),
        (_, Some(tenant_id)) if !tenant_id.trim().is_empty() => {
            Ok(RoleScope::Tenant(tenant_id.to_string()))
        }
        (role_type, _) => Err(RbacError::validation(format!(
            "{} roles require a tenant id",
            role_type
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewTenant, Permission, ResourceType, Tenant};
    use crate::rbac::memory::InMemoryStore;

    struct Fixture {
        store: Arc<InMemoryStore>,
        roles: RoleStore,
        tenant_id: String,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryStore::new());
        for code in ["CREATE_STORY", "EDIT_STORY"] {
            store
                .insert_permission(&Permission::built_in(
                    code,
                    code,
                    ResourceType::Story,
                    "content",
                    false,
                ))
                .await
                .unwrap();
        }
        let tenant = Tenant::new(NewTenant {
            code: "acme".to_string(),
            name: "Acme".to_string(),
            domain: "acme.test".to_string(),
            contact_email: "ops@acme.test".to_string(),
            contact_phone: "555-0100".to_string(),
            allow_comments: None,
            allow_rating: None,
        });
        store.insert_tenant(&tenant).await.unwrap();
        let roles = RoleStore::new(store.clone());
        Fixture {
            store,
            roles,
            tenant_id: tenant.id,
        }
    }

    fn new_role(name: &str, tenant_id: Option<&str>, inherits_from: Vec<String>) -> NewRole {
        NewRole {
            name: name.to_string(),
            display_name: name.to_string(),
            description: None,
            role_type: if tenant_id.is_some() {
                RoleType::Custom
            } else {
                RoleType::System
            },
            tenant_id: tenant_id.map(str::to_string),
            permissions: vec![PermissionGrant::new("CREATE_STORY", ResourceType::Story)],
            inherits_from,
            created_by: "admin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_type_tenant_pairing() {
        let f = fixture().await;
        let mut input = new_role("ops", None, vec![]);
        input.tenant_id = Some(f.tenant_id.clone());
        assert!(matches!(
            f.roles.create_role(input).await,
            Err(RbacError::Validation(_))
        ));

        let mut input = new_role("writer", Some(&f.tenant_id), vec![]);
        input.tenant_id = None;
        assert!(matches!(
            f.roles.create_role(input).await,
            Err(RbacError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_name_unique_within_scope_only() {
        let f = fixture().await;
        f.roles
            .create_role(new_role("Writer", Some(&f.tenant_id), vec![]))
            .await
            .unwrap();
        let dup = f
            .roles
            .create_role(new_role(" writer ", Some(&f.tenant_id), vec![]))
            .await;
        assert!(matches!(dup, Err(RbacError::Validation(_))));

        f.roles
            .create_role(new_role("writer", None, vec![]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unknown_permission_rejected() {
        let f = fixture().await;
        let mut input = new_role("writer", Some(&f.tenant_id), vec![]);
        input.permissions = vec![PermissionGrant::new("FLY", ResourceType::Story)];
        let err = f.roles.create_role(input).await.unwrap_err();
        assert!(err.to_string().contains("FLY"));
    }

    #[tokio::test]
    async fn test_system_level_permission_only_in_system_roles() {
        let f = fixture().await;
        f.store
            .insert_permission(&Permission::built_in(
                "MANAGE_SYSTEM",
                "Manage system",
                ResourceType::System,
                "system",
                true,
            ))
            .await
            .unwrap();
        let manage = vec![PermissionGrant::new("MANAGE_SYSTEM", ResourceType::System)];

        let mut input = new_role("operator", Some(&f.tenant_id), vec![]);
        input.permissions = manage.clone();
        let err = f.roles.create_role(input).await.unwrap_err();
        match err {
            RbacError::Validation(msg) => assert!(msg.contains("MANAGE_SYSTEM")),
            other => panic!("expected validation error, got {other:?}"),
        }

        let writer = f
            .roles
            .create_role(new_role("writer", Some(&f.tenant_id), vec![]))
            .await
            .unwrap();
        let update = f
            .roles
            .update_role(
                &writer.id,
                RoleUpdate {
                    permissions: Some(manage.clone()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(update, Err(RbacError::Validation(_))));

        let mut input = new_role("operator", None, vec![]);
        input.permissions = manage;
        f.roles.create_role(input).await.unwrap();
    }

    #[tokio::test]
    async fn test_writers_wait_for_store_scope_lock() {
        let f = fixture().await;
        let role = f
            .roles
            .create_role(new_role("writer", Some(&f.tenant_id), vec![]))
            .await
            .unwrap();

        // Held as another instance sharing the store would hold it.
        let lease = f
            .store
            .lock_scope(&RoleScope::Tenant(f.tenant_id.clone()))
            .await
            .unwrap();

        let other_instance = RoleStore::new(f.store.clone());
        let update = tokio::spawn(async move {
            other_instance
                .update_role(
                    &role.id,
                    RoleUpdate {
                        display_name: Some("Writer".to_string()),
                        ..Default::default()
                    },
                )
                .await
        });
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!update.is_finished());

        drop(lease);
        let updated = tokio::time::timeout(std::time::Duration::from_secs(1), update)
            .await
            .expect("update should proceed once the scope is released")
            .unwrap()
            .unwrap();
        assert_eq!(updated.display_name, "Writer");
    }

    #[tokio::test]
    async fn test_parent_must_exist_and_share_scope() {
        let f = fixture().await;
        let missing = f
            .roles
            .create_role(new_role("writer", Some(&f.tenant_id), vec!["ghost".into()]))
            .await;
        assert!(matches!(missing, Err(RbacError::Validation(_))));

        let system = f.roles.create_role(new_role("ops", None, vec![])).await.unwrap();
        let cross = f
            .roles
            .create_role(new_role("writer", Some(&f.tenant_id), vec![system.id]))
            .await;
        assert!(matches!(cross, Err(RbacError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_rejects_cycle_before_persisting() {
        let f = fixture().await;
        let tenant = Some(f.tenant_id.as_str());
        let a = f.roles.create_role(new_role("a", tenant, vec![])).await.unwrap();
        let b = f
            .roles
            .create_role(new_role("b", tenant, vec![a.id.clone()]))
            .await
            .unwrap();
        let c = f
            .roles
            .create_role(new_role("c", tenant, vec![b.id.clone()]))
            .await
            .unwrap();

        let err = f
            .roles
            .update_role(
                &a.id,
                RoleUpdate {
                    inherits_from: Some(vec![c.id.clone()]),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        match err {
            RbacError::Validation(msg) => assert!(msg.contains("Inheritance cycle")),
            other => panic!("expected validation error, got {other:?}"),
        }
        let stored = f.store.fetch_role(&a.id).await.unwrap().unwrap();
        assert!(stored.inherits_from.is_empty());

        let self_ref = f
            .roles
            .update_role(
                &b.id,
                RoleUpdate {
                    inherits_from: Some(vec![b.id.clone()]),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(self_ref, Err(RbacError::Validation(_))));
    }

    #[tokio::test]
    async fn test_diamond_inheritance_allowed() {
        let f = fixture().await;
        let tenant = Some(f.tenant_id.as_str());
        let base = f.roles.create_role(new_role("base", tenant, vec![])).await.unwrap();
        let left = f
            .roles
            .create_role(new_role("left", tenant, vec![base.id.clone()]))
            .await
            .unwrap();
        let right = f
            .roles
            .create_role(new_role("right", tenant, vec![base.id.clone()]))
            .await
            .unwrap();
        f.roles
            .create_role(new_role("top", tenant, vec![left.id, right.id]))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let f = fixture().await;
        let tenant = Some(f.tenant_id.as_str());
        let parent = f.roles.create_role(new_role("parent", tenant, vec![])).await.unwrap();
        let child = f
            .roles
            .create_role(new_role("child", tenant, vec![parent.id.clone()]))
            .await
            .unwrap();

        assert!(matches!(
            f.roles.delete_role(&parent.id).await,
            Err(RbacError::Conflict(_))
        ));
        f.roles.delete_role(&child.id).await.unwrap();
        f.roles.delete_role(&parent.id).await.unwrap();
        assert!(matches!(
            f.roles.delete_role(&parent.id).await,
            Err(RbacError::NotFound { .. })
        ));

        let built_in = f
            .roles
            .ensure_built_in(Role::built_in(
                "support".to_string(),
                "support",
                "Support",
                RoleType::System,
                None,
                vec![],
            ))
            .await
            .unwrap();
        assert!(matches!(
            f.roles.delete_role(&built_in.id).await,
            Err(RbacError::Conflict(_))
        ));
    }
}
