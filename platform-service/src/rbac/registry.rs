//! Permission registry: the catalog of permission codes with their
//! prerequisite and conflict relations.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use super::error::{format_chain, RbacError, RbacResult};
use super::graph::{cycle_through, Graph};
use super::store::RbacStore;
use crate::models::{
    normalize_code, NewPermission, Permission, PermissionFilter, PermissionUpdate, ResourceType,
    RoleScope,
};

#[derive(Clone)]
pub struct PermissionRegistry {
    store: Arc<dyn RbacStore>,
}

impl PermissionRegistry {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    /// Register a custom permission.
    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn register(&self, input: NewPermission) -> RbacResult<Permission> {
        self.register_permission(Permission::custom(input)).await
    }

    /// Register a fully built permission. Fails if the code exists, if the
    /// permission references itself, references an unknown code, or closes a
    /// prerequisite cycle.
    pub async fn register_permission(&self, permission: Permission) -> RbacResult<Permission> {
        let _lease = self.store.lock_scope(&RoleScope::System).await?;

        if permission.code.is_empty() {
            return Err(RbacError::validation("Permission code must not be empty"));
        }
        if self.store.fetch_permission(&permission.code).await?.is_some() {
            return Err(RbacError::validation(format!(
                "Permission {} already exists",
                permission.code
            )));
        }
        self.check_relations(&permission).await?;

        self.store.insert_permission(&permission).await?;
        tracing::info!(code = %permission.code, "Permission registered");
        Ok(permission)
    }

    /// Look up a permission by code, active or not.
    pub async fn lookup(&self, code: &str) -> RbacResult<Permission> {
        let code = normalize_code(code);
        self.store
            .fetch_permission(&code)
            .await?
            .ok_or_else(|| RbacError::not_found("Permission", code))
    }

    /// Active permissions of a resource type, ordered by code.
    pub async fn list_by_resource_type(
        &self,
        resource_type: ResourceType,
    ) -> RbacResult<Vec<Permission>> {
        self.list(PermissionFilter {
            resource_type: Some(resource_type),
            active_only: true,
            ..Default::default()
        })
        .await
    }

    /// Active permissions of a category, ordered by code.
    pub async fn list_by_category(&self, category: &str) -> RbacResult<Vec<Permission>> {
        self.list(PermissionFilter {
            category: Some(category.trim().to_lowercase()),
            active_only: true,
            ..Default::default()
        })
        .await
    }

    pub async fn list(&self, filter: PermissionFilter) -> RbacResult<Vec<Permission>> {
        self.store.fetch_permissions(&filter).await
    }

    /// Update a custom permission. Built-ins are immutable.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, code: &str, changes: PermissionUpdate) -> RbacResult<Permission> {
        let _lease = self.store.lock_scope(&RoleScope::System).await?;

        let code = normalize_code(code);
        let mut permission = self
            .store
            .fetch_permission(&code)
            .await?
            .ok_or_else(|| RbacError::not_found("Permission", code.clone()))?;

        if permission.is_built_in {
            return Err(RbacError::conflict(format!(
                "Built-in permission {} cannot be modified",
                code
            )));
        }

        if let Some(display_name) = changes.display_name {
            permission.display_name = display_name.trim().to_string();
        }
        if let Some(description) = changes.description {
            permission.description = Some(description.trim().to_string());
        }
        if let Some(is_active) = changes.is_active {
            permission.is_active = is_active;
        }
        if let Some(parent) = changes.parent_permission_id {
            permission.parent_permission_id = Some(normalize_code(&parent));
        }
        if let Some(required) = changes.required_permissions {
            permission.required_permissions = required.iter().map(|c| normalize_code(c)).collect();
        }
        if let Some(conflicting) = changes.conflicting_permissions {
            permission.conflicting_permissions =
                conflicting.iter().map(|c| normalize_code(c)).collect();
        }
        self.check_relations(&permission).await?;

        permission.updated_at = Utc::now();
        self.store.replace_permission(&permission).await?;
        tracing::info!(code = %permission.code, "Permission updated");
        Ok(permission)
    }

    async fn check_relations(&self, permission: &Permission) -> RbacResult<()> {
        let code = &permission.code;

        if permission.required_permissions.iter().any(|c| c == code) {
            return Err(RbacError::validation(format!(
                "Permission {} cannot require itself",
                code
            )));
        }
        if permission.conflicting_permissions.iter().any(|c| c == code) {
            return Err(RbacError::validation(format!(
                "Permission {} cannot conflict with itself",
                code
            )));
        }
        if permission.parent_permission_id.as_deref() == Some(code.as_str()) {
            return Err(RbacError::validation(format!(
                "Permission {} cannot be its own parent",
                code
            )));
        }
        if let Some(shared) = permission
            .required_permissions
            .iter()
            .find(|c| permission.conflicting_permissions.contains(c))
        {
            return Err(RbacError::validation(format!(
                "Permission {} both requires and conflicts with {}",
                code, shared
            )));
        }

        let catalog = self
            .store
            .fetch_permissions(&PermissionFilter::default())
            .await?;
        let known: HashSet<&str> = catalog.iter().map(|p| p.code.as_str()).collect();

        let referenced = permission
            .required_permissions
            .iter()
            .chain(permission.conflicting_permissions.iter())
            .chain(permission.parent_permission_id.iter());
        for reference in referenced {
            if !known.contains(reference.as_str()) {
                return Err(RbacError::validation(format!(
                    "Permission {} references unknown permission {}",
                    code, reference
                )));
            }
        }

        let graph: Graph = catalog
            .iter()
            .filter(|p| &p.code != code)
            .map(|p| (p.code.clone(), p.required_permissions.clone()))
            .collect();
        if let Some(cycle) = cycle_through(&graph, code, &permission.required_permissions) {
            return Err(RbacError::validation(format!(
                "Prerequisite cycle: {}",
                format_chain(&cycle)
            )));
        }

        let parents: Graph = catalog
            .iter()
            .filter(|p| &p.code != code)
            .map(|p| (p.code.clone(), p.parent_permission_id.iter().cloned().collect()))
            .collect();
        let parent: Vec<String> = permission.parent_permission_id.iter().cloned().collect();
        if let Some(cycle) = cycle_through(&parents, code, &parent) {
            return Err(RbacError::validation(format!(
                "Parent cycle: {}",
                format_chain(&cycle)
            )));
        }
        Ok(())
    }
}
