use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use crate::models::{AssignmentUpdate, Role, RoleType, UserRoleAssignments};
use crate::rbac::{RbacError, RbacResult, RbacStore};

/// Reads and replaces the roles held by a user.
#[derive(Clone)]
pub struct AssignmentService {
    store: Arc<dyn RbacStore>,
}

impl AssignmentService {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    /// A user with nothing stored holds no roles.
    pub async fn get(&self, user_id: &str) -> RbacResult<UserRoleAssignments> {
        Ok(self
            .store
            .fetch_assignments(user_id)
            .await?
            .unwrap_or_else(|| UserRoleAssignments::empty(user_id)))
    }

    #[instrument(skip(self, update))]
    pub async fn replace(
        &self,
        user_id: &str,
        update: AssignmentUpdate,
    ) -> RbacResult<UserRoleAssignments> {
        if let Some(role_id) = &update.system_role_id {
            let role = self.existing_role(role_id).await?;
            if role.role_type != RoleType::System {
                return Err(RbacError::validation(format!(
                    "Role {} is not a system role",
                    role_id
                )));
            }
        }

        for (tenant_id, role_id) in &update.tenant_roles {
            if self.store.fetch_tenant(tenant_id).await?.is_none() {
                return Err(RbacError::validation(format!(
                    "Tenant {} does not exist",
                    tenant_id
                )));
            }
            let role = self.existing_role(role_id).await?;
            if role.role_type != RoleType::Tenant
                || role.tenant_id.as_deref() != Some(tenant_id.as_str())
            {
                return Err(RbacError::validation(format!(
                    "Role {} is not a tenant role of tenant {}",
                    role_id, tenant_id
                )));
            }
        }

        let mut seen = HashSet::new();
        for role_id in &update.custom_role_ids {
            if !seen.insert(role_id.as_str()) {
                return Err(RbacError::validation(format!(
                    "Custom role {} is listed more than once",
                    role_id
                )));
            }
            let role = self.existing_role(role_id).await?;
            if role.role_type != RoleType::Custom {
                return Err(RbacError::validation(format!(
                    "Role {} is not a custom role",
                    role_id
                )));
            }
        }

        let assignments = UserRoleAssignments {
            user_id: user_id.to_string(),
            system_role_id: update.system_role_id,
            tenant_roles: update.tenant_roles,
            custom_role_ids: update.custom_role_ids,
            updated_at: Utc::now(),
        };
        self.store.upsert_assignments(&assignments).await?;
        tracing::info!(user_id = %user_id, "Role assignments replaced");
        Ok(assignments)
    }

    async fn existing_role(&self, role_id: &str) -> RbacResult<Role> {
        self.store
            .fetch_role(role_id)
            .await?
            .ok_or_else(|| RbacError::validation(format!("Role {} does not exist", role_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTenant;
    use crate::rbac::{seed_built_ins, tenant_role_id, Rbac, InMemoryStore};
    use crate::services::TenantService;
    use std::collections::BTreeMap;

    async fn setup() -> (AssignmentService, String) {
        let rbac = Rbac::new(Arc::new(InMemoryStore::new()));
        seed_built_ins(&rbac.registry, &rbac.roles).await.unwrap();
        let tenants = TenantService::new(rbac.store.clone(), rbac.roles.clone());
        let (tenant, _) = tenants
            .create_tenant(NewTenant {
                code: "acme".to_string(),
                name: "Acme".to_string(),
                domain: "acme.example.com".to_string(),
                contact_email: "ops@acme.example.com".to_string(),
                contact_phone: "555-0100".to_string(),
                allow_comments: None,
                allow_rating: None,
            })
            .await
            .unwrap();
        (AssignmentService::new(rbac.store.clone()), tenant.id)
    }

    #[tokio::test]
    async fn test_unknown_user_has_no_roles() {
        let (service, _) = setup().await;
        let assignments = service.get("nobody").await.unwrap();
        assert!(assignments.system_role_id.is_none());
        assert!(assignments.tenant_roles.is_empty());
    }

    #[tokio::test]
    async fn test_replace_and_read_back() {
        let (service, tenant_id) = setup().await;
        let update = AssignmentUpdate {
            system_role_id: Some("support".to_string()),
            tenant_roles: BTreeMap::from([(
                tenant_id.clone(),
                tenant_role_id(&tenant_id, "editor"),
            )]),
            custom_role_ids: vec![],
        };
        service.replace("u1", update).await.unwrap();

        let stored = service.get("u1").await.unwrap();
        assert_eq!(stored.system_role_id.as_deref(), Some("support"));
        assert_eq!(
            stored.tenant_roles.get(&tenant_id),
            Some(&tenant_role_id(&tenant_id, "editor"))
        );
    }

    #[tokio::test]
    async fn test_role_types_are_checked() {
        let (service, tenant_id) = setup().await;
        let wrong_system = AssignmentUpdate {
            system_role_id: Some(tenant_role_id(&tenant_id, "reader")),
            ..Default::default()
        };
        assert!(matches!(
            service.replace("u1", wrong_system).await,
            Err(RbacError::Validation(_))
        ));

        let wrong_tenant = AssignmentUpdate {
            tenant_roles: BTreeMap::from([(tenant_id.clone(), "support".to_string())]),
            ..Default::default()
        };
        assert!(matches!(
            service.replace("u1", wrong_tenant).await,
            Err(RbacError::Validation(_))
        ));
    }
}
