use std::sync::Arc;

use tracing::instrument;

use crate::models::{NewTenant, Role, RoleScope, Tenant};
use crate::rbac::{provision_tenant_roles, RbacError, RbacResult, RbacStore, RoleStore};

/// Tenant lifecycle. Creating a tenant also provisions its built-in roles.
#[derive(Clone)]
pub struct TenantService {
    store: Arc<dyn RbacStore>,
    roles: RoleStore,
}

impl TenantService {
    pub fn new(store: Arc<dyn RbacStore>, roles: RoleStore) -> Self {
        Self { store, roles }
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create_tenant(&self, input: NewTenant) -> RbacResult<(Tenant, Vec<Role>)> {
        let tenant = Tenant::new(input);
        {
            // Tenant codes and domains are platform-wide, so creation runs
            // under the system scope.
            let _lease = self.store.lock_scope(&RoleScope::System).await?;
            if self.store.fetch_tenant_by_code(&tenant.code).await?.is_some() {
                return Err(RbacError::validation(format!(
                    "Tenant code {} is already taken",
                    tenant.code
                )));
            }
            if self
                .store
                .fetch_tenant_by_domain(&tenant.domain)
                .await?
                .is_some()
            {
                return Err(RbacError::validation(format!(
                    "Tenant domain {} is already taken",
                    tenant.domain
                )));
            }
            self.store.insert_tenant(&tenant).await?;
        }

        let roles = provision_tenant_roles(&self.roles, &tenant.id).await?;
        tracing::info!(tenant_id = %tenant.id, roles = roles.len(), "Tenant created");
        Ok((tenant, roles))
    }

    pub async fn get_tenant(&self, id: &str) -> RbacResult<Tenant> {
        self.store
            .fetch_tenant(id)
            .await?
            .ok_or_else(|| RbacError::not_found("Tenant", id))
    }

    #[instrument(skip(self))]
    pub async fn set_active(&self, id: &str, active: bool) -> RbacResult<Tenant> {
        let _lease = self
            .store
            .lock_scope(&RoleScope::Tenant(id.to_string()))
            .await?;
        let mut tenant = self.get_tenant(id).await?;
        tenant.set_active(active);
        self.store.replace_tenant(&tenant).await?;
        tracing::info!(tenant_id = %id, active, "Tenant status changed");
        Ok(tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rbac::{seed_built_ins, InMemoryStore, PermissionRegistry};

    async fn service() -> TenantService {
        let store: Arc<dyn RbacStore> = Arc::new(InMemoryStore::new());
        let roles = RoleStore::new(store.clone());
        let registry = PermissionRegistry::new(store.clone());
        seed_built_ins(&registry, &roles).await.unwrap();
        TenantService::new(store, roles)
    }

    fn new_tenant(code: &str, domain: &str) -> NewTenant {
        NewTenant {
            code: code.to_string(),
            name: "Stories".to_string(),
            domain: domain.to_string(),
            contact_email: "ops@example.com".to_string(),
            contact_phone: "555-0100".to_string(),
            allow_comments: None,
            allow_rating: None,
        }
    }

    #[tokio::test]
    async fn test_create_provisions_roles() {
        let service = service().await;
        let (tenant, roles) = service
            .create_tenant(new_tenant("acme", "acme.example.com"))
            .await
            .unwrap();
        assert_eq!(roles.len(), 8);
        assert!(roles
            .iter()
            .all(|r| r.is_built_in && r.tenant_id.as_deref() == Some(tenant.id.as_str())));
    }

    #[tokio::test]
    async fn test_code_and_domain_are_unique() {
        let service = service().await;
        service
            .create_tenant(new_tenant("acme", "acme.example.com"))
            .await
            .unwrap();
        assert!(matches!(
            service
                .create_tenant(new_tenant("ACME", "other.example.com"))
                .await,
            Err(RbacError::Validation(_))
        ));
        assert!(matches!(
            service
                .create_tenant(new_tenant("other", "acme.example.com"))
                .await,
            Err(RbacError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_set_active() {
        let service = service().await;
        let (tenant, _) = service
            .create_tenant(new_tenant("acme", "acme.example.com"))
            .await
            .unwrap();
        let updated = service.set_active(&tenant.id, false).await.unwrap();
        assert!(!updated.is_active);
        assert!(matches!(
            service.set_active("missing", true).await,
            Err(RbacError::NotFound { .. })
        ));
    }
}
