//! MongoDB implementation of the RBAC persistence collaborator.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::TryStreamExt;
use mongodb::bson::{doc, Bson, DateTime as BsonDateTime, Document};
use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use mongodb::options::{FindOptions, ReplaceOptions, UpdateOptions};
use mongodb::Collection;
use tokio::sync::OwnedMutexGuard;
use tracing::instrument;
use uuid::Uuid;

use super::database::MongoDb;
use crate::models::{Permission, PermissionFilter, Role, RoleScope, Tenant, UserRoleAssignments};
use crate::rbac::{RbacError, RbacResult, RbacStore, ScopeLease};

/// A lease older than this is considered abandoned by a crashed writer.
const LEASE_TTL_SECS: i64 = 30;
const LEASE_RETRY: Duration = Duration::from_millis(25);
const LEASE_WAIT: Duration = Duration::from_secs(10);

const DUPLICATE_KEY: i32 = 11000;

fn is_duplicate_key(err: &MongoError) -> bool {
    match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) => e.code == DUPLICATE_KEY,
        ErrorKind::Command(e) => e.code == DUPLICATE_KEY,
        _ => false,
    }
}

/// Lease filter and update: take the scope document when it is absent or
/// its lease has expired. A live lease makes the upsert collide on `_id`.
fn lease_claim(scope: &str, holder: &str) -> (Document, Document) {
    let now = Utc::now();
    let expires_at = now + chrono::Duration::seconds(LEASE_TTL_SECS);
    (
        doc! {
            "_id": scope,
            "expires_at": { "$lt": BsonDateTime::from_chrono(now) },
        },
        doc! {
            "$set": {
                "holder": holder,
                "expires_at": BsonDateTime::from_chrono(expires_at),
            },
        },
    )
}

/// A claimed `scope_locks` document. Dropping it deletes the document, then
/// lets the next local writer through.
struct MongoLease {
    collection: Collection<Document>,
    scope: String,
    holder: String,
    local: Option<OwnedMutexGuard<()>>,
}

impl Drop for MongoLease {
    fn drop(&mut self) {
        let collection = self.collection.clone();
        let filter = doc! { "_id": self.scope.as_str(), "holder": self.holder.as_str() };
        let local = self.local.take();
        let scope = std::mem::take(&mut self.scope);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = collection.delete_one(filter, None).await {
                        tracing::warn!(scope = %scope, "Failed to release scope lease: {}", e);
                    }
                    drop(local);
                });
            }
            Err(_) => {
                tracing::warn!(scope = %scope, "Scope lease left to expire outside a runtime");
            }
        }
    }
}

fn permission_query(filter: &PermissionFilter) -> Document {
    let mut query = doc! {};
    if let Some(resource_type) = filter.resource_type {
        query.insert("resource_type", resource_type.as_str());
    }
    if let Some(category) = &filter.category {
        query.insert("category", category.as_str());
    }
    if filter.active_only {
        query.insert("is_active", true);
    }
    query
}

fn by_name() -> FindOptions {
    FindOptions::builder()
        .sort(doc! { "name": 1, "_id": 1 })
        .build()
}

impl MongoDb {
    async fn find_roles(&self, filter: Document) -> RbacResult<Vec<Role>> {
        let cursor = self.roles().find(filter, by_name()).await?;
        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl RbacStore for MongoDb {
    #[instrument(skip(self))]
    async fn fetch_permission(&self, code: &str) -> RbacResult<Option<Permission>> {
        Ok(self.permissions().find_one(doc! { "_id": code }, None).await?)
    }

    async fn fetch_permissions(&self, filter: &PermissionFilter) -> RbacResult<Vec<Permission>> {
        let options = FindOptions::builder().sort(doc! { "_id": 1 }).build();
        let cursor = self
            .permissions()
            .find(permission_query(filter), options)
            .await?;
        Ok(cursor.try_collect().await?)
    }

    async fn insert_permission(&self, permission: &Permission) -> RbacResult<()> {
        self.permissions().insert_one(permission, None).await?;
        Ok(())
    }

    async fn replace_permission(&self, permission: &Permission) -> RbacResult<()> {
        self.permissions()
            .replace_one(doc! { "_id": permission.code.as_str() }, permission, None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn fetch_role(&self, id: &str) -> RbacResult<Option<Role>> {
        Ok(self.roles().find_one(doc! { "_id": id }, None).await?)
    }

    async fn fetch_role_by_name(
        &self,
        tenant_id: Option<&str>,
        name: &str,
    ) -> RbacResult<Option<Role>> {
        let tenant = tenant_id.map_or(Bson::Null, |t| Bson::String(t.to_string()));
        Ok(self
            .roles()
            .find_one(doc! { "name": name, "tenant_id": tenant }, None)
            .await?)
    }

    #[instrument(skip(self))]
    async fn fetch_roles_by_tenant(&self, tenant_id: &str) -> RbacResult<Vec<Role>> {
        self.find_roles(doc! { "tenant_id": tenant_id }).await
    }

    async fn fetch_system_roles(&self) -> RbacResult<Vec<Role>> {
        self.find_roles(doc! { "tenant_id": Bson::Null }).await
    }

    async fn fetch_roles_inheriting(&self, role_id: &str) -> RbacResult<Vec<Role>> {
        self.find_roles(doc! { "inherits_from": role_id }).await
    }

    async fn insert_role(&self, role: &Role) -> RbacResult<()> {
        self.roles().insert_one(role, None).await?;
        Ok(())
    }

    async fn replace_role(&self, role: &Role) -> RbacResult<()> {
        let result = self
            .roles()
            .replace_one(doc! { "_id": role.id.as_str() }, role, None)
            .await?;
        if result.matched_count == 0 {
            return Err(RbacError::not_found("Role", role.id.clone()));
        }
        Ok(())
    }

    async fn delete_role(&self, id: &str) -> RbacResult<bool> {
        let result = self.roles().delete_one(doc! { "_id": id }, None).await?;
        Ok(result.deleted_count > 0)
    }

    async fn fetch_tenant(&self, id: &str) -> RbacResult<Option<Tenant>> {
        Ok(self.tenants().find_one(doc! { "_id": id }, None).await?)
    }

    async fn fetch_tenant_by_code(&self, code: &str) -> RbacResult<Option<Tenant>> {
        Ok(self.tenants().find_one(doc! { "code": code }, None).await?)
    }

    async fn fetch_tenant_by_domain(&self, domain: &str) -> RbacResult<Option<Tenant>> {
        Ok(self
            .tenants()
            .find_one(doc! { "domain": domain }, None)
            .await?)
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> RbacResult<()> {
        self.tenants().insert_one(tenant, None).await?;
        Ok(())
    }

    async fn replace_tenant(&self, tenant: &Tenant) -> RbacResult<()> {
        self.tenants()
            .replace_one(doc! { "_id": tenant.id.as_str() }, tenant, None)
            .await?;
        Ok(())
    }

    async fn fetch_assignments(&self, user_id: &str) -> RbacResult<Option<UserRoleAssignments>> {
        Ok(self
            .assignments()
            .find_one(doc! { "_id": user_id }, None)
            .await?)
    }

    async fn upsert_assignments(&self, assignments: &UserRoleAssignments) -> RbacResult<()> {
        let options = ReplaceOptions::builder().upsert(true).build();
        self.assignments()
            .replace_one(doc! { "_id": assignments.user_id.as_str() }, assignments, options)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(scope = %scope))]
    async fn lock_scope(&self, scope: &RoleScope) -> RbacResult<ScopeLease> {
        let local = self.local_locks().lock(scope).await;
        let key = scope.to_string();
        let holder = Uuid::new_v4().to_string();
        let options = UpdateOptions::builder().upsert(true).build();
        let deadline = tokio::time::Instant::now() + LEASE_WAIT;

        loop {
            let (filter, update) = lease_claim(&key, &holder);
            match self
                .scope_locks()
                .update_one(filter, update, options.clone())
                .await
            {
                Ok(_) => break,
                Err(e) if is_duplicate_key(&e) => {}
                Err(e) => return Err(e.into()),
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(RbacError::conflict(format!(
                    "Scope {} is locked by another writer",
                    key
                )));
            }
            tokio::time::sleep(LEASE_RETRY).await;
        }

        tracing::debug!(scope = %key, "Scope lease acquired");
        Ok(ScopeLease::new(MongoLease {
            collection: self.scope_locks(),
            scope: key,
            holder,
            local: Some(local),
        }))
    }

    async fn health_check(&self) -> RbacResult<()> {
        MongoDb::health_check(self)
            .await
            .map_err(|e| RbacError::Store(anyhow::anyhow!(e.to_string())))
    }
}
