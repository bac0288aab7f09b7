use crate::config::MongoConfig;
use crate::models::{Permission, Role, Tenant, UserRoleAssignments};
use crate::rbac::ScopeLocks;
use mongodb::{
    bson::{doc, Document},
    options::ClientOptions, options::IndexOptions, Client as MongoClient, Collection,
    Database, IndexModel,
};
use service_core::error::AppError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Explicit MongoDB handle: connected at startup, passed to the store layer,
/// disconnected on shutdown.
#[derive(Clone)]
pub struct MongoDb {
    client: MongoClient,
    db: Database,
    connected: Arc<AtomicBool>,
    /// Queues this process's writers before they contend for a scope lease.
    local_locks: Arc<ScopeLocks>,
}

impl MongoDb {
    pub async fn connect(config: &MongoConfig) -> Result<Self, AppError> {
        tracing::info!(database = %config.database, "Connecting to MongoDB");
        let mut client_options = ClientOptions::parse(&config.uri).await.map_err(|e| {
            tracing::error!("Failed to parse MongoDB connection string: {}", e);
            AppError::from(e)
        })?;
        client_options.app_name = Some("platform-service".to_string());
        client_options.max_pool_size = Some(config.max_pool_size);
        client_options.server_selection_timeout =
            Some(Duration::from_millis(config.server_selection_timeout_ms));

        let client = MongoClient::with_options(client_options).map_err(|e| {
            tracing::error!("Failed to create MongoDB client: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(&config.database);
        let mongo = Self {
            client,
            db,
            connected: Arc::new(AtomicBool::new(false)),
            local_locks: Arc::new(ScopeLocks::new()),
        };

        // The driver connects lazily; a ping surfaces bad URIs at startup.
        mongo.health_check().await?;
        mongo.connected.store(true, Ordering::SeqCst);
        tracing::info!(database = %config.database, "Successfully connected to MongoDB database");
        Ok(mongo)
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for platform-service");

        let permission_indexes = [
            IndexModel::builder()
                .keys(doc! { "resource_type": 1, "is_active": 1 })
                .options(
                    IndexOptions::builder()
                        .name("resource_type_active".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "category": 1, "is_active": 1 })
                .options(
                    IndexOptions::builder()
                        .name("category_active".to_string())
                        .build(),
                )
                .build(),
        ];
        self.permissions()
            .create_indexes(permission_indexes, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create indexes on permissions collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on permissions");

        let role_indexes = [
            IndexModel::builder()
                .keys(doc! { "name": 1, "tenant_id": 1 })
                .options(
                    IndexOptions::builder()
                        .name("name_per_scope".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "tenant_id": 1, "is_active": 1 })
                .options(
                    IndexOptions::builder()
                        .name("tenant_active".to_string())
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "inherits_from": 1 })
                .options(
                    IndexOptions::builder()
                        .name("inherits_from_lookup".to_string())
                        .build(),
                )
                .build(),
        ];
        self.roles()
            .create_indexes(role_indexes, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create indexes on roles collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on roles");

        let tenant_indexes = [
            IndexModel::builder()
                .keys(doc! { "code": 1 })
                .options(
                    IndexOptions::builder()
                        .name("code_unique".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "domain": 1 })
                .options(
                    IndexOptions::builder()
                        .name("domain_unique".to_string())
                        .unique(true)
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "status": 1 })
                .options(IndexOptions::builder().name("status".to_string()).build())
                .build(),
        ];
        self.tenants()
            .create_indexes(tenant_indexes, None)
            .await
            .map_err(|e| {
                tracing::error!("Failed to create indexes on tenants collection: {}", e);
                AppError::from(e)
            })?;
        tracing::info!("Created indexes on tenants");

        Ok(())
    }

    pub async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Close the connection pool. Later calls through clones of this handle
    /// fail with a database error.
    pub async fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.client.clone().shutdown().await;
            tracing::info!("Disconnected from MongoDB");
        }
    }

    pub fn permissions(&self) -> Collection<Permission> {
        self.db.collection("permissions")
    }

    pub fn roles(&self) -> Collection<Role> {
        self.db.collection("roles")
    }

    pub fn tenants(&self) -> Collection<Tenant> {
        self.db.collection("tenants")
    }

    pub fn assignments(&self) -> Collection<UserRoleAssignments> {
        self.db.collection("user_role_assignments")
    }

    /// One lease document per locked scope, keyed by the scope name.
    pub fn scope_locks(&self) -> Collection<Document> {
        self.db.collection("scope_locks")
    }

    pub fn local_locks(&self) -> &ScopeLocks {
        &self.local_locks
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}
