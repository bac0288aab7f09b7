pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod rbac;
pub mod services;
pub mod startup;
pub mod utils;

use std::sync::Arc;
use std::time::Instant;

use service_core::axum::{
    http::{header, HeaderName, HeaderValue, Method, Request},
    middleware::from_fn,
    routing::{get, patch, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics_middleware, request_id_middleware, security_headers_middleware, REQUEST_ID_HEADER,
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::config::{PersistenceBackend, PlatformConfig, SwaggerMode};
use crate::middleware::{TENANT_ID_HEADER, USER_ID_HEADER};
use crate::rbac::{seed_built_ins, InMemoryStore, Rbac, RbacStore};
use crate::services::{AssignmentService, MongoDb, TenantService};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::home,
        handlers::health::health_check,
        handlers::health::health_detailed,
        handlers::permission::list_permissions,
        handlers::permission::create_permission,
        handlers::permission::get_permission,
        handlers::permission::update_permission,
        handlers::role::create_role,
        handlers::role::get_role,
        handlers::role::update_role,
        handlers::role::delete_role,
        handlers::role::effective_grants,
        handlers::role::list_system_roles,
        handlers::role::list_tenant_roles,
        handlers::tenant::create_tenant,
        handlers::tenant::get_tenant,
        handlers::tenant::set_tenant_status,
        handlers::assignment::get_assignments,
        handlers::assignment::replace_assignments,
        handlers::authz::check,
    ),
    components(
        schemas(
            dtos::ErrorResponse,
            dtos::RouteNotFoundResponse,
            dtos::PermissionResponse,
            dtos::RoleResponse,
            dtos::EffectiveGrantsResponse,
            dtos::AssignmentsResponse,
            dtos::AuthorizationResponse,
            dtos::TenantResponse,
            dtos::TenantCreatedResponse,
            dtos::TenantStatusRequest,
            models::ResourceType,
            models::NewPermission,
            models::PermissionUpdate,
            models::RoleType,
            models::GrantConditions,
            models::PermissionGrant,
            models::NewRole,
            models::RoleUpdate,
            models::TenantStatus,
            models::NewTenant,
            models::AssignmentUpdate,
            rbac::ResolvedGrant,
            rbac::Decision,
            rbac::ResourceContext,
            rbac::AuthorizationRequest,
        )
    ),
    tags(
        (name = "Permissions", description = "Permission catalog"),
        (name = "Roles", description = "Role definitions and effective grants"),
        (name = "Tenants", description = "Tenant lifecycle"),
        (name = "Assignments", description = "User role assignments"),
        (name = "Authorization", description = "Access decisions"),
        (name = "Observability", description = "Service health and monitoring"),
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: PlatformConfig,
    pub rbac: Rbac,
    pub tenants: TenantService,
    pub assignments: AssignmentService,
    /// Present only for the MongoDB backend.
    pub db: Option<MongoDb>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: PlatformConfig, store: Arc<dyn RbacStore>, db: Option<MongoDb>) -> Self {
        let rbac = Rbac::new(store.clone());
        let tenants = TenantService::new(store.clone(), rbac.roles.clone());
        let assignments = AssignmentService::new(store);
        Self {
            config,
            rbac,
            tenants,
            assignments,
            db,
            started_at: Instant::now(),
        }
    }
}

/// Connect the configured backend, seed built-ins when enabled and assemble
/// the application state.
pub async fn build_state(config: PlatformConfig) -> Result<AppState, AppError> {
    let (store, db): (Arc<dyn RbacStore>, Option<MongoDb>) = match config.persistence {
        PersistenceBackend::Memory => {
            tracing::info!("Using in-memory persistence");
            (Arc::new(InMemoryStore::new()), None)
        }
        PersistenceBackend::Mongodb => {
            let db = MongoDb::connect(&config.mongodb).await.map_err(|e| {
                tracing::error!("Failed to connect to MongoDB: {}", e);
                e
            })?;
            db.initialize_indexes().await.map_err(|e| {
                tracing::error!("Failed to initialize database indexes: {}", e);
                e
            })?;
            (Arc::new(db.clone()), Some(db))
        }
    };

    let seed = config.seed_built_ins;
    let state = AppState::new(config, store, db);

    if seed {
        seed_built_ins(&state.rbac.registry, &state.rbac.roles).await?;
    }

    Ok(state)
}

pub fn build_router(state: AppState) -> Router {
    let mut app = Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health_check))
        .route("/health/detailed", get(handlers::health_detailed))
        .route("/metrics", get(handlers::metrics::metrics));

    if state.config.swagger.enabled == SwaggerMode::Public {
        app =
            app.merge(SwaggerUi::new("/docs").url("/.well-known/openapi.json", ApiDoc::openapi()));
    } else {
        app = app.route(
            "/.well-known/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        );
    }

    let origins: Vec<HeaderValue> = state
        .config
        .security
        .allowed_origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!("Invalid CORS origin '{}': {}. Skipping.", o, e);
                None
            }
        })
        .collect();

    app.route(
        "/permissions",
        get(handlers::list_permissions).post(handlers::create_permission),
    )
    .route(
        "/permissions/:code",
        get(handlers::get_permission).patch(handlers::update_permission),
    )
    .route("/roles", post(handlers::create_role))
    .route("/roles/system", get(handlers::list_system_roles))
    .route(
        "/roles/:id",
        get(handlers::get_role)
            .patch(handlers::update_role)
            .delete(handlers::delete_role),
    )
    .route("/roles/:id/effective-grants", get(handlers::effective_grants))
    .route("/tenants", post(handlers::create_tenant))
    .route("/tenants/:id", get(handlers::get_tenant))
    .route("/tenants/:id/status", patch(handlers::set_tenant_status))
    .route("/tenants/:id/roles", get(handlers::list_tenant_roles))
    .route(
        "/users/:id/assignments",
        get(handlers::get_assignments).put(handlers::replace_assignments),
    )
    .route("/authz/check", post(handlers::check))
    .fallback(handlers::not_found)
    .with_state(state)
    .layer(CompressionLayer::new())
    .layer(from_fn(metrics_middleware))
    .layer(
        TraceLayer::new_for_http().make_span_with(|request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");

            tracing::info_span!(
                "http_request",
                request_id = %request_id,
                method = %request.method(),
                uri = %request.uri(),
                version = ?request.version(),
            )
        }),
    )
    .layer(from_fn(request_id_middleware))
    .layer(from_fn(security_headers_middleware))
    .layer(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                HeaderName::from_static(REQUEST_ID_HEADER),
                HeaderName::from_static(USER_ID_HEADER),
                HeaderName::from_static(TENANT_ID_HEADER),
            ]),
    )
}
