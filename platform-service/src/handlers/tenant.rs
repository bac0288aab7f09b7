use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{TenantCreatedResponse, TenantResponse, TenantStatusRequest};
use crate::models::NewTenant;
use crate::utils::ValidatedJson;
use crate::AppState;

/// Create a tenant and provision its built-in roles
#[utoipa::path(
    post,
    path = "/tenants",
    request_body = NewTenant,
    responses(
        (status = 201, description = "Tenant created", body = TenantCreatedResponse),
        (status = 400, description = "Code or domain already taken", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Invalid payload", body = crate::dtos::ErrorResponse)
    ),
    tag = "Tenants"
)]
pub async fn create_tenant(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<NewTenant>,
) -> Result<(StatusCode, Json<TenantCreatedResponse>), AppError> {
    let (tenant, roles) = state.tenants.create_tenant(req).await?;
    Ok((
        StatusCode::CREATED,
        Json(TenantCreatedResponse {
            tenant: tenant.into(),
            roles: roles.into_iter().map(Into::into).collect(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/tenants/{id}",
    params(("id" = String, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Tenant", body = TenantResponse),
        (status = 404, description = "Unknown tenant", body = crate::dtos::ErrorResponse)
    ),
    tag = "Tenants"
)]
pub async fn get_tenant(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<TenantResponse>, AppError> {
    let tenant = state.tenants.get_tenant(&id).await?;
    Ok(Json(tenant.into()))
}

/// Activate or deactivate a tenant. Inactive tenants deny every tenant-scoped check.
#[utoipa::path(
    patch,
    path = "/tenants/{id}/status",
    params(("id" = String, Path, description = "Tenant id")),
    request_body = TenantStatusRequest,
    responses(
        (status = 200, description = "Tenant updated", body = TenantResponse),
        (status = 404, description = "Unknown tenant", body = crate::dtos::ErrorResponse)
    ),
    tag = "Tenants"
)]
pub async fn set_tenant_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<TenantStatusRequest>,
) -> Result<Json<TenantResponse>, AppError> {
    let tenant = state.tenants.set_active(&id, req.is_active).await?;
    Ok(Json(tenant.into()))
}
