use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{EffectiveGrantsResponse, RoleResponse};
use crate::models::{NewRole, RoleUpdate};
use crate::utils::ValidatedJson;
use crate::AppState;

#[utoipa::path(
    post,
    path = "/roles",
    request_body = NewRole,
    responses(
        (status = 201, description = "Role created", body = RoleResponse),
        (status = 400, description = "Scope mismatch, duplicate name, unknown reference or cycle", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Invalid payload", body = crate::dtos::ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn create_role(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<NewRole>,
) -> Result<(StatusCode, Json<RoleResponse>), AppError> {
    let role = state.rbac.roles.create_role(req).await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

#[utoipa::path(
    get,
    path = "/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Role", body = RoleResponse),
        (status = 404, description = "Unknown role", body = crate::dtos::ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<RoleResponse>, AppError> {
    let role = state.rbac.roles.get_role(&id).await?;
    Ok(Json(role.into()))
}

#[utoipa::path(
    patch,
    path = "/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    request_body = RoleUpdate,
    responses(
        (status = 200, description = "Role updated", body = RoleResponse),
        (status = 400, description = "Unknown reference or inheritance cycle", body = crate::dtos::ErrorResponse),
        (status = 404, description = "Unknown role", body = crate::dtos::ErrorResponse),
        (status = 409, description = "Built-in role", body = crate::dtos::ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn update_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<RoleUpdate>,
) -> Result<Json<RoleResponse>, AppError> {
    let role = state.rbac.roles.update_role(&id, req).await?;
    Ok(Json(role.into()))
}

/// Delete a custom role nobody inherits from
#[utoipa::path(
    delete,
    path = "/roles/{id}",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 204, description = "Role deleted"),
        (status = 404, description = "Unknown role", body = crate::dtos::ErrorResponse),
        (status = 409, description = "Built-in or still inherited", body = crate::dtos::ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn delete_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.rbac.roles.delete_role(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Resolve a role's effective grant set through its inheritance graph
#[utoipa::path(
    get,
    path = "/roles/{id}/effective-grants",
    params(("id" = String, Path, description = "Role id")),
    responses(
        (status = 200, description = "Effective grant set", body = EffectiveGrantsResponse),
        (status = 404, description = "Unknown role", body = crate::dtos::ErrorResponse),
        (status = 409, description = "Conflicting permissions", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Cycle or dangling reference", body = crate::dtos::ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn effective_grants(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EffectiveGrantsResponse>, AppError> {
    let effective = state.rbac.resolver.resolve(&id).await?;
    Ok(Json(effective.into()))
}

#[utoipa::path(
    get,
    path = "/roles/system",
    responses((status = 200, description = "System roles", body = [RoleResponse])),
    tag = "Roles"
)]
pub async fn list_system_roles(
    State(state): State<AppState>,
) -> Result<Json<Vec<RoleResponse>>, AppError> {
    let roles = state.rbac.roles.list_system_roles().await?;
    Ok(Json(roles.into_iter().map(Into::into).collect()))
}

/// Tenant and custom roles of one tenant
#[utoipa::path(
    get,
    path = "/tenants/{id}/roles",
    params(("id" = String, Path, description = "Tenant id")),
    responses(
        (status = 200, description = "Tenant roles", body = [RoleResponse]),
        (status = 404, description = "Unknown tenant", body = crate::dtos::ErrorResponse)
    ),
    tag = "Roles"
)]
pub async fn list_tenant_roles(
    State(state): State<AppState>,
    Path(tenant_id): Path<String>,
) -> Result<Json<Vec<RoleResponse>>, AppError> {
    state.tenants.get_tenant(&tenant_id).await?;
    let roles = state.rbac.roles.list_tenant_roles(&tenant_id).await?;
    Ok(Json(roles.into_iter().map(Into::into).collect()))
}
