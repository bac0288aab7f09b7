use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;

use crate::dtos::{PermissionListQuery, PermissionResponse};
use crate::models::{NewPermission, PermissionFilter, PermissionUpdate};
use crate::utils::ValidatedJson;
use crate::AppState;

/// List permissions ordered by code
#[utoipa::path(
    get,
    path = "/permissions",
    params(PermissionListQuery),
    responses((status = 200, description = "Permissions", body = [PermissionResponse])),
    tag = "Permissions"
)]
pub async fn list_permissions(
    State(state): State<AppState>,
    Query(query): Query<PermissionListQuery>,
) -> Result<Json<Vec<PermissionResponse>>, AppError> {
    let filter = PermissionFilter {
        resource_type: query.resource_type,
        category: query.category.map(|c| c.trim().to_lowercase()),
        active_only: !query.include_inactive,
    };
    let permissions = state.rbac.registry.list(filter).await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}

/// Register a custom permission
#[utoipa::path(
    post,
    path = "/permissions",
    request_body = NewPermission,
    responses(
        (status = 201, description = "Permission registered", body = PermissionResponse),
        (status = 400, description = "Duplicate code, unknown reference or prerequisite cycle", body = crate::dtos::ErrorResponse),
        (status = 422, description = "Invalid payload", body = crate::dtos::ErrorResponse)
    ),
    tag = "Permissions"
)]
pub async fn create_permission(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<NewPermission>,
) -> Result<(StatusCode, Json<PermissionResponse>), AppError> {
    let permission = state.rbac.registry.register(req).await?;
    Ok((StatusCode::CREATED, Json(permission.into())))
}

#[utoipa::path(
    get,
    path = "/permissions/{code}",
    params(("code" = String, Path, description = "Permission code")),
    responses(
        (status = 200, description = "Permission", body = PermissionResponse),
        (status = 404, description = "Unknown permission", body = crate::dtos::ErrorResponse)
    ),
    tag = "Permissions"
)]
pub async fn get_permission(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<Json<PermissionResponse>, AppError> {
    let permission = state.rbac.registry.lookup(&code).await?;
    Ok(Json(permission.into()))
}

/// Update a custom permission. Built-in permissions are immutable.
#[utoipa::path(
    patch,
    path = "/permissions/{code}",
    params(("code" = String, Path, description = "Permission code")),
    request_body = PermissionUpdate,
    responses(
        (status = 200, description = "Permission updated", body = PermissionResponse),
        (status = 404, description = "Unknown permission", body = crate::dtos::ErrorResponse),
        (status = 409, description = "Built-in permission", body = crate::dtos::ErrorResponse)
    ),
    tag = "Permissions"
)]
pub async fn update_permission(
    State(state): State<AppState>,
    Path(code): Path<String>,
    ValidatedJson(req): ValidatedJson<PermissionUpdate>,
) -> Result<Json<PermissionResponse>, AppError> {
    let permission = state.rbac.registry.update(&code, req).await?;
    Ok(Json(permission.into()))
}
