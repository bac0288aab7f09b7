use axum::{extract::State, Json};
use service_core::error::AppError;

use crate::dtos::AuthorizationResponse;
use crate::middleware::{TenantHeader, UserId};
use crate::models::normalize_code;
use crate::rbac::AuthorizationRequest;
use crate::AppState;

/// Decide whether the calling user may act on a resource
#[utoipa::path(
    post,
    path = "/authz/check",
    request_body = AuthorizationRequest,
    params(
        ("X-User-ID" = String, Header, description = "Calling user"),
        ("X-Tenant-ID" = Option<String>, Header, description = "Tenant the action happens in")
    ),
    responses(
        (status = 200, description = "Decision", body = AuthorizationResponse),
        (status = 401, description = "Missing X-User-ID", body = crate::dtos::ErrorResponse),
        (status = 409, description = "Conflicting permissions in a held role", body = crate::dtos::ErrorResponse),
        (status = 500, description = "Cycle or dangling role reference", body = crate::dtos::ErrorResponse)
    ),
    tag = "Authorization"
)]
pub async fn check(
    State(state): State<AppState>,
    UserId(user_id): UserId,
    TenantHeader(tenant_id): TenantHeader,
    Json(mut req): Json<AuthorizationRequest>,
) -> Result<Json<AuthorizationResponse>, AppError> {
    req.permission = normalize_code(&req.permission);
    let decision = state
        .rbac
        .authorizer
        .authorize_user(&user_id, tenant_id.as_deref(), &req)
        .await?;

    tracing::info!(
        user_id = %user_id,
        permission = %req.permission,
        decision = decision.as_str(),
        "Authorization check"
    );

    Ok(Json(AuthorizationResponse {
        decision,
        user_id,
        tenant_id,
        permission: req.permission,
        resource_type: req.resource_type,
        resource_id: req.resource_id,
    }))
}
