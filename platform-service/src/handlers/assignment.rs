use axum::{
    extract::{Path, State},
    Json,
};
use service_core::error::AppError;

use crate::dtos::AssignmentsResponse;
use crate::models::AssignmentUpdate;
use crate::AppState;

#[utoipa::path(
    get,
    path = "/users/{id}/assignments",
    params(("id" = String, Path, description = "User id")),
    responses((status = 200, description = "Role assignments", body = AssignmentsResponse)),
    tag = "Assignments"
)]
pub async fn get_assignments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<Json<AssignmentsResponse>, AppError> {
    let assignments = state.assignments.get(&user_id).await?;
    Ok(Json(assignments.into()))
}

/// Replace a user's role assignments wholesale
#[utoipa::path(
    put,
    path = "/users/{id}/assignments",
    params(("id" = String, Path, description = "User id")),
    request_body = AssignmentUpdate,
    responses(
        (status = 200, description = "Role assignments replaced", body = AssignmentsResponse),
        (status = 400, description = "Unknown role, tenant or wrong role type", body = crate::dtos::ErrorResponse)
    ),
    tag = "Assignments"
)]
pub async fn replace_assignments(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(req): Json<AssignmentUpdate>,
) -> Result<Json<AssignmentsResponse>, AppError> {
    let assignments = state.assignments.replace(&user_id, req).await?;
    Ok(Json(assignments.into()))
}
