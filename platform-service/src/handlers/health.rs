use axum::{
    extract::State,
    http::{Method, StatusCode, Uri},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};

use crate::dtos::RouteNotFoundResponse;
use crate::AppState;

/// Service banner
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service banner")),
    tag = "Observability"
)]
pub async fn home(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "message": "Hello World!",
        "version": state.config.service_version,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

async fn store_healthy(state: &AppState) -> bool {
    if let Some(db) = &state.db {
        if !db.is_connected() {
            return false;
        }
    }
    match state.rbac.store.health_check().await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(error = %e, "Store health check failed");
            false
        }
    }
}

fn status_of(healthy: bool) -> (StatusCode, &'static str, &'static str) {
    if healthy {
        (StatusCode::OK, "OK", "healthy")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", "unhealthy")
    }
}

/// Service health check
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (code, status, database) = status_of(store_healthy(&state).await);

    (
        code,
        Json(json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "services": { "database": database },
            "uptime": state.started_at.elapsed().as_secs_f64(),
        })),
    )
}

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health/detailed",
    responses(
        (status = 200, description = "Service is healthy"),
        (status = 503, description = "Store unreachable")
    ),
    tag = "Observability"
)]
pub async fn health_detailed(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let (code, status, database) = status_of(store_healthy(&state).await);

    (
        code,
        Json(json!({
            "status": status,
            "timestamp": Utc::now().to_rfc3339(),
            "services": { "database": database },
            "system": {
                "service": state.config.service_name,
                "version": state.config.service_version,
                "environment": format!("{:?}", state.config.environment).to_lowercase(),
                "persistence": format!("{:?}", state.config.persistence).to_lowercase(),
                "uptime": state.started_at.elapsed().as_secs_f64(),
                "platform": std::env::consts::OS,
                "arch": std::env::consts::ARCH,
            }
        })),
    )
}

pub async fn not_found(method: Method, uri: Uri) -> (StatusCode, Json<RouteNotFoundResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(RouteNotFoundResponse {
            error: "Route not found".to_string(),
            message: format!("Cannot {} {}", method, uri.path()),
            timestamp: Utc::now().to_rfc3339(),
        }),
    )
}
