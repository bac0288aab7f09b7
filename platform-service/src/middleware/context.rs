//! Request context extractors.
//!
//! The caller identity arrives in `X-User-ID` and the target tenant in the
//! optional `X-Tenant-ID`, both set by the upstream gateway after it has
//! authenticated the request.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use service_core::error::AppError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";

/// Authenticated user making the request.
#[derive(Debug, Clone)]
pub struct UserId(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| AppError::Unauthorized(anyhow::anyhow!("Missing X-User-ID header")))?;

        tracing::Span::current().record("user_id", user_id);

        Ok(UserId(user_id.to_string()))
    }
}

/// Tenant the request targets, if any.
#[derive(Debug, Clone)]
pub struct TenantHeader(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for TenantHeader
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let tenant_id = match parts.headers.get(TENANT_ID_HEADER) {
            None => None,
            Some(value) => {
                let value = value.to_str().map_err(|_| {
                    AppError::BadRequest(anyhow::anyhow!("X-Tenant-ID header is not valid text"))
                })?;
                let value = value.trim();
                (!value.is_empty()).then(|| value.to_string())
            }
        };

        if let Some(tenant_id) = &tenant_id {
            tracing::Span::current().record("tenant_id", tenant_id.as_str());
        }

        Ok(TenantHeader(tenant_id))
    }
}
