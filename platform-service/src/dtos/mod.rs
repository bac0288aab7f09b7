pub mod rbac;
pub mod tenant;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use rbac::*;
pub use tenant::*;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    #[schema(example = "Role not found: 0b6f...")]
    pub error: String,
}

/// Body for unknown routes.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct RouteNotFoundResponse {
    #[schema(example = "Route not found")]
    pub error: String,
    #[schema(example = "Cannot GET /nope")]
    pub message: String,
    pub timestamp: String,
}
