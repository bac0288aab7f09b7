use service_core::error::AppError;
use thiserror::Error;

/// Errors raised by the permission registry, role store, resolver and
/// authorizer. Every variant names the offending identifiers.
#[derive(Error, Debug)]
pub enum RbacError {
    /// Caller fault: a write-time invariant would be violated.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Stored data breaks an invariant that writes are supposed to uphold.
    #[error("Integrity error: {0}")]
    Integrity(String),

    #[error("Store error: {0}")]
    Store(#[from] anyhow::Error),
}

impl RbacError {
    pub fn validation(msg: impl Into<String>) -> Self {
        RbacError::Validation(msg.into())
    }

    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        RbacError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        RbacError::Conflict(msg.into())
    }

    pub fn integrity(msg: impl Into<String>) -> Self {
        RbacError::Integrity(msg.into())
    }
}

impl From<mongodb::error::Error> for RbacError {
    fn from(err: mongodb::error::Error) -> Self {
        RbacError::Store(anyhow::Error::new(err))
    }
}

impl From<mongodb::bson::ser::Error> for RbacError {
    fn from(err: mongodb::bson::ser::Error) -> Self {
        RbacError::Store(anyhow::Error::new(err))
    }
}

impl From<RbacError> for AppError {
    fn from(err: RbacError) -> Self {
        match err {
            RbacError::Validation(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            e @ RbacError::NotFound { .. } => AppError::NotFound(anyhow::anyhow!(e.to_string())),
            RbacError::Conflict(msg) => AppError::Conflict(anyhow::anyhow!(msg)),
            RbacError::Integrity(msg) => {
                AppError::InternalError(anyhow::anyhow!("Integrity error: {}", msg))
            }
            RbacError::Store(e) => AppError::DatabaseError(e),
        }
    }
}

pub type RbacResult<T> = Result<T, RbacError>;

/// Render a role chain as `root -> parent -> grandparent`.
pub fn format_chain(chain: &[String]) -> String {
    chain.join(" -> ")
}
