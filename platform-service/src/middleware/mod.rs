pub mod context;

pub use context::{TenantHeader, UserId, TENANT_ID_HEADER, USER_ID_HEADER};
