//! HTTP handlers for platform-service.

pub mod assignment;
pub mod authz;
pub mod health;
pub mod metrics;
pub mod permission;
pub mod role;
pub mod tenant;

pub use assignment::*;
pub use authz::*;
pub use health::*;
pub use permission::*;
pub use role::*;
pub use tenant::*;
