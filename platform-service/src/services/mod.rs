//! Services layer for platform-service: MongoDB persistence plus tenant and
//! assignment workflows on top of the RBAC core.

mod assignments;
mod database;
mod repository;
mod tenants;

pub use assignments::AssignmentService;
pub use database::MongoDb;
pub use tenants::TenantService;
