//! Role-based access control core: permission registry, role store, role
//! resolver and authorization decisions over a pluggable store.

pub mod authorize;
pub mod catalog;
pub mod error;
mod graph;
pub mod locks;
pub mod memory;
pub mod registry;
pub mod resolver;
pub mod roles;
pub mod store;

pub use authorize::{decide, AuthorizationRequest, Authorizer, Decision, ResourceContext};
pub use catalog::{provision_tenant_roles, seed_built_ins, tenant_role_id, SeedReport};
pub use error::{RbacError, RbacResult};
pub use locks::{ScopeLease, ScopeLocks};
pub use memory::InMemoryStore;
pub use registry::PermissionRegistry;
pub use resolver::{EffectiveGrants, ResolvedGrant, RoleResolver};
pub use roles::RoleStore;
pub use store::RbacStore;

use std::sync::Arc;

/// The RBAC services sharing one store.
#[derive(Clone)]
pub struct Rbac {
    pub store: Arc<dyn RbacStore>,
    pub registry: PermissionRegistry,
    pub roles: RoleStore,
    pub resolver: RoleResolver,
    pub authorizer: Authorizer,
}

impl Rbac {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        let resolver = RoleResolver::new(store.clone());
        Self {
            registry: PermissionRegistry::new(store.clone()),
            roles: RoleStore::new(store.clone()),
            authorizer: Authorizer::new(store.clone(), resolver.clone()),
            resolver,
            store,
        }
    }
}
