//! Role resolver: flattens a role and everything it inherits into an
//! effective grant set.
//!
//! Resolution runs in four passes:
//! 1. breadth-first load of the role and its active ancestors, recording the
//!    chain that first reached each role;
//! 2. cycle and dangling-reference checks on the loaded graph;
//! 3. grant collection in discovery order, deduplicated by
//!    (permission, resource type, resource id);
//! 4. prerequisite filtering to a fixed point, then conflict detection.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use super::error::{format_chain, RbacError, RbacResult};
use super::graph::{find_cycle, Graph};
use super::store::RbacStore;
use crate::models::{GrantKey, Permission, PermissionGrant, Role};

/// A grant in an effective set, with the role chain that introduced it.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct ResolvedGrant {
    #[serde(flatten)]
    pub grant: PermissionGrant,
    /// Role ids from the resolved role down to the role holding the grant.
    pub source_chain: Vec<String>,
    pub is_system_level: bool,
}

/// Effective grant set of a single role.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EffectiveGrants {
    pub role_id: String,
    pub grants: Vec<ResolvedGrant>,
}

impl EffectiveGrants {
    pub fn empty(role_id: impl Into<String>) -> Self {
        Self {
            role_id: role_id.into(),
            grants: Vec::new(),
        }
    }

    pub fn permission_codes(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.grants
            .iter()
            .map(|g| g.grant.permission.as_str())
            .filter(|code| seen.insert(*code))
            .collect()
    }
}

#[derive(Clone)]
pub struct RoleResolver {
    store: Arc<dyn RbacStore>,
}

impl RoleResolver {
    pub fn new(store: Arc<dyn RbacStore>) -> Self {
        Self { store }
    }

    /// Resolve the effective grant set of `role_id`. A missing root is
    /// `NotFound`; a missing ancestor, tenant or a cycle is `Integrity`; a
    /// pair of conflicting permissions is `Conflict`. Roles of an inactive
    /// tenant resolve to an empty set.
    #[instrument(skip(self))]
    pub async fn resolve(&self, role_id: &str) -> RbacResult<EffectiveGrants> {
        let started = Instant::now();
        let result = self.resolve_inner(role_id).await;
        metrics::histogram!("rbac_resolution_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }

    async fn resolve_inner(&self, role_id: &str) -> RbacResult<EffectiveGrants> {
        let root = self
            .store
            .fetch_role(role_id)
            .await?
            .ok_or_else(|| RbacError::not_found("Role", role_id))?;

        if let Some(tenant_id) = root.tenant_id.as_deref() {
            let tenant = self.store.fetch_tenant(tenant_id).await?.ok_or_else(|| {
                RbacError::integrity(format!(
                    "Role {} belongs to missing tenant {}",
                    role_id, tenant_id
                ))
            })?;
            if !tenant.is_active {
                tracing::debug!(role_id = %role_id, tenant_id = %tenant_id, "Tenant inactive");
                return Ok(EffectiveGrants::empty(role_id));
            }
        }

        let reached = self.load_ancestors(root).await?;
        check_acyclic(role_id, &reached)?;

        let mut permissions: HashMap<String, Permission> = HashMap::new();
        let mut seen: HashSet<GrantKey> = HashSet::new();
        let mut grants = Vec::new();
        for (role, chain) in &reached {
            for grant in &role.permissions {
                if !seen.insert(grant.key()) {
                    continue;
                }
                let permission = match permissions.get(&grant.permission) {
                    Some(p) => p.clone(),
                    None => {
                        let p = self
                            .store
                            .fetch_permission(&grant.permission)
                            .await?
                            .ok_or_else(|| {
                                RbacError::integrity(format!(
                                    "Role {} grants unknown permission {}",
                                    role.id, grant.permission
                                ))
                            })?;
                        permissions.insert(p.code.clone(), p.clone());
                        p
                    }
                };
                if !permission.is_active {
                    continue;
                }
                grants.push(ResolvedGrant {
                    grant: grant.clone(),
                    source_chain: chain.clone(),
                    is_system_level: permission.is_system_level,
                });
            }
        }

        let grants = filter_prerequisites(grants, &permissions);
        check_conflicts(&grants, &permissions)?;

        tracing::debug!(role_id = %role_id, grants = grants.len(), "Role resolved");
        Ok(EffectiveGrants {
            role_id: role_id.to_string(),
            grants,
        })
    }

    /// Breadth-first walk over active roles. Each role appears once, paired
    /// with the chain that first reached it.
    async fn load_ancestors(&self, root: Role) -> RbacResult<Vec<(Role, Vec<String>)>> {
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(Role, Vec<String>)> = VecDeque::new();
        let mut reached = Vec::new();

        visited.insert(root.id.clone());
        let chain = vec![root.id.clone()];
        queue.push_back((root, chain));

        while let Some((role, chain)) = queue.pop_front() {
            if !role.is_active {
                continue;
            }
            for parent_id in &role.inherits_from {
                if chain.contains(parent_id) {
                    let mut cycle = chain.clone();
                    cycle.push(parent_id.clone());
                    return Err(RbacError::integrity(format!(
                        "Inheritance cycle: {}",
                        format_chain(&cycle)
                    )));
                }
                if !visited.insert(parent_id.clone()) {
                    continue;
                }
                let parent = self.store.fetch_role(parent_id).await?.ok_or_else(|| {
                    RbacError::integrity(format!(
                        "Role {} inherits from missing role {} (chain {})",
                        role.id,
                        parent_id,
                        format_chain(&chain)
                    ))
                })?;
                let mut parent_chain = chain.clone();
                parent_chain.push(parent_id.clone());
                queue.push_back((parent, parent_chain));
            }
            reached.push((role, chain));
        }
        Ok(reached)
    }
}

/// Cycles hidden behind an already-visited role are not on the first-reach
/// chain, so the loaded graph is checked as a whole.
fn check_acyclic(root_id: &str, reached: &[(Role, Vec<String>)]) -> RbacResult<()> {
    let graph: Graph = reached
        .iter()
        .map(|(role, _)| (role.id.clone(), role.inherits_from.clone()))
        .collect();
    match find_cycle(&graph, root_id) {
        Some(cycle) => Err(RbacError::integrity(format!(
            "Inheritance cycle: {}",
            format_chain(&cycle)
        ))),
        None => Ok(()),
    }
}

/// Drop grants whose prerequisites are missing until nothing changes. Each
/// round removes at least one grant, so the loop runs at most once per grant.
fn filter_prerequisites(
    mut grants: Vec<ResolvedGrant>,
    permissions: &HashMap<String, Permission>,
) -> Vec<ResolvedGrant> {
    for _ in 0..=grants.len() {
        let present: HashSet<String> = grants
            .iter()
            .map(|g| g.grant.permission.clone())
            .collect();
        let before = grants.len();
        grants.retain(|g| {
            permissions
                .get(&g.grant.permission)
                .map_or(true, |p| {
                    p.required_permissions.iter().all(|r| present.contains(r))
                })
        });
        if grants.len() == before {
            break;
        }
    }
    grants
}

fn check_conflicts(
    grants: &[ResolvedGrant],
    permissions: &HashMap<String, Permission>,
) -> RbacResult<()> {
    for (i, a) in grants.iter().enumerate() {
        for b in &grants[i + 1..] {
            let (code_a, code_b) = (&a.grant.permission, &b.grant.permission);
            if code_a == code_b {
                continue;
            }
            let conflicting = permissions
                .get(code_a)
                .is_some_and(|p| p.conflicts_with(code_b))
                || permissions
                    .get(code_b)
                    .is_some_and(|p| p.conflicts_with(code_a));
            if conflicting {
                return Err(RbacError::conflict(format!(
                    "Permission {} (via {}) conflicts with {} (via {})",
                    code_a,
                    format_chain(&a.source_chain),
                    code_b,
                    format_chain(&b.source_chain)
                )));
            }
        }
    }
    Ok(())
}
