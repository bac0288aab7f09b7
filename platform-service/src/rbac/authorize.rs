//! Authorization decisions over resolved grant sets.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::ToSchema;

use super::error::{RbacError, RbacResult};
use super::resolver::{EffectiveGrants, ResolvedGrant, RoleResolver};
use super::store::RbacStore;
use crate::models::{normalize_code, GrantConditions, ResourceType, UserRoleAssignments};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Granted,
    Denied,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Granted => "granted",
            Decision::Denied => "denied",
        }
    }

    pub fn is_granted(&self) -> bool {
        matches!(self, Decision::Granted)
    }
}

/// Facts about the target resource that grant conditions are checked against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ResourceContext {
    pub owner_id: Option<String>,
    pub status: Option<String>,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, ToSchema)]
pub struct AuthorizationRequest {
    #[schema(example = "EDIT_STORY")]
    pub permission: String,
    pub resource_type: ResourceType,
    pub resource_id: Option<String>,
    pub context: Option<ResourceContext>,
}

impl AuthorizationRequest {
    pub fn new(permission: &str, resource_type: ResourceType) -> Self {
        Self {
            permission: normalize_code(permission),
            resource_type,
            resource_id: None,
            context: None,
        }
    }

    pub fn on(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }

    pub fn with_context(mut self, context: ResourceContext) -> Self {
        self.context = Some(context);
        self
    }
}

/// Pure decision over already-resolved grant sets. System grants only count
/// when the permission is system-level; tenant grants must match the
/// resource id (when scoped to one) and satisfy their conditions.
pub fn decide(
    system: Option<&EffectiveGrants>,
    tenant: &[EffectiveGrants],
    user_id: &str,
    request: &AuthorizationRequest,
) -> Decision {
    let permission = normalize_code(&request.permission);

    let system_granted = system.is_some_and(|effective| {
        effective.grants.iter().any(|g| {
            g.is_system_level
                && g.grant.permission == permission
                && g.grant.resource_type == request.resource_type
        })
    });
    if system_granted {
        return Decision::Granted;
    }

    let tenant_granted = tenant
        .iter()
        .flat_map(|effective| effective.grants.iter())
        .any(|g| tenant_grant_matches(g, &permission, user_id, request));
    if tenant_granted {
        Decision::Granted
    } else {
        Decision::Denied
    }
}

fn tenant_grant_matches(
    resolved: &ResolvedGrant,
    permission: &str,
    user_id: &str,
    request: &AuthorizationRequest,
) -> bool {
    let grant = &resolved.grant;
    if grant.permission != permission || grant.resource_type != request.resource_type {
        return false;
    }
    if let Some(scoped_id) = &grant.resource_id {
        if request.resource_id.as_ref() != Some(scoped_id) {
            return false;
        }
    }
    match &grant.conditions {
        Some(conditions) => conditions_hold(conditions, user_id, request.context.as_ref()),
        None => true,
    }
}

/// Every present condition must hold. Conditions without a context never hold.
pub fn conditions_hold(
    conditions: &GrantConditions,
    user_id: &str,
    context: Option<&ResourceContext>,
) -> bool {
    if conditions.is_empty() {
        return true;
    }
    let Some(context) = context else {
        return false;
    };

    if conditions.owner_only && context.owner_id.as_deref() != Some(user_id) {
        return false;
    }
    if let Some(allowed) = &conditions.status {
        match &context.status {
            Some(status) if allowed.iter().any(|s| s == status) => {}
            _ => return false,
        }
    }
    if let Some(custom) = &conditions.custom {
        for (key, expected) in custom {
            if context.attributes.get(key) != Some(expected) {
                return false;
            }
        }
    }
    true
}

/// Loads a user's roles, resolves them, and decides.
#[derive(Clone)]
pub struct Authorizer {
    store: Arc<dyn RbacStore>,
    resolver: RoleResolver,
}

impl Authorizer {
    pub fn new(store: Arc<dyn RbacStore>, resolver: RoleResolver) -> Self {
        Self { store, resolver }
    }

    /// Authorize a user by id. Users without stored assignments hold no roles.
    pub async fn authorize_user(
        &self,
        user_id: &str,
        tenant_id: Option<&str>,
        request: &AuthorizationRequest,
    ) -> RbacResult<Decision> {
        let assignments = self
            .store
            .fetch_assignments(user_id)
            .await?
            .unwrap_or_else(|| UserRoleAssignments::empty(user_id));
        self.authorize(&assignments, tenant_id, request).await
    }

    #[instrument(skip(self, assignments, request), fields(user_id = %assignments.user_id, permission = %request.permission))]
    pub async fn authorize(
        &self,
        assignments: &UserRoleAssignments,
        tenant_id: Option<&str>,
        request: &AuthorizationRequest,
    ) -> RbacResult<Decision> {
        let decision = self.evaluate(assignments, tenant_id, request).await?;
        metrics::counter!(
            "rbac_authorization_decisions_total",
            "decision" => decision.as_str()
        )
        .increment(1);
        tracing::debug!(decision = decision.as_str(), tenant_id = ?tenant_id, "Authorization decided");
        Ok(decision)
    }

    async fn evaluate(
        &self,
        assignments: &UserRoleAssignments,
        tenant_id: Option<&str>,
        request: &AuthorizationRequest,
    ) -> RbacResult<Decision> {
        let user_id = assignments.user_id.as_str();

        if let Some(role_id) = &assignments.system_role_id {
            let system = self.resolve_assigned(role_id).await?;
            if decide(Some(&system), &[], user_id, request).is_granted() {
                return Ok(Decision::Granted);
            }
        }

        let Some(tenant_id) = tenant_id else {
            return Ok(Decision::Denied);
        };
        match self.store.fetch_tenant(tenant_id).await? {
            Some(tenant) if tenant.is_active => {}
            _ => return Ok(Decision::Denied),
        }

        let mut tenant_sets = Vec::new();
        if let Some(role_id) = assignments.tenant_roles.get(tenant_id) {
            let role = self.store.fetch_role(role_id).await?.ok_or_else(|| {
                RbacError::integrity(format!(
                    "User {} is assigned missing role {}",
                    user_id, role_id
                ))
            })?;
            if role.tenant_id.as_deref() != Some(tenant_id) {
                return Err(RbacError::integrity(format!(
                    "User {} tenant role {} does not belong to tenant {}",
                    user_id, role_id, tenant_id
                )));
            }
            tenant_sets.push(self.resolve_assigned(role_id).await?);
        }
        for role_id in &assignments.custom_role_ids {
            let role = self.store.fetch_role(role_id).await?.ok_or_else(|| {
                RbacError::integrity(format!(
                    "User {} is assigned missing role {}",
                    user_id, role_id
                ))
            })?;
            if role.tenant_id.as_deref() == Some(tenant_id) {
                tenant_sets.push(self.resolve_assigned(role_id).await?);
            }
        }

        Ok(decide(None, &tenant_sets, user_id, request))
    }

    /// Assigned roles are references held by users, so a missing role is a
    /// broken reference rather than a caller error.
    async fn resolve_assigned(&self, role_id: &str) -> RbacResult<EffectiveGrants> {
        self.resolver.resolve(role_id).await.map_err(|e| match e {
            RbacError::NotFound { id, .. } => {
                RbacError::integrity(format!("Assigned role {} does not exist", id))
            }
            other => other,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PermissionGrant;
    use serde_json::json;

    fn resolved(code: &str, rt: ResourceType, system_level: bool) -> ResolvedGrant {
        ResolvedGrant {
            grant: PermissionGrant::new(code, rt),
            source_chain: vec!["r".to_string()],
            is_system_level: system_level,
        }
    }

    fn set(grants: Vec<ResolvedGrant>) -> EffectiveGrants {
        EffectiveGrants {
            role_id: "r".to_string(),
            grants,
        }
    }

    #[test]
    fn test_system_grant_requires_system_level() {
        let request = AuthorizationRequest::new("MANAGE_TENANTS", ResourceType::Tenant);
        let system = set(vec![resolved("MANAGE_TENANTS", ResourceType::Tenant, true)]);
        assert_eq!(decide(Some(&system), &[], "u1", &request), Decision::Granted);

        let not_system = set(vec![resolved("MANAGE_TENANTS", ResourceType::Tenant, false)]);
        assert_eq!(
            decide(Some(&not_system), &[], "u1", &request),
            Decision::Denied
        );

        let wrong_type = AuthorizationRequest::new("MANAGE_TENANTS", ResourceType::System);
        assert_eq!(
            decide(Some(&system), &[], "u1", &wrong_type),
            Decision::Denied
        );
    }

    #[test]
    fn test_resource_scoped_grant() {
        let mut grant = resolved("EDIT_STORY", ResourceType::Story, false);
        grant.grant.resource_id = Some("story-1".to_string());
        let tenant = vec![set(vec![grant])];

        let own = AuthorizationRequest::new("EDIT_STORY", ResourceType::Story).on("story-1");
        let other = AuthorizationRequest::new("EDIT_STORY", ResourceType::Story).on("story-2");
        let unscoped = AuthorizationRequest::new("EDIT_STORY", ResourceType::Story);
        assert_eq!(decide(None, &tenant, "u1", &own), Decision::Granted);
        assert_eq!(decide(None, &tenant, "u1", &other), Decision::Denied);
        assert_eq!(decide(None, &tenant, "u1", &unscoped), Decision::Denied);
    }

    #[test]
    fn test_owner_only_condition() {
        let mut grant = resolved("EDIT_STORY", ResourceType::Story, false);
        grant.grant.conditions = Some(GrantConditions {
            owner_only: true,
            ..Default::default()
        });
        let tenant = vec![set(vec![grant])];

        let owned = AuthorizationRequest::new("EDIT_STORY", ResourceType::Story).with_context(
            ResourceContext {
                owner_id: Some("u1".to_string()),
                ..Default::default()
            },
        );
        assert_eq!(decide(None, &tenant, "u1", &owned), Decision::Granted);
        assert_eq!(decide(None, &tenant, "u2", &owned), Decision::Denied);

        let no_context = AuthorizationRequest::new("EDIT_STORY", ResourceType::Story);
        assert_eq!(decide(None, &tenant, "u1", &no_context), Decision::Denied);
    }

    #[test]
    fn test_status_and_custom_conditions() {
        let conditions = GrantConditions {
            owner_only: false,
            status: Some(vec!["draft".to_string(), "review".to_string()]),
            custom: Some(BTreeMap::from([("language".to_string(), json!("vi"))])),
        };
        let context = |status: &str, language: &str| ResourceContext {
            owner_id: None,
            status: Some(status.to_string()),
            attributes: BTreeMap::from([("language".to_string(), json!(language))]),
        };

        assert!(conditions_hold(&conditions, "u1", Some(&context("draft", "vi"))));
        assert!(!conditions_hold(&conditions, "u1", Some(&context("published", "vi"))));
        assert!(!conditions_hold(&conditions, "u1", Some(&context("draft", "en"))));
        assert!(conditions_hold(&GrantConditions::default(), "u1", None));
    }
}
