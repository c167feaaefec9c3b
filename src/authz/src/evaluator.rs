//! Decision evaluation against an assembled policy
//!
//! Default deny, first match allows. Candidates are the policy's permissions
//! on the queried resource whose action is the queried action or `manage`,
//! walked in policy order. A candidate that fails its scope or a condition is
//! skipped, never turned into an outright deny.
//!
//! Evaluation is pure: no logging, no I/O, no mutation. It runs against an
//! immutable snapshot and is safe to call from any number of threads.

use crate::types::{Permission, PermissionScope, Policy, ResourceContext, MANAGE};
use serde::{Deserialize, Serialize};

/// Why a decision came out the way it did
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecisionReason {
    /// No policy is loaded
    NoPolicy,

    /// A permission granted the request
    PermissionMatch { permission_id: String },

    /// No permission covers this action on this resource
    NoCandidates,

    /// Candidates existed but none satisfied its scope and conditions
    NotApplicable { candidates: usize },
}

/// Authorization decision with the permission that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    /// Whether the request is allowed
    pub allowed: bool,

    /// Granting permission, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permission_id: Option<String>,

    pub reason: DecisionReason,
}

impl Decision {
    fn allow(permission: &Permission) -> Self {
        Self {
            allowed: true,
            permission_id: Some(permission.id.clone()),
            reason: DecisionReason::PermissionMatch {
                permission_id: permission.id.clone(),
            },
        }
    }

    fn deny(reason: DecisionReason) -> Self {
        Self {
            allowed: false,
            permission_id: None,
            reason,
        }
    }
}

/// Can the policy's principal perform `action` on `resource` in `context`?
pub fn can_evaluate(
    policy: Option<&Policy>,
    action: &str,
    resource: &str,
    context: &ResourceContext,
) -> bool {
    match policy {
        Some(policy) => policy.permissions.iter().any(|p| {
            is_candidate(p, action, resource) && applies(policy, p, context)
        }),
        None => false,
    }
}

/// Same answer as [`can_evaluate`], with the reason attached
pub fn evaluate(
    policy: Option<&Policy>,
    action: &str,
    resource: &str,
    context: &ResourceContext,
) -> Decision {
    let Some(policy) = policy else {
        return Decision::deny(DecisionReason::NoPolicy);
    };

    let mut candidates = 0;
    for permission in policy.permissions.iter().filter(|p| is_candidate(p, action, resource)) {
        candidates += 1;
        if applies(policy, permission, context) {
            return Decision::allow(permission);
        }
    }

    if candidates == 0 {
        Decision::deny(DecisionReason::NoCandidates)
    } else {
        Decision::deny(DecisionReason::NotApplicable { candidates })
    }
}

fn is_candidate(permission: &Permission, action: &str, resource: &str) -> bool {
    permission.is_well_formed()
        && permission.resource == resource
        && (permission.action == action || permission.action == MANAGE)
}

fn applies(policy: &Policy, permission: &Permission, context: &ResourceContext) -> bool {
    let in_scope = match &permission.scope {
        None | Some(PermissionScope::All) => true,
        Some(PermissionScope::Own) => context.owner_id() == Some(policy.principal.id.as_str()),
        Some(PermissionScope::Unsupported(_)) => false,
    };

    in_scope && permission.conditions().iter().all(|c| c.matches(context))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Condition, ConditionOp};
    use crate::types::Principal;

    fn policy(permissions: Vec<Permission>) -> Policy {
        Policy {
            principal: Principal::new("u1", "Alice").with_org("org_1"),
            permissions,
        }
    }

    #[test]
    fn test_no_policy_denies() {
        let ctx = ResourceContext::new();
        assert!(!can_evaluate(None, "read", "project", &ctx));
        assert_eq!(evaluate(None, "read", "project", &ctx).reason, DecisionReason::NoPolicy);
    }

    #[test]
    fn test_manage_covers_every_action() {
        let policy = policy(vec![Permission::new("p1", "manage", "project")]);
        let ctx = ResourceContext::new();

        for action in ["create", "read", "update", "delete", "archive"] {
            assert!(can_evaluate(Some(&policy), action, "project", &ctx), "{action}");
        }
        assert!(!can_evaluate(Some(&policy), "read", "user", &ctx));
    }

    #[test]
    fn test_own_scope_requires_matching_owner() {
        let policy = policy(vec![
            Permission::new("p4", "update", "project").with_scope(PermissionScope::Own),
        ]);

        let own = ResourceContext::new().with("ownerId", "u1");
        let other = ResourceContext::new().with("ownerId", "u2");
        let unowned = ResourceContext::new();

        assert!(can_evaluate(Some(&policy), "update", "project", &own));
        assert!(!can_evaluate(Some(&policy), "update", "project", &other));
        assert!(!can_evaluate(Some(&policy), "update", "project", &unowned));
    }

    #[test]
    fn test_skipped_candidate_falls_through_to_next() {
        let policy = policy(vec![
            Permission::new("own-only", "update", "project").with_scope(PermissionScope::Own),
            Permission::new("org-wide", "update", "project")
                .with_condition(Condition::equals("orgId", "org_1")),
        ]);
        let ctx = ResourceContext::new().with("ownerId", "u2").with("orgId", "org_1");

        let decision = evaluate(Some(&policy), "update", "project", &ctx);
        assert!(decision.allowed);
        assert_eq!(decision.permission_id.as_deref(), Some("org-wide"));
    }

    #[test]
    fn test_conditions_are_conjunctive() {
        let policy = policy(vec![Permission::new("p", "read", "report")
            .with_condition(Condition::equals("orgId", "org_1"))
            .with_condition(Condition::new("tags", ConditionOp::Includes, "public"))]);

        let both = ResourceContext::new()
            .with("orgId", "org_1")
            .with("tags", serde_json::json!(["public"]));
        let one = ResourceContext::new()
            .with("orgId", "org_1")
            .with("tags", serde_json::json!(["internal"]));

        assert!(can_evaluate(Some(&policy), "read", "report", &both));
        assert!(!can_evaluate(Some(&policy), "read", "report", &one));
        assert_eq!(
            evaluate(Some(&policy), "read", "report", &one).reason,
            DecisionReason::NotApplicable { candidates: 1 }
        );
    }

    #[test]
    fn test_malformed_permissions_never_match() {
        let blank_action = Permission::new("p", "", "project");
        let blank_resource = Permission::new("q", "read", "");
        let policy = policy(vec![blank_action, blank_resource]);
        let ctx = ResourceContext::new();

        assert!(!can_evaluate(Some(&policy), "", "project", &ctx));
        assert!(!can_evaluate(Some(&policy), "read", "", &ctx));
        assert_eq!(evaluate(Some(&policy), "read", "", &ctx).reason, DecisionReason::NoCandidates);
    }

    #[test]
    fn test_unsupported_scope_never_matches() {
        let policy = policy(vec![Permission::new("p", "read", "project")
            .with_scope(PermissionScope::Unsupported("team".to_string()))]);
        assert!(!can_evaluate(Some(&policy), "read", "project", &ResourceContext::new()));
    }

    #[test]
    fn test_decision_serializes_reason() {
        let policy = policy(vec![Permission::new("p1", "read", "project")]);
        let decision = evaluate(Some(&policy), "read", "project", &ResourceContext::new());

        let wire = serde_json::to_value(&decision).unwrap();
        assert_eq!(wire["allowed"], serde_json::json!(true));
        assert_eq!(wire["reason"]["type"], serde_json::json!("PermissionMatch"));
        assert_eq!(wire["permission_id"], serde_json::json!("p1"));
    }
}
