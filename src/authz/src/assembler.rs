//! Policy assembly: role permissions + ad-hoc grants → one effective policy
//!
//! Role permissions come first, in role-reference order, followed by grants
//! in the order supplied. Entries sharing an id collapse into one: the value
//! written last wins, and the entry keeps the position where its id first
//! appeared. Assembly does no I/O and gives the same policy for the same
//! inputs.
//!
//! # Example
//!
//! ```rust
//! use rolegate_authz::assembler::{index_roles, PolicyAssembler};
//! use rolegate_authz::types::{Permission, Principal, Role};
//!
//! let roles = index_roles(vec![
//!     Role::new("r_pm", "Project manager")
//!         .with_permission(Permission::new("p3", "create", "project")),
//! ]);
//! let principal = Principal::new("u_1", "Alice").with_role("r_pm", "Project manager");
//! let grants = vec![Permission::new("g1", "delete", "project")];
//!
//! let policy = PolicyAssembler::assemble(principal, &roles, grants);
//! assert_eq!(policy.len(), 2);
//! ```

use crate::error::{AuthzError, Result};
use crate::types::{Permission, PermissionId, Policy, Principal, Role, RoleId, RoleRef};
use indexmap::IndexMap;
use std::collections::HashMap;

/// Index a catalog listing by role id; a later duplicate replaces an earlier one
pub fn index_roles(roles: Vec<Role>) -> HashMap<RoleId, Role> {
    roles.into_iter().map(|role| (role.id.clone(), role)).collect()
}

/// Builds [`Policy`] snapshots
pub struct PolicyAssembler;

impl PolicyAssembler {
    /// Merge a principal's role permissions and grants into a policy
    ///
    /// Role references missing from `role_catalog` are skipped silently; see
    /// [`PolicyAssembler::assemble_strict`] for the rejecting variant.
    pub fn assemble(
        principal: Principal,
        role_catalog: &HashMap<RoleId, Role>,
        grants: Vec<Permission>,
    ) -> Policy {
        let role_permissions = principal
            .roles
            .iter()
            .filter_map(|role_ref| role_catalog.get(&role_ref.id))
            .flat_map(|role| role.permissions.iter().cloned());

        let mut merged: IndexMap<PermissionId, Permission> = IndexMap::new();
        for permission in role_permissions.chain(grants) {
            merged.insert(permission.id.clone(), permission);
        }

        Policy {
            principal,
            permissions: merged.into_values().collect(),
        }
    }

    /// Like [`PolicyAssembler::assemble`], but unresolved role references are an error
    pub fn assemble_strict(
        principal: Principal,
        role_catalog: &HashMap<RoleId, Role>,
        grants: Vec<Permission>,
    ) -> Result<Policy> {
        let missing: Vec<String> = Self::unresolved_roles(&principal, role_catalog)
            .into_iter()
            .map(|role_ref| role_ref.id.clone())
            .collect();

        if !missing.is_empty() {
            return Err(AuthzError::UnresolvedRoles(missing));
        }

        Ok(Self::assemble(principal, role_catalog, grants))
    }

    /// Role references on `principal` that the catalog cannot resolve
    pub fn unresolved_roles<'a>(
        principal: &'a Principal,
        role_catalog: &HashMap<RoleId, Role>,
    ) -> Vec<&'a RoleRef> {
        principal
            .roles
            .iter()
            .filter(|role_ref| !role_catalog.contains_key(&role_ref.id))
            .collect()
    }
}
