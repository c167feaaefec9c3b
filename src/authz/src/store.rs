//! Collaborator contracts and an in-memory implementation
//!
//! The policy service reaches principals, roles and grants only through the
//! traits below. Transport and persistence belong to the host application.

use crate::condition::Condition;
use crate::error::{AuthzError, DirectoryError, GrantStoreError, Result, RoleCatalogError};
use crate::types::{Permission, PermissionScope, Principal, PrincipalId, Role, RoleId, RoleRef};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::sync::RwLock;
use tracing::debug;

/// Supplies the active principal's identity and role references
#[async_trait]
pub trait PrincipalDirectory: Send + Sync {
    async fn fetch_principal(&self) -> std::result::Result<Principal, DirectoryError>;
}

/// Role definitions and role assignment
#[async_trait]
pub trait RoleCatalog: Send + Sync {
    /// List every role definition
    async fn fetch_roles(&self) -> std::result::Result<Vec<Role>, RoleCatalogError>;

    /// Persist a principal's role assignment, replacing the previous one
    async fn assign_roles(
        &self,
        principal_id: &str,
        role_ids: &[RoleId],
    ) -> std::result::Result<(), RoleCatalogError>;
}

/// Ad-hoc permissions attached directly to a principal
#[async_trait]
pub trait GrantStore: Send + Sync {
    async fn fetch_grants(&self, principal_id: &str) -> std::result::Result<Vec<Permission>, GrantStoreError>;

    /// Insert a grant, or replace the one with the same id
    async fn upsert_grant(
        &self,
        principal_id: &str,
        grant: Permission,
    ) -> std::result::Result<(), GrantStoreError>;
}

/// Serializable snapshot of a principal, the role catalog and the principal's grants
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fixture {
    pub principal: Principal,

    #[serde(default)]
    pub roles: Vec<Role>,

    #[serde(default)]
    pub grants: Vec<Permission>,
}

impl Fixture {
    /// Load a fixture from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuthzError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| AuthzError::InvalidInput(format!("invalid fixture: {}", e)))
    }

    /// Project-management sample: an admin, a project manager role and one personal grant
    pub fn demo() -> Self {
        Self {
            principal: Principal::new("u_1", "Alice")
                .with_org("org_1")
                .with_role("r_admin", "Administrator"),
            roles: vec![
                Role::new("r_admin", "Administrator")
                    .with_permission(Permission::new("p1", "manage", "project").with_scope(PermissionScope::All))
                    .with_permission(Permission::new("p2", "manage", "user").with_scope(PermissionScope::All)),
                Role::new("r_pm", "Project manager")
                    .with_permission(Permission::new("p3", "create", "project"))
                    .with_permission(Permission::new("p4", "update", "project").with_scope(PermissionScope::Own))
                    .with_permission(
                        Permission::new("p5", "read", "report").with_condition(Condition::equals("orgId", "org_1")),
                    ),
            ],
            grants: vec![Permission::new("g1", "delete", "project").with_scope(PermissionScope::Own)],
        }
    }
}

/// In-process directory, role catalog and grant store
pub struct MemoryStore {
    principal: RwLock<Principal>,
    roles: RwLock<Vec<Role>>,
    grants: DashMap<PrincipalId, Vec<Permission>>,
}

impl MemoryStore {
    pub fn new(principal: Principal, roles: Vec<Role>) -> Self {
        Self {
            principal: RwLock::new(principal),
            roles: RwLock::new(roles),
            grants: DashMap::new(),
        }
    }

    pub fn from_fixture(fixture: Fixture) -> Self {
        let grants = DashMap::new();
        if !fixture.grants.is_empty() {
            grants.insert(fixture.principal.id.clone(), fixture.grants);
        }

        Self {
            principal: RwLock::new(fixture.principal),
            roles: RwLock::new(fixture.roles),
            grants,
        }
    }

    /// Replace a role definition (or add it)
    pub async fn put_role(&self, role: Role) {
        let mut roles = self.roles.write().await;
        match roles.iter().position(|r| r.id == role.id) {
            Some(index) => roles[index] = role,
            None => roles.push(role),
        }
    }

    /// Current state as a fixture
    pub async fn snapshot(&self) -> Fixture {
        let principal = self.principal.read().await.clone();
        let grants = self
            .grants
            .get(&principal.id)
            .map(|g| g.value().clone())
            .unwrap_or_default();

        Fixture {
            principal,
            roles: self.roles.read().await.clone(),
            grants,
        }
    }
}

#[async_trait]
impl PrincipalDirectory for MemoryStore {
    async fn fetch_principal(&self) -> std::result::Result<Principal, DirectoryError> {
        Ok(self.principal.read().await.clone())
    }
}

#[async_trait]
impl RoleCatalog for MemoryStore {
    async fn fetch_roles(&self) -> std::result::Result<Vec<Role>, RoleCatalogError> {
        Ok(self.roles.read().await.clone())
    }

    async fn assign_roles(
        &self,
        principal_id: &str,
        role_ids: &[RoleId],
    ) -> std::result::Result<(), RoleCatalogError> {
        let roles = self.roles.read().await;
        let mut principal = self.principal.write().await;
        if principal.id != principal_id {
            return Err(RoleCatalogError::PrincipalNotFound(principal_id.to_string()));
        }

        principal.roles = role_ids
            .iter()
            .map(|id| {
                let name = roles
                    .iter()
                    .find(|r| &r.id == id)
                    .map_or_else(|| id.clone(), |r| r.name.clone());
                RoleRef::new(id.clone(), name)
            })
            .collect();

        debug!(principal = principal_id, roles = ?role_ids, "role assignment stored");
        Ok(())
    }
}

#[async_trait]
impl GrantStore for MemoryStore {
    async fn fetch_grants(&self, principal_id: &str) -> std::result::Result<Vec<Permission>, GrantStoreError> {
        Ok(self
            .grants
            .get(principal_id)
            .map(|g| g.value().clone())
            .unwrap_or_default())
    }

    async fn upsert_grant(
        &self,
        principal_id: &str,
        grant: Permission,
    ) -> std::result::Result<(), GrantStoreError> {
        if grant.id.is_empty() {
            return Err(GrantStoreError::Rejected("grant id must not be empty".to_string()));
        }

        debug!(principal = principal_id, grant = %grant.id, "grant stored");
        let mut grants = self.grants.entry(principal_id.to_string()).or_default();
        match grants.iter().position(|g| g.id == grant.id) {
            Some(index) => grants[index] = grant,
            None => grants.push(grant),
        }
        Ok(())
    }
}
