//! Shared fixtures: a MemoryStore wrapper that can stall or fail on demand

#![allow(dead_code)]

use async_trait::async_trait;
use rolegate_authz::{
    Condition, DirectoryError, Fixture, GrantStore, GrantStoreError, MemoryStore, Permission,
    PermissionScope, Principal, PrincipalDirectory, Role, RoleCatalog, RoleCatalogError, RoleId,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::oneshot;

/// Principal `u1` holding only the project-manager role
pub fn pm_fixture() -> Fixture {
    Fixture {
        principal: Principal::new("u1", "Bob")
            .with_org("org_1")
            .with_role("r_pm", "Project manager"),
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
        grants: Vec::new(),
    }
}

/// Collaborator wrapper with fetch counting, a one-shot stall and failure switches
pub struct ControlledStore {
    pub inner: MemoryStore,
    pub principal_fetches: AtomicUsize,
    fetching: AtomicUsize,
    max_fetching: AtomicUsize,
    pub fail_roles: AtomicBool,
    pub fail_assign: AtomicBool,
    pub fail_upsert: AtomicBool,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
}

impl ControlledStore {
    pub fn new(fixture: Fixture) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::from_fixture(fixture),
            principal_fetches: AtomicUsize::new(0),
            fetching: AtomicUsize::new(0),
            max_fetching: AtomicUsize::new(0),
            fail_roles: AtomicBool::new(false),
            fail_assign: AtomicBool::new(false),
            fail_upsert: AtomicBool::new(false),
            gate: Mutex::new(None),
        })
    }

    /// Stall the next principal fetch (after it has read the principal) until the sender fires
    pub fn hold_next_fetch(&self) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }

    pub fn fetches(&self) -> usize {
        self.principal_fetches.load(Ordering::SeqCst)
    }

    /// Highest number of principal fetches observed in flight at once
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_fetching.load(Ordering::SeqCst)
    }

    pub async fn wait_for_fetches(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.fetches() < count {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .expect("principal fetch never happened");
    }
}

#[async_trait]
impl PrincipalDirectory for ControlledStore {
    async fn fetch_principal(&self) -> Result<Principal, DirectoryError> {
        let principal = self.inner.fetch_principal().await?;
        self.principal_fetches.fetch_add(1, Ordering::SeqCst);
        let fetching = self.fetching.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_fetching.fetch_max(fetching, Ordering::SeqCst);

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        self.fetching.fetch_sub(1, Ordering::SeqCst);
        Ok(principal)
    }
}

#[async_trait]
impl RoleCatalog for ControlledStore {
    async fn fetch_roles(&self) -> Result<Vec<Role>, RoleCatalogError> {
        if self.fail_roles.load(Ordering::SeqCst) {
            return Err(RoleCatalogError::Unavailable("catalog offline".to_string()));
        }
        self.inner.fetch_roles().await
    }

    async fn assign_roles(&self, principal_id: &str, role_ids: &[RoleId]) -> Result<(), RoleCatalogError> {
        if self.fail_assign.load(Ordering::SeqCst) {
            return Err(RoleCatalogError::Rejected("read-only catalog".to_string()));
        }
        self.inner.assign_roles(principal_id, role_ids).await
    }
}

#[async_trait]
impl GrantStore for ControlledStore {
    async fn fetch_grants(&self, principal_id: &str) -> Result<Vec<Permission>, GrantStoreError> {
        self.inner.fetch_grants(principal_id).await
    }

    async fn upsert_grant(&self, principal_id: &str, grant: Permission) -> Result<(), GrantStoreError> {
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(GrantStoreError::Unavailable("grant store offline".to_string()));
        }
        self.inner.upsert_grant(principal_id, grant).await
    }
}
