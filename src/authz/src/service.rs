//! Policy service: owns the cached policy of the active principal
//!
//! # Architecture
//!
//! ```text
//! refresh / assign_roles / upsert_grant
//!        ↓
//!   rebuild_covering(write seq) ──join──→ running rebuild (covers the write)
//!        │                      ──join──→ queued follow-up
//!        ↓ otherwise issue (generation g)
//!   spawned task: [wait for running] → PrincipalDirectory + RoleCatalog
//!                 → GrantStore → PolicyAssembler
//!        ↓
//!   commit if g > committed generation ──→ Arc<Policy> snapshot
//!                                               ↓
//!                                   can / explain (pure, synchronous)
//! ```
//!
//! Reads clone the current `Arc<Policy>` and evaluate without holding any
//! lock. Rebuilds are serialized: at most one is fetching and at most one
//! follow-up waits behind it. A caller joins the running rebuild when it
//! started after every write the caller depends on, joins the queued
//! follow-up otherwise, and only issues a rebuild when neither exists.
//! A follow-up starts fetching once the running rebuild settles, so it sees
//! every write completed before that point.
//!
//! Each rebuild takes a generation when issued and runs as its own tokio
//! task, so it completes (and frees its slot) even when every caller
//! awaiting it has gone away. A rebuild whose generation is not newer than
//! the committed one is discarded.

use crate::assembler::{index_roles, PolicyAssembler};
use crate::config::{ServiceConfig, UnresolvedRolePolicy};
use crate::error::{AuthzError, Result};
use crate::evaluator::{self, Decision};
use crate::store::{GrantStore, PrincipalDirectory, RoleCatalog};
use crate::types::{Permission, Policy, ResourceContext, RoleId};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

type RebuildFuture = Shared<BoxFuture<'static, Result<Arc<Policy>>>>;

struct Rebuild {
    generation: u64,
    future: RebuildFuture,
}

struct Running {
    rebuild: Rebuild,
    /// Write sequence visible when the rebuild started fetching
    writes_seen: u64,
}

#[derive(Default)]
struct RebuildSlots {
    running: Option<Running>,
    /// Starts once `running` settles
    queued: Option<Rebuild>,
}

impl RebuildSlots {
    fn is_empty(&self) -> bool {
        self.running.is_none() && self.queued.is_none()
    }
}

#[derive(Default)]
struct Snapshot {
    generation: u64,
    policy: Option<Arc<Policy>>,
}

struct Inner {
    directory: Arc<dyn PrincipalDirectory>,
    roles: Arc<dyn RoleCatalog>,
    grants: Arc<dyn GrantStore>,
    config: ServiceConfig,
    snapshot: RwLock<Snapshot>,
    slots: Mutex<RebuildSlots>,
    issued: AtomicU64,
    writes: AtomicU64,
}

/// Cached-policy owner for one principal session
///
/// Cheap to clone; clones share the same cache and rebuild state. Commands
/// spawn their rebuild onto the current tokio runtime and must be awaited
/// from within one.
#[derive(Clone)]
pub struct PolicyService {
    inner: Arc<Inner>,
}

impl PolicyService {
    /// Create a service with the default configuration
    pub fn new(
        directory: Arc<dyn PrincipalDirectory>,
        roles: Arc<dyn RoleCatalog>,
        grants: Arc<dyn GrantStore>,
    ) -> Self {
        Self::with_config(ServiceConfig::default(), directory, roles, grants)
    }

    pub fn with_config(
        config: ServiceConfig,
        directory: Arc<dyn PrincipalDirectory>,
        roles: Arc<dyn RoleCatalog>,
        grants: Arc<dyn GrantStore>,
    ) -> Self {
        info!(
            unresolved_roles = ?config.unresolved_roles,
            fetch_timeout = ?config.fetch_timeout(),
            "PolicyService initialized"
        );

        Self {
            inner: Arc::new(Inner {
                directory,
                roles,
                grants,
                config,
                snapshot: RwLock::new(Snapshot::default()),
                slots: Mutex::new(RebuildSlots::default()),
                issued: AtomicU64::new(0),
                writes: AtomicU64::new(0),
            }),
        }
    }

    /// Create a service backed by one store implementing every collaborator
    pub fn from_store<S>(config: ServiceConfig, store: Arc<S>) -> Self
    where
        S: PrincipalDirectory + RoleCatalog + GrantStore + 'static,
    {
        Self::with_config(config, store.clone(), store.clone(), store)
    }

    // Queries

    /// Current policy snapshot, `None` until the first successful rebuild
    pub fn policy(&self) -> Option<Arc<Policy>> {
        self.inner.snapshot.read().policy.clone()
    }

    /// Generation of the committed snapshot (0 before the first commit)
    pub fn generation(&self) -> u64 {
        self.inner.snapshot.read().generation
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.snapshot.read().policy.is_some()
    }

    /// Whether a rebuild is running or queued
    pub fn is_rebuilding(&self) -> bool {
        !self.inner.slots.lock().is_empty()
    }

    /// Evaluate against the current snapshot
    pub fn can(&self, action: &str, resource: &str, context: &ResourceContext) -> bool {
        let policy = self.policy();
        evaluator::can_evaluate(policy.as_deref(), action, resource, context)
    }

    /// Evaluate against the current snapshot, with the deciding permission
    pub fn explain(&self, action: &str, resource: &str, context: &ResourceContext) -> Decision {
        let policy = self.policy();
        evaluator::evaluate(policy.as_deref(), action, resource, context)
    }

    // Commands

    /// Re-fetch everything and replace the cached policy
    ///
    /// Joins a pending rebuild when one already covers every completed
    /// mutation. On failure the cached policy is left untouched.
    pub async fn refresh(&self) -> Result<Arc<Policy>> {
        let needed = self.inner.writes.load(Ordering::SeqCst);
        self.rebuild_covering(needed).await
    }

    /// Persist a role assignment, then rebuild
    pub async fn assign_roles(&self, principal_id: &str, role_ids: &[RoleId]) -> Result<Arc<Policy>> {
        if let Err(err) = self.inner.roles.assign_roles(principal_id, role_ids).await {
            warn!(principal = principal_id, error = %err, "role assignment failed");
            return Err(err.into());
        }

        let needed = self.record_write();
        self.rebuild_covering(needed).await
    }

    /// Persist or update one ad-hoc grant, then rebuild
    pub async fn upsert_grant(&self, principal_id: &str, grant: Permission) -> Result<Arc<Policy>> {
        let grant_id = grant.id.clone();
        if let Err(err) = self.inner.grants.upsert_grant(principal_id, grant).await {
            warn!(principal = principal_id, grant = %grant_id, error = %err, "grant upsert failed");
            return Err(err.into());
        }

        let needed = self.record_write();
        self.rebuild_covering(needed).await
    }

    fn record_write(&self) -> u64 {
        self.inner.writes.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn rebuild_covering(&self, needed: u64) -> Result<Arc<Policy>> {
        let future = {
            let mut slots = self.inner.slots.lock();

            if let Some(running) = slots.running.as_ref().filter(|r| r.writes_seen >= needed) {
                debug!(generation = running.rebuild.generation, "joining running policy rebuild");
                running.rebuild.future.clone()
            } else if let Some(queued) = slots.queued.as_ref() {
                debug!(generation = queued.generation, "joining queued policy rebuild");
                queued.future.clone()
            } else {
                let generation = self.inner.issued.fetch_add(1, Ordering::SeqCst) + 1;
                let previous = slots.running.as_ref().map(|r| r.rebuild.future.clone());
                let queue_behind = previous.is_some();
                let future = Arc::clone(&self.inner).spawn_rebuild(generation, previous);
                let rebuild = Rebuild {
                    generation,
                    future: future.clone(),
                };

                if queue_behind {
                    debug!(generation, "queued policy rebuild behind the running one");
                    slots.queued = Some(rebuild);
                } else {
                    let writes_seen = self.inner.writes.load(Ordering::SeqCst);
                    debug!(generation, writes_seen, "issued policy rebuild");
                    slots.running = Some(Running { rebuild, writes_seen });
                }
                future
            }
        };

        future.await
    }
}

impl Inner {
    /// Run rebuild `generation` as a task, after `previous` settles when given
    fn spawn_rebuild(self: Arc<Self>, generation: u64, previous: Option<RebuildFuture>) -> RebuildFuture {
        let task = tokio::spawn(async move {
            if let Some(previous) = previous {
                // the previous outcome belongs to its own callers
                let _ = previous.await;
                self.promote(generation);
            }
            self.rebuild(generation).await
        });

        async move {
            task.await
                .unwrap_or_else(|err| Err(AuthzError::RebuildAborted(err.to_string())))
        }
        .boxed()
        .shared()
    }

    /// Move the queued rebuild into the running slot as it starts fetching
    fn promote(&self, generation: u64) {
        let mut slots = self.slots.lock();
        match slots.queued.take() {
            Some(rebuild) if rebuild.generation == generation => {
                let writes_seen = self.writes.load(Ordering::SeqCst);
                debug!(generation, writes_seen, "starting queued policy rebuild");
                slots.running = Some(Running { rebuild, writes_seen });
            }
            other => slots.queued = other,
        }
    }

    async fn rebuild(&self, generation: u64) -> Result<Arc<Policy>> {
        let assembled = match self.config.fetch_timeout() {
            Some(limit) => tokio::time::timeout(limit, self.fetch_and_assemble())
                .await
                .unwrap_or(Err(AuthzError::Timeout(limit))),
            None => self.fetch_and_assemble().await,
        };

        let outcome = self.commit(generation, assembled);
        self.release(generation);
        outcome
    }

    async fn fetch_and_assemble(&self) -> Result<Policy> {
        let (principal, roles) = futures::try_join!(
            async { self.directory.fetch_principal().await.map_err(AuthzError::from) },
            async { self.roles.fetch_roles().await.map_err(AuthzError::from) },
        )?;
        let grants = self.grants.fetch_grants(&principal.id).await?;
        let catalog = index_roles(roles);

        let unresolved: Vec<&str> = PolicyAssembler::unresolved_roles(&principal, &catalog)
            .into_iter()
            .map(|role_ref| role_ref.id.as_str())
            .collect();
        if !unresolved.is_empty() {
            warn!(principal = %principal.id, roles = ?unresolved, "role references missing from catalog");
        }

        match self.config.unresolved_roles {
            UnresolvedRolePolicy::Skip => Ok(PolicyAssembler::assemble(principal, &catalog, grants)),
            UnresolvedRolePolicy::Reject => PolicyAssembler::assemble_strict(principal, &catalog, grants),
        }
    }

    fn commit(&self, generation: u64, assembled: Result<Policy>) -> Result<Arc<Policy>> {
        let policy = match assembled {
            Ok(policy) => Arc::new(policy),
            Err(err) => {
                warn!(generation, error = %err, "policy rebuild failed, keeping cached policy");
                return Err(err);
            }
        };

        let mut snapshot = self.snapshot.write();
        if generation > snapshot.generation {
            snapshot.generation = generation;
            snapshot.policy = Some(Arc::clone(&policy));
            info!(
                generation,
                principal = %policy.principal.id,
                permissions = policy.len(),
                "policy committed"
            );
            Ok(policy)
        } else {
            debug!(
                generation,
                committed = snapshot.generation,
                "discarding superseded policy rebuild"
            );
            Ok(snapshot.policy.clone().unwrap_or(policy))
        }
    }

    fn release(&self, generation: u64) {
        let mut slots = self.slots.lock();
        if slots
            .running
            .as_ref()
            .is_some_and(|running| running.rebuild.generation == generation)
        {
            slots.running = None;
        }
    }
}
