//! # Rolegate Authorization Engine
//!
//! Role-based access control with attribute conditions.
//!
//! ## Features
//!
//! - **Policy assembly** merging role permissions and ad-hoc grants, deduplicated by id
//! - **Pure evaluation**: default deny, first match allows, `manage` as super-action
//! - **Scopes** (`all` / `own`) and conjunctive attribute **conditions**
//! - **Coalesced rebuilds** with generation ordering, so a stale rebuild never overwrites a newer policy
//! - **Pluggable collaborators** (directory, role catalog, grant store) with an in-memory implementation
//!
//! ## Example
//!
//! ```rust
//! use rolegate_authz::{Fixture, MemoryStore, PolicyService, ResourceContext, ServiceConfig};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::from_fixture(Fixture::demo()));
//!     let service = PolicyService::from_store(ServiceConfig::default(), store);
//!
//!     service.refresh().await?;
//!
//!     let ctx = ResourceContext::new().with("ownerId", "u_1");
//!     if service.can("delete", "project", &ctx) {
//!         println!("Access granted!");
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod assembler;
pub mod condition;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod service;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use assembler::PolicyAssembler;
pub use condition::{Condition, ConditionOp, ConditionValue, Scalar};
pub use config::{ServiceConfig, UnresolvedRolePolicy};
pub use error::{AuthzError, DirectoryError, GrantStoreError, Result, RoleCatalogError};
pub use evaluator::{can_evaluate, evaluate, Decision, DecisionReason};
pub use service::PolicyService;
pub use store::{Fixture, GrantStore, MemoryStore, PrincipalDirectory, RoleCatalog};
pub use types::{
    Permission, PermissionId, PermissionScope, Policy, Principal, PrincipalId, ResourceContext, Role,
    RoleId, RoleRef, MANAGE,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
