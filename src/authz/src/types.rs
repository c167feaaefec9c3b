//! Core authorization types

use crate::condition::Condition;
use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Unique principal identifier
pub type PrincipalId = String;

/// Unique role identifier
pub type RoleId = String;

/// Unique permission identifier (the dedup key within a policy)
pub type PermissionId = String;

/// Super-action: a permission with this action grants every action on its resource
pub const MANAGE: &str = "manage";

/// Context key holding the owner of the resource being accessed
pub const OWNER_ID_FIELD: &str = "ownerId";

/// Lightweight role reference carried by a principal
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: RoleId,
    #[serde(default)]
    pub name: String,
}

impl RoleRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Principal (user) an authorization decision is made for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    /// Principal identifier (e.g., "u_1")
    pub id: PrincipalId,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Opaque organization the principal belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org_id: Option<String>,

    /// Assigned roles, in assignment order
    #[serde(default, alias = "roleRefs")]
    pub roles: Vec<RoleRef>,
}

impl Principal {
    /// Create a principal with no roles
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            org_id: None,
            roles: Vec::new(),
        }
    }

    /// Set the organization
    pub fn with_org(mut self, org_id: impl Into<String>) -> Self {
        self.org_id = Some(org_id.into());
        self
    }

    /// Append a role reference
    pub fn with_role(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.roles.push(RoleRef::new(id, name));
        self
    }
}

/// Restricts a permission to every instance of a resource or only owned ones
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PermissionScope {
    /// No ownership restriction
    All,
    /// Only resources whose `ownerId` is the principal
    Own,
    /// Unrecognized scope, kept verbatim; never matches
    Unsupported(String),
}

impl From<String> for PermissionScope {
    fn from(value: String) -> Self {
        match value.as_str() {
            "all" => Self::All,
            "own" => Self::Own,
            _ => Self::Unsupported(value),
        }
    }
}

impl From<PermissionScope> for String {
    fn from(scope: PermissionScope) -> Self {
        match scope {
            PermissionScope::All => "all".to_string(),
            PermissionScope::Own => "own".to_string(),
            PermissionScope::Unsupported(raw) => raw,
        }
    }
}

/// A single permission: action on resource, optionally narrowed by scope and conditions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Permission {
    /// Unique identifier, later sources override earlier ones with the same id
    pub id: PermissionId,

    /// Allowed action (e.g., "read", "manage")
    #[serde(default)]
    pub action: String,

    /// Resource type (e.g., "project")
    #[serde(default)]
    pub resource: String,

    /// Ownership scope, absent means `all`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<PermissionScope>,

    /// Conjunctive attribute conditions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Vec<Condition>>,
}

impl Permission {
    /// Create an unscoped, unconditional permission
    pub fn new(
        id: impl Into<String>,
        action: impl Into<String>,
        resource: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            action: action.into(),
            resource: resource.into(),
            scope: None,
            conditions: None,
        }
    }

    /// Set the scope
    pub fn with_scope(mut self, scope: PermissionScope) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Append a condition
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.get_or_insert_with(Vec::new).push(condition);
        self
    }

    /// Conditions as a slice (empty when absent)
    pub fn conditions(&self) -> &[Condition] {
        self.conditions.as_deref().unwrap_or(&[])
    }

    /// A permission missing its action or resource can never match
    pub fn is_well_formed(&self) -> bool {
        !self.action.is_empty() && !self.resource.is_empty()
    }
}

/// Role definition from the role catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub id: RoleId,

    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl Role {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            permissions: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_permission(mut self, permission: Permission) -> Self {
        self.permissions.push(permission);
        self
    }
}

/// Flattened, deduplicated effective permission set for one principal
///
/// Built by [`crate::assembler::PolicyAssembler`]; permission order is the
/// evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(alias = "user")]
    pub principal: Principal,

    pub permissions: Vec<Permission>,
}

impl Policy {
    /// Look up a permission by id
    pub fn get(&self, id: &str) -> Option<&Permission> {
        self.permissions.iter().find(|p| p.id == id)
    }

    /// Permissions on a resource, in evaluation order
    pub fn permissions_for<'a>(&'a self, resource: &'a str) -> impl Iterator<Item = &'a Permission> {
        self.permissions.iter().filter(move |p| p.resource == resource)
    }

    pub fn len(&self) -> usize {
        self.permissions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.permissions.is_empty()
    }
}

/// Attributes of the resource instance being accessed (ownerId, orgId, members...)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceContext(HashMap<String, Value>);

impl ResourceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(field.into(), value.into());
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The `ownerId` field, if present and a string
    pub fn owner_id(&self) -> Option<&str> {
        self.0.get(OWNER_ID_FIELD).and_then(Value::as_str)
    }

    /// Build a context from a JSON object
    pub fn from_json(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self(map.into_iter().collect())),
            Value::Null => Ok(Self::default()),
            other => Err(AuthzError::InvalidInput(format!(
                "resource context must be a JSON object, got {}",
                other
            ))),
        }
    }
}

impl From<HashMap<String, Value>> for ResourceContext {
    fn from(fields: HashMap<String, Value>) -> Self {
        Self(fields)
    }
}

impl FromIterator<(String, Value)> for ResourceContext {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
