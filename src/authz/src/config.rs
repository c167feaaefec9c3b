//! Policy service configuration loading

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Environment variable overriding [`ServiceConfig::unresolved_roles`]
pub const ENV_UNRESOLVED_ROLES: &str = "ROLEGATE_UNRESOLVED_ROLES";

/// Environment variable overriding [`ServiceConfig::fetch_timeout_ms`]
pub const ENV_FETCH_TIMEOUT_MS: &str = "ROLEGATE_FETCH_TIMEOUT_MS";

/// What assembly does with a role reference the catalog cannot resolve
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedRolePolicy {
    /// Drop the reference and keep assembling
    #[default]
    Skip,
    /// Fail the rebuild; the cached policy stays as it was
    Reject,
}

impl FromStr for UnresolvedRolePolicy {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "reject" => Ok(Self::Reject),
            other => Err(AuthzError::Config(format!(
                "unresolved_roles must be 'skip' or 'reject', got '{}'",
                other
            ))),
        }
    }
}

/// Policy service configuration
///
/// ```toml
/// unresolved_roles = "reject"
/// fetch_timeout_ms = 2000
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub unresolved_roles: UnresolvedRolePolicy,

    /// Upper bound on one rebuild's collaborator calls; unset leaves timeouts to the collaborators
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fetch_timeout_ms: Option<u64>,
}

impl ServiceConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AuthzError::Config(format!("failed to read {}: {}", path.display(), e)))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| AuthzError::Config(format!("invalid config: {}", e)))
    }

    /// Apply `ROLEGATE_*` environment overrides
    pub fn apply_env(self) -> Result<Self> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(raw) = lookup(ENV_UNRESOLVED_ROLES) {
            self.unresolved_roles = raw.parse()?;
        }

        if let Some(raw) = lookup(ENV_FETCH_TIMEOUT_MS) {
            let ms = raw.trim().parse::<u64>().map_err(|e| {
                AuthzError::Config(format!("{} must be milliseconds: {}", ENV_FETCH_TIMEOUT_MS, e))
            })?;
            self.fetch_timeout_ms = (ms > 0).then_some(ms);
        }

        Ok(self)
    }

    /// Effective rebuild timeout; `0` from either source disables it
    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout_ms.filter(|&ms| ms > 0).map(Duration::from_millis)
    }
}
