//! Error types for policy assembly and the policy service

use std::time::Duration;
use thiserror::Error;

/// Principal directory failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// The active principal could not be found
    #[error("principal not found: {0}")]
    NotFound(String),

    /// The directory could not be reached or timed out
    #[error("directory unavailable: {0}")]
    Unavailable(String),
}

/// Role catalog failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoleCatalogError {
    /// The principal a role assignment targets does not exist
    #[error("principal not found: {0}")]
    PrincipalNotFound(String),

    /// The catalog refused the assignment
    #[error("role assignment rejected: {0}")]
    Rejected(String),

    /// The catalog could not be reached or timed out
    #[error("role catalog unavailable: {0}")]
    Unavailable(String),
}

/// Grant store failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GrantStoreError {
    /// The store refused the grant
    #[error("grant rejected: {0}")]
    Rejected(String),

    /// The store could not be reached or timed out
    #[error("grant store unavailable: {0}")]
    Unavailable(String),
}

/// Authorization errors
///
/// Every variant is `Clone`: a single rebuild's failure is delivered to each
/// caller that joined it.
#[derive(Debug, Clone, Error)]
pub enum AuthzError {
    /// Principal directory error
    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    /// Role catalog error
    #[error("role catalog error: {0}")]
    RoleCatalog(#[from] RoleCatalogError),

    /// Grant store error
    #[error("grant store error: {0}")]
    GrantStore(#[from] GrantStoreError),

    /// Role references that are missing from the catalog (strict assembly only)
    #[error("unresolved role references: {}", .0.join(", "))]
    UnresolvedRoles(Vec<String>),

    /// Rebuild exceeded the configured fetch timeout
    #[error("policy rebuild timed out after {0:?}")]
    Timeout(Duration),

    /// The rebuild task ended without producing a result (it panicked)
    #[error("policy rebuild aborted: {0}")]
    RebuildAborted(String),

    /// Invalid input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_errors_convert() {
        let err: AuthzError = DirectoryError::NotFound("u1".to_string()).into();
        assert!(matches!(err, AuthzError::Directory(DirectoryError::NotFound(_))));
        assert_eq!(err.to_string(), "directory error: principal not found: u1");

        let err: AuthzError = GrantStoreError::Unavailable("timeout".to_string()).into();
        assert!(matches!(err, AuthzError::GrantStore(_)));
    }

    #[test]
    fn test_unresolved_roles_message() {
        let err = AuthzError::UnresolvedRoles(vec!["r_guest".to_string(), "r_ops".to_string()]);
        assert_eq!(err.to_string(), "unresolved role references: r_guest, r_ops");
    }
}
