//! Authentication and authorization logic.
//!
//! Permission model, permission checking, role mapping, identity providers and
//! server-side session storage. The HTTP layer in `atlantis_api` builds on
//! these pieces.

pub mod checker;
pub mod mapping;
pub mod permissions;
pub mod providers;
pub mod session;
pub mod state;

use thiserror::Error;

pub use checker::PermissionChecker;
pub use mapping::RoleMapper;
pub use permissions::{Permission, Role};
pub use session::SessionStore;

/// Authentication and authorization errors.
#[derive(Debug, Error)]
pub enum AuthError {
    // Configuration: fatal at startup.
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Cannot resolve {0} endpoint")]
    MissingEndpoint(String),

    #[error("Invalid provider type: {0}")]
    InvalidProviderType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Authentication: normal traffic.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Session expired")]
    SessionExpired,

    #[error("Not authenticated")]
    Unauthenticated,

    #[error("Invalid token: {0}")]
    InvalidToken(String),

    #[error("Invalid or expired login state")]
    InvalidState,

    // Authorization.
    #[error("Insufficient permissions: {0}")]
    InsufficientPermissions(String),

    // Role table.
    #[error("Invalid permission: {0}")]
    InvalidPermission(String),

    #[error("Role name cannot be empty")]
    EmptyRoleName,

    #[error("Cannot remove default role: {0}")]
    CannotRemoveDefaultRole(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    // Capabilities and lookup.
    #[error("{operation} is not supported by provider {provider}")]
    Unsupported {
        provider: String,
        operation: &'static str,
    },

    #[error("Provider not found: {0}")]
    ProviderNotFound(String),

    #[error("No authentication providers available")]
    NoProvidersAvailable,

    // Upstream identity provider.
    #[error("Code exchange failed: {0}")]
    ExchangeFailed(String),

    #[error("User info request failed: {0}")]
    UserInfoFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Expected failures caused by the caller's credentials rather than a defect.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            AuthError::InvalidCredentials
                | AuthError::SessionNotFound
                | AuthError::SessionExpired
                | AuthError::Unauthenticated
                | AuthError::InvalidToken(_)
                | AuthError::InvalidState
        )
    }

    pub(crate) fn unsupported(provider: &str, operation: &'static str) -> Self {
        AuthError::Unsupported {
            provider: provider.to_string(),
            operation,
        }
    }
}
