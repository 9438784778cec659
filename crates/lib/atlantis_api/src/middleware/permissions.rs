//! Route-level permission gates. They run after [`require_auth`] and read the
//! injected user; a missing user is `401`, a denied one `403`.
//!
//! ```ignore
//! router.route_layer(from_fn_with_state(
//!     (checker, PermissionGate::plan_apply()),
//!     permissions::enforce,
//! ))
//! ```
//!
//! [`require_auth`]: super::auth::require_auth

use std::fmt;
use std::sync::Arc;

use atlantis_core::auth::{AuthError, Permission, PermissionChecker};
use atlantis_core::models::auth::User;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use super::auth::user_from_request;
use crate::error::AppError;

/// What a route requires of the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionGate {
    Permission(Permission),
    Any(Vec<Permission>),
    All(Vec<Permission>),
    Admin,
}

impl PermissionGate {
    pub fn permission(permission: Permission) -> Self {
        Self::Permission(permission)
    }

    pub fn any(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self::Any(permissions.into_iter().collect())
    }

    pub fn all(permissions: impl IntoIterator<Item = Permission>) -> Self {
        Self::All(permissions.into_iter().collect())
    }

    pub fn admin() -> Self {
        Self::Admin
    }

    pub fn lock_delete() -> Self {
        Self::Permission(Permission::LockDelete)
    }

    pub fn lock_force() -> Self {
        Self::Permission(Permission::LockForce)
    }

    pub fn plan_apply() -> Self {
        Self::Permission(Permission::PlanApply)
    }

    pub fn plan_delete() -> Self {
        Self::Permission(Permission::PlanDelete)
    }

    pub fn policy_write() -> Self {
        Self::Permission(Permission::PolicyWrite)
    }

    pub fn user_management() -> Self {
        Self::Permission(Permission::UserWrite)
    }

    pub fn allows(&self, checker: &PermissionChecker, user: Option<&User>) -> bool {
        match self {
            Self::Permission(p) => checker.has_permission(user, *p),
            Self::Any(ps) => checker.has_any_permission(user, ps),
            Self::All(ps) => checker.has_all_permissions(user, ps),
            Self::Admin => checker.is_admin(user),
        }
    }

    /// `Ok` when `user` passes; `Unauthenticated` without a user,
    /// `InsufficientPermissions` otherwise.
    pub fn check(&self, checker: &PermissionChecker, user: Option<&User>) -> Result<(), AuthError> {
        let Some(user) = user else {
            return Err(AuthError::Unauthenticated);
        };
        if self.allows(checker, Some(user)) {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions(self.to_string()))
        }
    }
}

impl fmt::Display for PermissionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Permission(p) => f.write_str(p.as_str()),
            Self::Any(ps) => write!(f, "any of [{}]", join_tags(ps)),
            Self::All(ps) => write!(f, "all of [{}]", join_tags(ps)),
            Self::Admin => f.write_str("admin"),
        }
    }
}

fn join_tags(permissions: &[Permission]) -> String {
    permissions
        .iter()
        .map(|p| p.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Axum middleware enforcing `gate` with `checker`.
pub async fn enforce(
    State((checker, gate)): State<(Arc<PermissionChecker>, PermissionGate)>,
    request: Request,
    next: Next,
) -> Response {
    let user = user_from_request(&request);
    match gate.check(&checker, user) {
        Ok(()) => next.run(request).await,
        Err(e) => {
            debug!(
                path = %request.uri().path(),
                user_id = user.map(|u| u.id.as_str()).unwrap_or(""),
                %gate,
                "permission gate denied request"
            );
            AppError::from(e).into_response()
        }
    }
}
