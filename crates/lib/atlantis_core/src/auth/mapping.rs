//! Role mapping: assigns role names to a freshly authenticated user from the
//! configured default roles and admin group / email overrides, then resolves
//! the effective permission list.
//!
//! Roles are never cached on a session: the mapping runs again on every session
//! validation so configuration edits apply on the next request.

use std::sync::Arc;

use super::PermissionChecker;
use super::permissions::ROLE_ADMIN;
use crate::config::{AuthConfig, ProviderConfig};
use crate::models::auth::User;

/// Default-role and admin-escalation rules plus the checker used to resolve
/// permissions.
#[derive(Debug, Clone)]
pub struct RoleMapper {
    pub default_roles: Vec<String>,
    pub admin_groups: Vec<String>,
    pub admin_emails: Vec<String>,
    checker: Arc<PermissionChecker>,
}

impl RoleMapper {
    pub fn new(
        default_roles: Vec<String>,
        admin_groups: Vec<String>,
        admin_emails: Vec<String>,
        checker: Arc<PermissionChecker>,
    ) -> Self {
        Self {
            default_roles,
            admin_groups,
            admin_emails,
            checker,
        }
    }

    pub fn from_config(config: &AuthConfig, checker: Arc<PermissionChecker>) -> Self {
        Self::new(
            config.default_roles.clone(),
            config.admin_groups.clone(),
            config.admin_emails.clone(),
            checker,
        )
    }

    /// Mapper for users coming from one provider: its default roles replace the
    /// global ones when set, and its allowed groups / emails extend the admin
    /// lists.
    pub fn for_provider(&self, provider: &ProviderConfig) -> Self {
        let default_roles = if provider.default_roles.is_empty() {
            self.default_roles.clone()
        } else {
            provider.default_roles.clone()
        };
        let mut admin_groups = self.admin_groups.clone();
        admin_groups.extend(provider.allowed_groups.iter().cloned());
        let mut admin_emails = self.admin_emails.clone();
        admin_emails.extend(provider.allowed_emails.iter().cloned());

        Self::new(default_roles, admin_groups, admin_emails, Arc::clone(&self.checker))
    }

    pub fn checker(&self) -> &Arc<PermissionChecker> {
        &self.checker
    }

    /// Replace `user.roles` with the mapped role list and `user.permissions`
    /// with the effective permission set.
    ///
    /// Each matching group appends `"admin"` once; the list is not deduplicated.
    pub fn apply(&self, user: &mut User) {
        let mut roles = self.default_roles.clone();

        for group in &user.groups {
            if self.admin_groups.iter().any(|g| g == group) {
                roles.push(ROLE_ADMIN.to_string());
            }
        }

        if !user.email.is_empty()
            && self
                .admin_emails
                .iter()
                .any(|e| e.eq_ignore_ascii_case(&user.email))
        {
            roles.push(ROLE_ADMIN.to_string());
        }

        user.roles = roles;
        user.permissions = self
            .checker
            .user_permissions(Some(&*user))
            .into_iter()
            .collect();
    }
}
