//! Permission checker: resolves a user's effective permissions from direct
//! grants plus the roles named on the user.
//!
//! Role names are looked up in the live table on every query, so `add_role` /
//! `remove_role` take effect immediately for every identity.

use std::collections::{BTreeSet, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

use tracing::info;

use super::AuthError;
use super::permissions::{Permission, Role, default_roles, is_default_role};
use crate::models::auth::User;

/// Role table plus authorization queries over it.
#[derive(Debug)]
pub struct PermissionChecker {
    roles: RwLock<HashMap<String, Role>>,
}

impl PermissionChecker {
    /// Default roles with `custom_roles` merged over them. Construction-time
    /// entries may shadow a default role of the same name.
    pub fn new(custom_roles: impl IntoIterator<Item = Role>) -> Self {
        let mut roles = default_roles();
        for role in custom_roles {
            roles.insert(role.name.clone(), role);
        }
        Self {
            roles: RwLock::new(roles),
        }
    }

    fn table(&self) -> RwLockReadGuard<'_, HashMap<String, Role>> {
        self.roles.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Direct grant or any role-derived grant. `None` has no permissions.
    pub fn has_permission(&self, user: Option<&User>, permission: Permission) -> bool {
        let Some(user) = user else {
            return false;
        };
        if user.permissions.contains(&permission) {
            return true;
        }
        let table = self.table();
        user.roles
            .iter()
            .filter_map(|name| table.get(name))
            .any(|role| role.has(permission))
    }

    /// False for an empty list.
    pub fn has_any_permission(&self, user: Option<&User>, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.has_permission(user, *p))
    }

    /// True for an empty list.
    pub fn has_all_permissions(&self, user: Option<&User>, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.has_permission(user, *p))
    }

    /// Union of direct grants and every role-derived grant.
    pub fn user_permissions(&self, user: Option<&User>) -> BTreeSet<Permission> {
        let Some(user) = user else {
            return BTreeSet::new();
        };
        let mut effective: BTreeSet<Permission> = user.permissions.iter().copied().collect();
        let table = self.table();
        for role in user.roles.iter().filter_map(|name| table.get(name)) {
            effective.extend(role.permissions.iter().copied());
        }
        effective
    }

    /// Insert or overwrite a role, defaults included.
    pub fn add_role(&self, role: Role) -> Result<(), AuthError> {
        if role.name.is_empty() {
            return Err(AuthError::EmptyRoleName);
        }
        info!(role = %role.name, permissions = role.permissions.len(), "role added");
        self.roles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(role.name.clone(), role);
        Ok(())
    }

    pub fn remove_role(&self, name: &str) -> Result<(), AuthError> {
        if is_default_role(name) {
            return Err(AuthError::CannotRemoveDefaultRole(name.to_string()));
        }
        let removed = self
            .roles
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name);
        match removed {
            Some(_) => {
                info!(role = %name, "role removed");
                Ok(())
            }
            None => Err(AuthError::RoleNotFound(name.to_string())),
        }
    }

    pub fn role(&self, name: &str) -> Option<Role> {
        self.table().get(name).cloned()
    }

    /// Snapshot of the role table, sorted by name.
    pub fn roles(&self) -> Vec<Role> {
        let mut roles: Vec<Role> = self.table().values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        roles
    }

    // Convenience predicates.

    pub fn is_admin(&self, user: Option<&User>) -> bool {
        self.has_any_permission(
            user,
            &[
                Permission::AdminRead,
                Permission::AdminWrite,
                Permission::AdminDelete,
            ],
        )
    }

    /// Narrow proxy: holding `user:delete` is what makes a super admin.
    pub fn is_super_admin(&self, user: Option<&User>) -> bool {
        self.has_permission(user, Permission::UserDelete)
    }

    pub fn can_apply_plan(&self, user: Option<&User>) -> bool {
        self.has_permission(user, Permission::PlanApply)
    }

    pub fn can_delete_plan(&self, user: Option<&User>) -> bool {
        self.has_permission(user, Permission::PlanDelete)
    }

    pub fn can_delete_lock(&self, user: Option<&User>) -> bool {
        self.has_permission(user, Permission::LockDelete)
    }

    pub fn can_force_unlock(&self, user: Option<&User>) -> bool {
        self.has_permission(user, Permission::LockForce)
    }

    pub fn can_write_policy(&self, user: Option<&User>) -> bool {
        self.has_permission(user, Permission::PolicyWrite)
    }

    pub fn can_manage_users(&self, user: Option<&User>) -> bool {
        self.has_permission(user, Permission::UserWrite)
    }
}

impl Default for PermissionChecker {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
