//! Permission vocabulary and the built-in role table.
//!
//! Permissions are `category:action` tags drawn from a closed set. Roles bundle
//! permissions under a name; four default roles always exist and form a strict
//! hierarchy: `user ⊂ developer ⊂ admin ⊂ superadmin`.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AuthError;

/// Atomic capability tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "repo:read")]
    RepoRead,
    #[serde(rename = "repo:write")]
    RepoWrite,
    #[serde(rename = "plan:read")]
    PlanRead,
    #[serde(rename = "plan:create")]
    PlanCreate,
    #[serde(rename = "plan:apply")]
    PlanApply,
    #[serde(rename = "plan:delete")]
    PlanDelete,
    #[serde(rename = "lock:read")]
    LockRead,
    #[serde(rename = "lock:create")]
    LockCreate,
    #[serde(rename = "lock:delete")]
    LockDelete,
    #[serde(rename = "lock:force")]
    LockForce,
    #[serde(rename = "policy:read")]
    PolicyRead,
    #[serde(rename = "policy:write")]
    PolicyWrite,
    #[serde(rename = "policy:override")]
    PolicyOverride,
    #[serde(rename = "user:read")]
    UserRead,
    #[serde(rename = "user:write")]
    UserWrite,
    #[serde(rename = "user:delete")]
    UserDelete,
    #[serde(rename = "admin:read")]
    AdminRead,
    #[serde(rename = "admin:write")]
    AdminWrite,
    #[serde(rename = "admin:delete")]
    AdminDelete,
}

impl Permission {
    /// Every permission, in declaration order.
    pub const ALL: [Permission; 19] = [
        Permission::RepoRead,
        Permission::RepoWrite,
        Permission::PlanRead,
        Permission::PlanCreate,
        Permission::PlanApply,
        Permission::PlanDelete,
        Permission::LockRead,
        Permission::LockCreate,
        Permission::LockDelete,
        Permission::LockForce,
        Permission::PolicyRead,
        Permission::PolicyWrite,
        Permission::PolicyOverride,
        Permission::UserRead,
        Permission::UserWrite,
        Permission::UserDelete,
        Permission::AdminRead,
        Permission::AdminWrite,
        Permission::AdminDelete,
    ];

    /// Wire form, e.g. `"lock:force"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Permission::RepoRead => "repo:read",
            Permission::RepoWrite => "repo:write",
            Permission::PlanRead => "plan:read",
            Permission::PlanCreate => "plan:create",
            Permission::PlanApply => "plan:apply",
            Permission::PlanDelete => "plan:delete",
            Permission::LockRead => "lock:read",
            Permission::LockCreate => "lock:create",
            Permission::LockDelete => "lock:delete",
            Permission::LockForce => "lock:force",
            Permission::PolicyRead => "policy:read",
            Permission::PolicyWrite => "policy:write",
            Permission::PolicyOverride => "policy:override",
            Permission::UserRead => "user:read",
            Permission::UserWrite => "user:write",
            Permission::UserDelete => "user:delete",
            Permission::AdminRead => "admin:read",
            Permission::AdminWrite => "admin:write",
            Permission::AdminDelete => "admin:delete",
        }
    }

    /// Parse a permission tag. Only members of the closed set are accepted.
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| AuthError::InvalidPermission(s.to_string()))
    }

    /// The part before the first `:`.
    pub fn category(self) -> &'static str {
        permission_category(self.as_str())
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Category of a raw permission tag, or `"unknown"` when it has no `:`.
pub fn permission_category(tag: &str) -> &str {
    match tag.split_once(':') {
        Some((category, _)) => category,
        None => "unknown",
    }
}

/// Named bundle of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
    #[serde(default)]
    pub description: String,
}

impl Role {
    pub fn new(
        name: impl Into<String>,
        permissions: impl IntoIterator<Item = Permission>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            permissions: permissions.into_iter().collect(),
            description: description.into(),
        }
    }

    pub fn has(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission)
    }
}

pub const ROLE_USER: &str = "user";
pub const ROLE_DEVELOPER: &str = "developer";
pub const ROLE_ADMIN: &str = "admin";
pub const ROLE_SUPERADMIN: &str = "superadmin";

/// Reserved role names; these can never be removed from a role table.
pub const DEFAULT_ROLE_NAMES: [&str; 4] = [ROLE_USER, ROLE_DEVELOPER, ROLE_ADMIN, ROLE_SUPERADMIN];

pub fn is_default_role(name: &str) -> bool {
    DEFAULT_ROLE_NAMES.contains(&name)
}

const USER_PERMISSIONS: &[Permission] = &[
    Permission::RepoRead,
    Permission::PlanRead,
    Permission::LockRead,
    Permission::PolicyRead,
];

const DEVELOPER_EXTRA: &[Permission] = &[
    Permission::RepoWrite,
    Permission::PlanCreate,
    Permission::PlanApply,
    Permission::LockCreate,
    Permission::LockDelete,
];

const ADMIN_EXTRA: &[Permission] = &[
    Permission::PlanDelete,
    Permission::LockForce,
    Permission::PolicyWrite,
    Permission::UserRead,
    Permission::UserWrite,
    Permission::AdminRead,
    Permission::AdminWrite,
];

/// The built-in role table.
pub fn default_roles() -> HashMap<String, Role> {
    let user: Vec<Permission> = USER_PERMISSIONS.to_vec();
    let developer: Vec<Permission> = user.iter().chain(DEVELOPER_EXTRA).copied().collect();
    let admin: Vec<Permission> = developer.iter().chain(ADMIN_EXTRA).copied().collect();

    [
        Role::new(ROLE_USER, user, "Read-only access to repositories, plans and locks"),
        Role::new(
            ROLE_DEVELOPER,
            developer,
            "Can create and apply plans and manage their own locks",
        ),
        Role::new(
            ROLE_ADMIN,
            admin,
            "Can force-unlock, delete plans, edit policies and manage users",
        ),
        Role::new(ROLE_SUPERADMIN, Permission::ALL, "Unrestricted access"),
    ]
    .into_iter()
    .map(|role| (role.name.clone(), role))
    .collect()
}
