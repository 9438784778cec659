//! Authentication configuration: shape, defaults and loading.
//!
//! Loaded once at startup from a JSON file ([`AuthConfig::from_file`]) or from
//! `ATLANTIS_*` environment variables ([`AuthConfig::from_env`]) and held
//! read-only afterwards.

pub mod duration;
pub mod env;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::{AuthError, Role};

/// Default session lifetime: 24 hours.
pub const DEFAULT_SESSION_DURATION: Duration = Duration::from_secs(24 * 60 * 60);

/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "atlantis_session";

/// Configuration loading errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid duration: {0}")]
    InvalidDuration(String),

    #[error("Missing environment variable: {0}")]
    MissingEnv(String),
}

/// Kind of identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ProviderType {
    #[default]
    OAuth2,
    Oidc,
    Basic,
    Saml,
}

impl ProviderType {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderType::OAuth2 => "oauth2",
            ProviderType::Oidc => "oidc",
            ProviderType::Basic => "basic",
            ProviderType::Saml => "saml",
        }
    }

    /// OAuth2 and OIDC providers support the redirect flow.
    pub fn is_oauth(self) -> bool {
        matches!(self, ProviderType::OAuth2 | ProviderType::Oidc)
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "oauth2" => Ok(ProviderType::OAuth2),
            "oidc" => Ok(ProviderType::Oidc),
            "basic" => Ok(ProviderType::Basic),
            "saml" => Ok(ProviderType::Saml),
            _ => Err(AuthError::InvalidProviderType(s.to_string())),
        }
    }
}

impl TryFrom<String> for ProviderType {
    type Error = AuthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ProviderType> for String {
    fn from(value: ProviderType) -> Self {
        value.as_str().to_string()
    }
}

fn default_enabled() -> bool {
    true
}

/// Static configuration of one identity provider.
///
/// For the Basic provider `client_id` / `client_secret` are the accepted
/// username / password.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    #[serde(rename = "type")]
    pub provider_type: ProviderType,
    pub id: String,
    pub name: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub auth_url: String,
    pub token_url: String,
    pub user_info_url: String,
    pub issuer_url: String,
    pub scopes: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub default_roles: Vec<String>,
    pub allowed_groups: Vec<String>,
    pub allowed_emails: Vec<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider_type: ProviderType::default(),
            id: String::new(),
            name: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            auth_url: String::new(),
            token_url: String::new(),
            user_info_url: String::new(),
            issuer_url: String::new(),
            scopes: Vec::new(),
            enabled: true,
            default_roles: Vec::new(),
            allowed_groups: Vec::new(),
            allowed_emails: Vec::new(),
        }
    }
}

/// Process-wide authentication configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub session_secret: String,
    #[serde(with = "duration::serde_format")]
    pub session_duration: Duration,
    pub session_cookie_name: String,
    pub secure_cookies: bool,
    /// CSRF token secret. Carried for form handlers; the login flow does not use it.
    pub csrf_secret: String,
    pub enable_basic_auth: bool,
    pub basic_auth_user: String,
    pub basic_auth_pass: String,
    pub default_roles: Vec<String>,
    pub admin_groups: Vec<String>,
    pub admin_emails: Vec<String>,
    pub custom_roles: Vec<Role>,
    pub providers: Vec<ProviderConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: String::new(),
            session_duration: DEFAULT_SESSION_DURATION,
            session_cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_string(),
            secure_cookies: false,
            csrf_secret: String::new(),
            enable_basic_auth: false,
            basic_auth_user: String::new(),
            basic_auth_pass: String::new(),
            default_roles: vec!["user".to_string()],
            admin_groups: Vec::new(),
            admin_emails: Vec::new(),
            custom_roles: Vec::new(),
            providers: Vec::new(),
        }
    }
}

impl AuthConfig {
    /// Parse a JSON config file; absent keys take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Read `ATLANTIS_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        env::load()
    }

    /// Built-in development configuration: Basic auth only, `atlantis/atlantis`.
    pub fn development() -> Self {
        Self {
            session_secret: "dev-secret-change-in-production".to_string(),
            csrf_secret: "dev-csrf-secret-change-in-production".to_string(),
            enable_basic_auth: true,
            basic_auth_user: "atlantis".to_string(),
            basic_auth_pass: "atlantis".to_string(),
            admin_groups: vec!["admin".to_string(), "atlantis-admins".to_string()],
            admin_emails: vec!["admin@example.com".to_string()],
            providers: vec![ProviderConfig {
                provider_type: ProviderType::Basic,
                id: "basic".to_string(),
                name: "Basic Authentication".to_string(),
                client_id: "atlantis".to_string(),
                client_secret: "atlantis".to_string(),
                default_roles: vec!["user".to_string()],
                ..ProviderConfig::default()
            }],
            ..Self::default()
        }
    }

    pub fn enabled_providers(&self) -> impl Iterator<Item = &ProviderConfig> {
        self.providers.iter().filter(|p| p.enabled)
    }
}
