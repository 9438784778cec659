//! HTTP Basic provider: one fixed username/password pair from configuration.
//!
//! Credential check only. There is no redirect flow, so every flow
//! operation fails with [`AuthError::Unsupported`].

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose;
use chrono::Utc;
use http::HeaderMap;
use http::header::AUTHORIZATION;
use subtle::ConstantTimeEq;
use tracing::debug;

use super::{Provider, require};
use crate::auth::permissions::ROLE_ADMIN;
use crate::auth::{AuthError, PermissionChecker};
use crate::config::{ProviderConfig, ProviderType};
use crate::models::auth::{TokenResponse, User};

/// Decode an `Authorization: Basic <base64(user:pass)>` header value. The
/// scheme name is case-insensitive.
pub fn parse_basic_auth_header(header: &str) -> Result<(String, String), AuthError> {
    let (scheme, encoded) = header
        .split_once(' ')
        .ok_or(AuthError::InvalidCredentials)?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return Err(AuthError::InvalidCredentials);
    }
    decode_credentials(encoded.trim())
}

fn decode_credentials(encoded: &str) -> Result<(String, String), AuthError> {
    let bytes = general_purpose::STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::InvalidCredentials)?;
    let decoded = String::from_utf8(bytes).map_err(|_| AuthError::InvalidCredentials)?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidCredentials)?;
    Ok((username.to_string(), password.to_string()))
}

/// Byte-wise comparison whose timing does not depend on where the inputs differ.
fn ct_str_eq(given: &str, expected: &str) -> bool {
    bool::from(given.as_bytes().ct_eq(expected.as_bytes()))
}

#[derive(Debug)]
pub struct BasicAuthProvider {
    config: ProviderConfig,
    default_roles: Vec<String>,
    checker: Arc<PermissionChecker>,
}

impl BasicAuthProvider {
    pub fn new(
        config: ProviderConfig,
        default_roles: Vec<String>,
        checker: Arc<PermissionChecker>,
    ) -> Result<Self, AuthError> {
        require(&config.client_id, "client_id")?;
        require(&config.client_secret, "client_secret")?;
        Ok(Self {
            config,
            default_roles,
            checker,
        })
    }

    /// Check a username/password pair and build the user on success.
    pub fn validate_credentials(&self, username: &str, password: &str) -> Result<User, AuthError> {
        // Evaluate both comparisons so timing does not reveal which one failed.
        let user_ok = ct_str_eq(username, &self.config.client_id);
        let pass_ok = ct_str_eq(password, &self.config.client_secret);
        if !(user_ok & pass_ok) {
            debug!(provider = %self.config.id, "basic credentials rejected");
            return Err(AuthError::InvalidCredentials);
        }

        let mut roles = self.default_roles.clone();
        let escalated = self.config.allowed_groups.iter().any(|g| g == username)
            || self.config.allowed_emails.iter().any(|e| e == username);
        if escalated {
            roles.push(ROLE_ADMIN.to_string());
        }

        let mut user = User {
            id: username.to_string(),
            name: username.to_string(),
            roles,
            provider: self.config.id.clone(),
            last_login: Utc::now(),
            ..User::default()
        };
        user.permissions = self
            .checker
            .user_permissions(Some(&user))
            .into_iter()
            .collect();
        Ok(user)
    }

    /// Validate the `Authorization` header of a request.
    pub fn validate_basic_auth(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        let value = headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::Unauthenticated)?
            .to_str()
            .map_err(|_| AuthError::InvalidCredentials)?;
        let (username, password) = parse_basic_auth_header(value)?;
        self.validate_credentials(&username, &password)
    }
}

#[async_trait]
impl Provider for BasicAuthProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Basic
    }

    fn id(&self) -> &str {
        &self.config.id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn auth_url(&self, _state: &str) -> Result<String, AuthError> {
        Err(AuthError::unsupported(&self.config.id, "auth_url"))
    }

    fn initiate_login(&self, _state: &str) -> Result<String, AuthError> {
        Err(AuthError::unsupported(&self.config.id, "initiate_login"))
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, AuthError> {
        Err(AuthError::unsupported(&self.config.id, "exchange_code"))
    }

    async fn user_info(&self, _token: &TokenResponse) -> Result<User, AuthError> {
        Err(AuthError::unsupported(&self.config.id, "user_info"))
    }

    /// `token` is `base64("user:pass")`.
    async fn validate_token(&self, token: &str) -> Result<User, AuthError> {
        let (username, password) = decode_credentials(token)?;
        self.validate_credentials(&username, &password)
    }

    async fn process_saml_response(&self, _saml_response: &str) -> Result<User, AuthError> {
        Err(AuthError::unsupported(&self.config.id, "process_saml_response"))
    }

    fn as_basic(&self) -> Option<&BasicAuthProvider> {
        Some(self)
    }
}
