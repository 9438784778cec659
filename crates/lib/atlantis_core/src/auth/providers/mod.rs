//! Identity providers: turn external credentials or tokens into a [`User`].
//!
//! The set of provider kinds is closed ([`ProviderType`]); [`build_provider`]
//! selects the implementation once at startup and the manager holds it behind
//! `Arc<dyn Provider>`. Capabilities a kind does not have fail with
//! [`AuthError::Unsupported`].

pub mod basic;
pub mod oauth2;
pub mod saml;

use std::sync::Arc;

use async_trait::async_trait;

use super::{AuthError, RoleMapper};
use crate::config::{ProviderConfig, ProviderType};
use crate::models::auth::{TokenResponse, User};

pub use basic::{BasicAuthProvider, parse_basic_auth_header};
pub use oauth2::OAuth2Provider;
pub use saml::SamlProvider;

/// Capability set shared by every identity provider.
#[async_trait]
pub trait Provider: Send + Sync {
    fn provider_type(&self) -> ProviderType;

    fn id(&self) -> &str;

    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    /// Authorization redirect URL carrying `state`. Never performs I/O.
    fn auth_url(&self, state: &str) -> Result<String, AuthError>;

    /// Location to send the browser to in order to start a login.
    fn initiate_login(&self, state: &str) -> Result<String, AuthError>;

    /// Trade an authorization code for tokens.
    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError>;

    /// Fetch the user behind `token`, with roles and permissions mapped.
    async fn user_info(&self, token: &TokenResponse) -> Result<User, AuthError>;

    /// Validate a bearer-style credential and return its user.
    async fn validate_token(&self, token: &str) -> Result<User, AuthError>;

    async fn process_saml_response(&self, saml_response: &str) -> Result<User, AuthError>;

    /// Downcast hook for header-based Basic validation.
    fn as_basic(&self) -> Option<&BasicAuthProvider> {
        None
    }
}

impl std::fmt::Debug for dyn Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Provider")
            .field("type", &self.provider_type())
            .field("id", &self.id())
            .finish()
    }
}

/// Construct the provider for `config`.
///
/// `mapper` carries the global role-mapping rules; OAuth2/OIDC providers derive
/// their own via [`RoleMapper::for_provider`].
pub fn build_provider(
    config: &ProviderConfig,
    mapper: &RoleMapper,
) -> Result<Arc<dyn Provider>, AuthError> {
    if config.id.is_empty() {
        return Err(AuthError::MissingField("id".into()));
    }
    let provider: Arc<dyn Provider> = match config.provider_type {
        ProviderType::OAuth2 | ProviderType::Oidc => {
            Arc::new(OAuth2Provider::new(config.clone(), mapper.for_provider(config))?)
        }
        ProviderType::Basic => Arc::new(BasicAuthProvider::new(
            config.clone(),
            mapper.for_provider(config).default_roles,
            Arc::clone(mapper.checker()),
        )?),
        ProviderType::Saml => Arc::new(SamlProvider::new(config.clone())?),
    };
    Ok(provider)
}

/// Fail with `MissingField(name)` when `value` is empty.
pub(crate) fn require(value: &str, name: &str) -> Result<(), AuthError> {
    if value.is_empty() {
        Err(AuthError::MissingField(name.to_string()))
    } else {
        Ok(())
    }
}
