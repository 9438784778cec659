//! SAML placeholder. It can be configured and listed on the login page, but no
//! SAML flow is implemented.

use async_trait::async_trait;

use super::Provider;
use crate::auth::AuthError;
use crate::config::{ProviderConfig, ProviderType};
use crate::models::auth::{TokenResponse, User};

#[derive(Debug)]
pub struct SamlProvider {
    config: ProviderConfig,
}

impl SamlProvider {
    pub fn new(config: ProviderConfig) -> Result<Self, AuthError> {
        super::require(&config.id, "id")?;
        Ok(Self { config })
    }

    fn unsupported(&self, operation: &'static str) -> AuthError {
        AuthError::unsupported(&self.config.id, operation)
    }
}

#[async_trait]
impl Provider for SamlProvider {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Saml
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
        Err(self.unsupported("auth_url"))
    }

    fn initiate_login(&self, _state: &str) -> Result<String, AuthError> {
        Err(self.unsupported("initiate_login"))
    }

    async fn exchange_code(&self, _code: &str) -> Result<TokenResponse, AuthError> {
        Err(self.unsupported("exchange_code"))
    }

    async fn user_info(&self, _token: &TokenResponse) -> Result<User, AuthError> {
        Err(self.unsupported("user_info"))
    }

    async fn validate_token(&self, _token: &str) -> Result<User, AuthError> {
        Err(self.unsupported("validate_token"))
    }

    async fn process_saml_response(&self, _saml_response: &str) -> Result<User, AuthError> {
        Err(self.unsupported("process_saml_response"))
    }
}
