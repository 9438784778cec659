//! OAuth2 / OIDC authorization-code provider.
//!
//! Endpoints are resolved at construction: explicit `auth_url` / `token_url` /
//! `user_info_url` win, otherwise the well-known endpoints of `google`, `okta`,
//! `azure` and `auth0` are used. Any other id must configure them explicitly.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Provider, require};
use crate::auth::{AuthError, RoleMapper};
use crate::config::{ProviderConfig, ProviderType};
use crate::models::auth::{TokenResponse, User};

const HTTP_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_SCOPES: [&str; 3] = ["openid", "email", "profile"];

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";
const AZURE_DEFAULT_AUTHORITY: &str = "https://login.microsoftonline.com/common";
const AZURE_USERINFO_URL: &str = "https://graph.microsoft.com/oidc/userinfo";

/// Claim names that may carry group or role membership.
const GROUP_CLAIMS: [&str; 3] = ["groups", "roles", "memberOf"];

/// Resolved endpoint set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub auth: String,
    pub token: String,
    /// Empty when the provider has no userinfo endpoint.
    pub user_info: String,
}

impl Endpoints {
    /// Resolve endpoints for `config`, failing with `MissingEndpoint` when the
    /// authorization or token endpoint cannot be determined.
    pub fn resolve(config: &ProviderConfig) -> Result<Self, AuthError> {
        let issuer = config.issuer_url.trim_end_matches('/');
        let well_known: Option<(String, String, String)> = match config.id.as_str() {
            "google" => Some((
                GOOGLE_AUTH_URL.into(),
                GOOGLE_TOKEN_URL.into(),
                GOOGLE_USERINFO_URL.into(),
            )),
            "okta" if !issuer.is_empty() => Some((
                format!("{issuer}/v1/authorize"),
                format!("{issuer}/v1/token"),
                format!("{issuer}/v1/userinfo"),
            )),
            "azure" => {
                let authority = if issuer.is_empty() {
                    AZURE_DEFAULT_AUTHORITY
                } else {
                    issuer
                };
                Some((
                    format!("{authority}/oauth2/v2.0/authorize"),
                    format!("{authority}/oauth2/v2.0/token"),
                    AZURE_USERINFO_URL.into(),
                ))
            }
            "auth0" if !issuer.is_empty() => Some((
                format!("{issuer}/authorize"),
                format!("{issuer}/oauth/token"),
                format!("{issuer}/userinfo"),
            )),
            _ => None,
        };
        let (known_auth, known_token, known_user_info) = well_known.unwrap_or_default();

        let pick = |explicit: &str, known: String| -> String {
            if explicit.is_empty() {
                known
            } else {
                explicit.to_string()
            }
        };
        let endpoints = Self {
            auth: pick(config.auth_url.as_str(), known_auth),
            token: pick(config.token_url.as_str(), known_token),
            user_info: pick(config.user_info_url.as_str(), known_user_info),
        };

        if endpoints.auth.is_empty() {
            return Err(AuthError::MissingEndpoint("authorization".into()));
        }
        if endpoints.token.is_empty() {
            return Err(AuthError::MissingEndpoint("token".into()));
        }
        Ok(endpoints)
    }
}

#[derive(Debug)]
pub struct OAuth2Provider {
    config: ProviderConfig,
    endpoints: Endpoints,
    auth_base: url::Url,
    scopes: Vec<String>,
    mapper: RoleMapper,
    client: reqwest::Client,
}

impl OAuth2Provider {
    pub fn new(config: ProviderConfig, mapper: RoleMapper) -> Result<Self, AuthError> {
        require(&config.client_id, "client_id")?;
        require(&config.client_secret, "client_secret")?;
        require(&config.redirect_url, "redirect_url")?;

        let endpoints = Endpoints::resolve(&config)?;
        let auth_base = url::Url::parse(&endpoints.auth).map_err(|e| {
            AuthError::InvalidConfig(format!("{}: bad authorization URL: {e}", config.id))
        })?;
        let scopes = if config.scopes.is_empty() {
            DEFAULT_SCOPES.iter().map(|s| s.to_string()).collect()
        } else {
            config.scopes.clone()
        };
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| AuthError::Internal(format!("HTTP client: {e}")))?;

        Ok(Self {
            config,
            endpoints,
            auth_base,
            scopes,
            mapper,
            client,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Build a mapped user from a claim set (userinfo body or ID token).
    fn user_from_claims(&self, claims: &Value) -> Result<User, AuthError> {
        let id = ["id", "sub"]
            .iter()
            .find_map(|k| claim_string(claims, k))
            .ok_or_else(|| AuthError::UserInfoFailed("response carries no subject".into()))?;

        let mut groups = Vec::new();
        for key in GROUP_CLAIMS {
            match claims.get(key) {
                Some(Value::Array(items)) => {
                    groups.extend(items.iter().filter_map(|v| v.as_str().map(str::to_string)))
                }
                Some(Value::String(s)) => groups.push(s.clone()),
                _ => {}
            }
        }

        let mut attributes = HashMap::new();
        if let Some(map) = claims.as_object() {
            for (key, value) in map {
                if let Some(s) = value.as_str() {
                    attributes.insert(key.clone(), s.to_string());
                }
            }
        }

        let mut user = User {
            id,
            email: claim_string(claims, "email").unwrap_or_default(),
            name: ["name", "display_name"]
                .iter()
                .find_map(|k| claim_string(claims, k))
                .unwrap_or_default(),
            groups,
            attributes,
            provider: self.config.id.clone(),
            last_login: Utc::now(),
            ..User::default()
        };
        self.mapper.apply(&mut user);
        Ok(user)
    }

    /// Decode an OIDC ID token. The signature is not verified; `exp` and
    /// `aud == client_id` are.
    fn validate_id_token(&self, token: &str) -> Result<User, AuthError> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.set_audience(&[self.config.client_id.as_str()]);

        let data = jsonwebtoken::decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
            .map_err(|e| {
                debug!(provider = %self.config.id, error = %e, "id token rejected");
                AuthError::InvalidToken(e.to_string())
            })?;
        self.user_from_claims(&data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

fn claim_string(claims: &Value, key: &str) -> Option<String> {
    match claims.get(key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[async_trait]
impl Provider for OAuth2Provider {
    fn provider_type(&self) -> ProviderType {
        self.config.provider_type
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

    fn auth_url(&self, state: &str) -> Result<String, AuthError> {
        let mut url = self.auth_base.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_url)
            .append_pair("response_type", "code")
            .append_pair("scope", &self.scopes.join(" "))
            .append_pair("state", state);
        Ok(url.into())
    }

    fn initiate_login(&self, state: &str) -> Result<String, AuthError> {
        self.auth_url(state)
    }

    async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_url.as_str()),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
        ];

        let resp = self
            .client
            .post(&self.endpoints.token)
            .header(http::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| {
                warn!(provider = %self.config.id, error = %e, "token endpoint unreachable");
                AuthError::ExchangeFailed(format!("Token request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(provider = %self.config.id, %status, "code exchange rejected");
            return Err(AuthError::ExchangeFailed(format!("HTTP {status}: {body}")));
        }

        let token = resp
            .json::<TokenResponse>()
            .await
            .map_err(|e| AuthError::ExchangeFailed(format!("Token response parse error: {e}")))?;
        if token.access_token.is_empty() {
            return Err(AuthError::ExchangeFailed("empty access token".into()));
        }
        Ok(token)
    }

    async fn user_info(&self, token: &TokenResponse) -> Result<User, AuthError> {
        if self.endpoints.user_info.is_empty() {
            // OIDC providers without a userinfo endpoint still hand out an ID token.
            if let (ProviderType::Oidc, Some(id_token)) =
                (self.config.provider_type, token.id_token.as_deref())
            {
                return self.validate_id_token(id_token);
            }
            return Err(AuthError::UserInfoFailed(format!(
                "{} has no userinfo endpoint",
                self.config.id
            )));
        }

        let resp = self
            .client
            .get(&self.endpoints.user_info)
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| {
                warn!(provider = %self.config.id, error = %e, "userinfo endpoint unreachable");
                AuthError::UserInfoFailed(format!("Userinfo request failed: {e}"))
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!(provider = %self.config.id, %status, "userinfo rejected");
            return Err(AuthError::UserInfoFailed(format!("HTTP {status}: {body}")));
        }

        let claims = resp
            .json::<Value>()
            .await
            .map_err(|e| AuthError::UserInfoFailed(format!("Userinfo parse error: {e}")))?;
        self.user_from_claims(&claims)
    }

    async fn validate_token(&self, token: &str) -> Result<User, AuthError> {
        match self.config.provider_type {
            ProviderType::Oidc => self.validate_id_token(token),
            _ => self.user_info(&TokenResponse::bearer(token)).await,
        }
    }

    async fn process_saml_response(&self, _saml_response: &str) -> Result<User, AuthError> {
        Err(AuthError::unsupported(&self.config.id, "process_saml_response"))
    }
}
