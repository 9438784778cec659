//! Authentication service: the auth manager tying providers, sessions, role
//! mapping and login state together for the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use atlantis_core::auth::providers::{Provider, build_provider};
use atlantis_core::auth::state::LoginStateStore;
use atlantis_core::auth::{AuthError, PermissionChecker, RoleMapper, SessionStore};
use atlantis_core::config::{AuthConfig, ProviderConfig, ProviderType};
use atlantis_core::models::auth::{Session, User};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use tracing::{debug, info, warn};

use crate::services::cookies;

/// Local provider chooser page.
pub const LOGIN_PAGE: &str = "/login";

/// Path prefixes that bypass the auth gate. Entries ending in `/` match any
/// sub-path; the others match the path itself and anything below it.
pub const EXEMPT_PATHS: [&str; 8] = [
    "/events",
    "/healthz",
    "/status",
    "/auth/callback",
    "/auth/login",
    LOGIN_PAGE,
    "/static/",
    "/api/",
];

const DEV_SECRETS: [&str; 3] = [
    "",
    "change-me-in-production",
    "dev-secret-change-in-production",
];

/// True when `path` needs no authentication.
pub fn is_exempt_path(path: &str) -> bool {
    EXEMPT_PATHS.iter().any(|prefix| {
        if prefix.ends_with('/') {
            path.starts_with(prefix)
        } else {
            path == *prefix
                || path
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('/'))
        }
    })
}

/// Auth manager shared by every request.
#[derive(Debug)]
pub struct AuthManager {
    config: AuthConfig,
    sessions: Arc<SessionStore>,
    login_states: LoginStateStore,
    checker: Arc<PermissionChecker>,
    mapper: RoleMapper,
    providers: Vec<Arc<dyn Provider>>,
}

impl AuthManager {
    /// Build the manager around an injected session store. Provider
    /// construction errors abort.
    pub fn new(config: AuthConfig, sessions: Arc<SessionStore>) -> Result<Self, AuthError> {
        let checker = Arc::new(PermissionChecker::new(config.custom_roles.clone()));
        let mapper = RoleMapper::from_config(&config, Arc::clone(&checker));

        let mut provider_configs: Vec<ProviderConfig> =
            config.enabled_providers().cloned().collect();
        let has_basic = provider_configs
            .iter()
            .any(|p| p.provider_type == ProviderType::Basic);
        if config.enable_basic_auth && !has_basic {
            provider_configs.push(implicit_basic_provider(&config));
        }

        let mut providers: Vec<Arc<dyn Provider>> = Vec::with_capacity(provider_configs.len());
        for pc in &provider_configs {
            if providers.iter().any(|p| p.id() == pc.id) {
                return Err(AuthError::InvalidConfig(format!(
                    "duplicate provider id: {}",
                    pc.id
                )));
            }
            providers.push(build_provider(pc, &mapper)?);
        }

        if DEV_SECRETS.contains(&config.session_secret.as_str()) {
            warn!("session secret is unset or a development default");
        }
        info!(
            providers = providers.len(),
            roles = checker.roles().len(),
            "auth manager initialised"
        );

        Ok(Self {
            config,
            sessions,
            login_states: LoginStateStore::new(),
            checker,
            mapper,
            providers,
        })
    }

    /// Build the manager with a fresh session store sized from `config`.
    pub fn from_config(config: AuthConfig) -> Result<Self, AuthError> {
        let sessions = Arc::new(SessionStore::new(config.session_duration)?);
        Self::new(config, sessions)
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn login_states(&self) -> &LoginStateStore {
        &self.login_states
    }

    pub fn permission_checker(&self) -> &Arc<PermissionChecker> {
        &self.checker
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Start a session for an authenticated user.
    pub fn authenticate_user(&self, user: &User) -> Result<Session, AuthError> {
        if user.id.is_empty() {
            return Err(AuthError::Internal(
                "cannot start a session for a user without id".into(),
            ));
        }
        let session = self.sessions.create(&user.id)?;
        info!(user_id = %user.id, provider = %user.provider, "session created");
        Ok(session)
    }

    /// Resolve a session id to a user. Roles are re-derived from the current
    /// configuration on every call.
    pub fn validate_session(&self, session_id: &str) -> Result<User, AuthError> {
        let session = self.sessions.get(session_id)?;
        let mut user = User {
            id: session.user_id,
            session_id: Some(session.id),
            last_login: session.created_at,
            ..User::default()
        };
        self.map_user_roles_and_permissions(&mut user);
        Ok(user)
    }

    /// Drop a session. Unknown ids are ignored.
    pub fn invalidate_session(&self, session_id: &str) {
        if let Some(session) = self.sessions.remove(session_id) {
            info!(user_id = %session.user_id, "session invalidated");
        }
    }

    pub fn map_user_roles_and_permissions(&self, user: &mut User) {
        self.mapper.apply(user);
    }

    // =========================================================================
    // Request identity
    // =========================================================================

    /// Identity carried by a request: the session cookie first, then an HTTP
    /// Basic `Authorization` header.
    pub fn user_from_request(&self, headers: &HeaderMap) -> Result<User, AuthError> {
        if let Some(session_id) = cookies::session_id(&self.config, headers) {
            match self.validate_session(&session_id) {
                Ok(user) => return Ok(user),
                Err(e) => debug!(error = %e, "session cookie rejected"),
            }
        }

        if headers.contains_key(AUTHORIZATION)
            && let Some(basic) = self.providers.iter().find_map(|p| p.as_basic())
        {
            match basic.validate_basic_auth(headers) {
                Ok(user) => return Ok(user),
                Err(e) => debug!(error = %e, "basic credentials rejected"),
            }
        }

        Err(AuthError::Unauthenticated)
    }

    /// Whether a request to `path` with `headers` must authenticate first.
    pub fn login_required(&self, path: &str, headers: &HeaderMap) -> bool {
        !is_exempt_path(path) && self.user_from_request(headers).is_err()
    }

    /// Where to send an unauthenticated browser: straight to the identity
    /// provider when it is the only one and supports redirects, otherwise to
    /// the local chooser page.
    pub fn login_redirect(&self) -> Result<String, AuthError> {
        let enabled = self.enabled_providers();
        match enabled.as_slice() {
            [] => Err(AuthError::NoProvidersAvailable),
            [only] if only.provider_type().is_oauth() => self.begin_login(only.id()),
            _ => Ok(LOGIN_PAGE.to_string()),
        }
    }

    // =========================================================================
    // Providers and the redirect flow
    // =========================================================================

    pub fn provider(&self, id: &str) -> Result<Arc<dyn Provider>, AuthError> {
        self.providers
            .iter()
            .find(|p| p.id() == id)
            .cloned()
            .ok_or_else(|| AuthError::ProviderNotFound(id.to_string()))
    }

    /// Enabled providers in configuration order.
    pub fn enabled_providers(&self) -> Vec<Arc<dyn Provider>> {
        self.providers
            .iter()
            .filter(|p| p.is_enabled())
            .cloned()
            .collect()
    }

    /// Start the redirect flow: remember a fresh state for `provider_id` and
    /// return the provider's authorization URL.
    pub fn begin_login(&self, provider_id: &str) -> Result<String, AuthError> {
        let provider = self.oauth_provider(provider_id)?;
        let state = self.login_states.issue(provider_id);
        let location = provider.initiate_login(&state);
        if location.is_err() {
            self.login_states.take(&state);
        }
        location
    }

    /// Finish the redirect flow: consume the single-use state, exchange the
    /// code, fetch the user and start a session. The state is spent even when a
    /// later step fails.
    pub async fn complete_login(
        &self,
        provider_id: &str,
        code: &str,
        state: &str,
    ) -> Result<(User, Session), AuthError> {
        let pending = self.login_states.take(state).ok_or(AuthError::InvalidState)?;
        let provider = self.oauth_provider(provider_id)?;
        if pending.provider_id != provider_id {
            debug!(
                expected = %pending.provider_id,
                got = %provider_id,
                "login state issued for another provider"
            );
            return Err(AuthError::InvalidState);
        }

        let token = provider.exchange_code(code).await?;
        let mut user = provider.user_info(&token).await?;
        let session = self.authenticate_user(&user)?;
        user.session_id = Some(session.id.clone());
        Ok((user, session))
    }

    fn oauth_provider(&self, provider_id: &str) -> Result<Arc<dyn Provider>, AuthError> {
        let provider = self.provider(provider_id)?;
        if !provider.provider_type().is_oauth() {
            return Err(AuthError::Unsupported {
                provider: provider_id.to_string(),
                operation: "redirect login",
            });
        }
        Ok(provider)
    }

    // =========================================================================
    // Housekeeping
    // =========================================================================

    /// Purge expired sessions and stale login states.
    pub fn cleanup(&self) -> (usize, usize) {
        let sessions = self.sessions.purge_expired();
        let states = self.login_states.cleanup();
        if sessions + states > 0 {
            debug!(sessions, states, "auth cleanup");
        }
        (sessions, states)
    }

    /// Spawn a periodic cleanup task.
    pub fn spawn_cleanup_task(self: &Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                manager.cleanup();
            }
        })
    }
}

/// Basic provider synthesized from the top-level Basic settings.
fn implicit_basic_provider(config: &AuthConfig) -> ProviderConfig {
    ProviderConfig {
        provider_type: ProviderType::Basic,
        id: "basic".to_string(),
        name: "Basic Authentication".to_string(),
        client_id: config.basic_auth_user.clone(),
        client_secret: config.basic_auth_pass.clone(),
        default_roles: config.default_roles.clone(),
        allowed_groups: config.admin_groups.clone(),
        allowed_emails: config.admin_emails.clone(),
        ..ProviderConfig::default()
    }
}
