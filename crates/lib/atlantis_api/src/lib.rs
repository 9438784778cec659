//! # atlantis_api
//!
//! HTTP layer for Atlantis authentication: the auth gate, login flow,
//! session cookies and permission-gated routes.

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod services;

use std::sync::Arc;

use atlantis_core::auth::AuthError;
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use tower_http::trace::TraceLayer;

use crate::config::{ApiConfig, GateMode};
use crate::handlers::{auth, health, me, roles};
use crate::middleware::legacy::{LegacyBasicAuth, legacy_basic_auth};
use crate::middleware::permissions::{self, PermissionGate};
use crate::services::auth::AuthManager;

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Providers, sessions and the role table.
    pub auth: Arc<AuthManager>,
    /// API configuration.
    pub config: ApiConfig,
}

impl AppState {
    pub fn new(auth: Arc<AuthManager>, config: ApiConfig) -> Self {
        Self { auth, config }
    }

    /// Build the auth manager from `config.auth` and wrap both.
    pub fn from_config(config: ApiConfig) -> Result<Self, AuthError> {
        let auth = Arc::new(AuthManager::from_config(config.auth.clone())?);
        Ok(Self::new(auth, config))
    }
}

/// Builds the Axum router with all routes and shared state.
pub fn router(state: AppState) -> Router {
    // Public routes (exempt from the gate)
    let public = Router::new()
        .route("/healthz", get(health::healthz_handler))
        .route("/login", get(auth::login_page_handler))
        .route("/auth/login", get(auth::login_page_handler))
        .route("/auth/login/{provider}", get(auth::login_provider_handler))
        .route("/auth/callback", get(auth::callback_handler))
        .route("/auth/logout", get(auth::logout_handler));

    let protected = match state.config.gate {
        GateMode::Full => {
            let checker = Arc::clone(state.auth.permission_checker());
            Router::new()
                .route("/", get(me::index_handler))
                .route("/me", get(me::me_handler))
                .route(
                    "/admin/roles",
                    get(roles::list_roles_handler)
                        .route_layer(from_fn_with_state(
                            (Arc::clone(&checker), PermissionGate::admin()),
                            permissions::enforce,
                        ))
                        .merge(post(roles::create_role_handler).route_layer(
                            from_fn_with_state(
                                (Arc::clone(&checker), PermissionGate::user_management()),
                                permissions::enforce,
                            ),
                        )),
                )
                .route(
                    "/admin/roles/{name}",
                    delete(roles::delete_role_handler).route_layer(from_fn_with_state(
                        (checker, PermissionGate::user_management()),
                        permissions::enforce,
                    )),
                )
                .layer(from_fn_with_state(
                    state.clone(),
                    middleware::auth::require_auth,
                ))
        }
        GateMode::LegacyBasic => {
            let cfg = &state.config.auth;
            let legacy = LegacyBasicAuth::new(
                true,
                cfg.basic_auth_user.clone(),
                cfg.basic_auth_pass.clone(),
            );
            Router::new()
                .route("/", get(me::index_handler))
                .layer(from_fn_with_state(legacy, legacy_basic_auth))
        }
    };

    Router::new()
        .merge(public)
        .merge(protected)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
