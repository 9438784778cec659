//! Browser login flow: provider chooser, redirect start, callback and logout.

use atlantis_core::auth::AuthError;
use atlantis_core::auth::providers::Provider;
use atlantis_core::config::ProviderType;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;
use tracing::{debug, info, warn};

use crate::AppState;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::redirect_to_login;
use crate::services::cookies;

/// Where logout sends the browser.
pub const LOGOUT_TARGET: &str = "/auth/login";

/// `GET /auth/login` and `GET /login`: go straight to the only redirect
/// provider, or render the chooser.
pub async fn login_page_handler(State(state): State<AppState>) -> AppResult<Response> {
    let providers = state.auth.enabled_providers();
    if let [only] = providers.as_slice()
        && only.provider_type().is_oauth()
    {
        let location = state.auth.begin_login(only.id())?;
        return Ok(redirect_to_login(&location));
    }
    Ok(Html(render_chooser(&providers)).into_response())
}

/// `GET /auth/login/{provider}`: start the redirect flow for one provider.
pub async fn login_provider_handler(
    State(state): State<AppState>,
    Path(provider_id): Path<String>,
) -> AppResult<Response> {
    let location = state.auth.begin_login(&provider_id).map_err(|e| match e {
        AuthError::ProviderNotFound(_) | AuthError::Unsupported { .. } => {
            AppError::Validation(e.to_string())
        }
        other => AppError::from(other),
    })?;
    Ok(redirect_to_login(&location))
}

/// Query parameters the identity provider sends back.
#[derive(Debug, Default, serde::Deserialize)]
pub struct CallbackParams {
    pub provider: Option<String>,
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// `GET /auth/callback`: finish the redirect flow, set the session cookie and
/// send the browser home.
pub async fn callback_handler(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    jar: CookieJar,
) -> AppResult<(CookieJar, Redirect)> {
    if let Some(error) = params.error.as_deref() {
        debug!(error, "identity provider returned an error");
        return Err(AppError::Validation(format!("Login failed: {error}")));
    }
    let provider_id = non_empty(params.provider.as_deref(), "provider")?;
    let code = non_empty(params.code.as_deref(), "code")?;
    let login_state = non_empty(params.state.as_deref(), "state")?;

    let (user, session) = state
        .auth
        .complete_login(provider_id, code, login_state)
        .await
        .map_err(|e| {
            if is_upstream_failure(&e) {
                warn!(provider = provider_id, error = %e, "login callback failed");
            } else {
                debug!(provider = provider_id, error = %e, "login callback rejected");
            }
            AppError::Validation(format!("Login failed: {e}"))
        })?;

    info!(user_id = %user.id, provider = provider_id, "user logged in");
    let cookie = cookies::session_cookie(state.auth.config(), &session);
    Ok((jar.add(cookie), Redirect::temporary("/")))
}

/// `GET /auth/logout`: drop the session and clear the cookie.
pub async fn logout_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    jar: CookieJar,
) -> (CookieJar, Redirect) {
    let config = state.auth.config();
    if let Some(session_id) = cookies::session_id(config, &headers) {
        state.auth.invalidate_session(&session_id);
    }
    (
        jar.add(cookies::clear_session_cookie(config)),
        Redirect::temporary(LOGOUT_TARGET),
    )
}

/// Failures caused by the identity provider rather than the client.
fn is_upstream_failure(err: &AuthError) -> bool {
    matches!(
        err,
        AuthError::ExchangeFailed(_) | AuthError::UserInfoFailed(_)
    )
}

fn non_empty<'a>(value: Option<&'a str>, name: &str) -> AppResult<&'a str> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("Missing {name} parameter")))
}

// =============================================================================
// Chooser page
// =============================================================================

fn render_chooser(providers: &[std::sync::Arc<dyn Provider>]) -> String {
    let mut items = String::new();
    let mut basic = false;
    for p in providers {
        let name = escape_html(p.name());
        match p.provider_type() {
            ProviderType::Basic => basic = true,
            t if t.is_oauth() && p.auth_url("").is_ok() => {
                items.push_str(&format!(
                    "<li><a href=\"/auth/login/{}\">Sign in with {name}</a></li>\n",
                    escape_html(p.id())
                ));
            }
            _ => items.push_str(&format!("<li>{name}</li>\n")),
        }
    }

    let mut body = String::from("<h1>Sign in to Atlantis</h1>\n");
    if providers.is_empty() {
        body.push_str("<p>No login providers are configured.</p>\n");
    }
    if !items.is_empty() {
        body.push_str("<ul>\n");
        body.push_str(&items);
        body.push_str("</ul>\n");
    }
    if basic {
        body.push_str("<p>HTTP Basic authentication is available for this server.</p>\n");
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head><meta charset=\"utf-8\"><title>Atlantis Login</title></head>\n<body>\n{body}</body>\n</html>\n"
    )
}

pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
