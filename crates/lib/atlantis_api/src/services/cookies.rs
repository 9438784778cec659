//! Cookie service: build and clear the httpOnly session cookie.

use atlantis_core::config::AuthConfig;
use atlantis_core::models::auth::Session;
use axum::http::HeaderMap;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use time::{Duration, OffsetDateTime};

/// Build the session cookie. `Expires` is the session's expiry instant.
pub fn session_cookie(config: &AuthConfig, session: &Session) -> Cookie<'static> {
    let mut cookie = Cookie::build((config.session_cookie_name.clone(), session.id.clone()))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .build();
    if let Ok(expires) = OffsetDateTime::from_unix_timestamp(session.expires_at.timestamp()) {
        cookie.set_expires(expires);
    }
    cookie
}

/// Build an expired cookie that clears the session.
pub fn clear_session_cookie(config: &AuthConfig) -> Cookie<'static> {
    Cookie::build((config.session_cookie_name.clone(), String::new()))
        .http_only(true)
        .secure(config.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/".to_string())
        .max_age(Duration::ZERO)
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
}

/// Session id carried by the request's cookies, if any.
pub fn session_id(config: &AuthConfig, headers: &HeaderMap) -> Option<String> {
    CookieJar::from_headers(headers)
        .get(&config.session_cookie_name)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
}
