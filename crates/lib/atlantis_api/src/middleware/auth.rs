//! Authentication middleware: resolve the request's identity and inject it
//! into request extensions.

use std::convert::Infallible;

use atlantis_core::models::auth::User;
use axum::{
    extract::{FromRequestParts, OptionalFromRequestParts, Request, State},
    http::{StatusCode, header::LOCATION, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::debug;

use crate::AppState;
use crate::error::AppError;
use crate::services::auth::is_exempt_path;

/// Extension key for the authenticated user. Private so nothing outside this
/// module can insert or shadow it.
#[derive(Debug, Clone)]
struct CurrentUser(User);

/// Authenticated user attached to `request`, if the auth gate ran.
pub fn user_from_request<B>(request: &axum::http::Request<B>) -> Option<&User> {
    request.extensions().get::<CurrentUser>().map(|c| &c.0)
}

/// Attach `user` to `request`.
pub fn with_user<B>(request: &mut axum::http::Request<B>, user: User) {
    request.extensions_mut().insert(CurrentUser(user));
}

/// Extractor for handlers behind [`require_auth`]. Rejects with `401` when no
/// user was injected.
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .map(|c| AuthUser(c.0.clone()))
            .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))
    }
}

impl<S> OptionalFromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<CurrentUser>()
            .map(|c| AuthUser(c.0.clone())))
    }
}

/// `302 Found` to `location`.
pub fn redirect_to_login(location: &str) -> Response {
    (StatusCode::FOUND, [(LOCATION, location.to_string())]).into_response()
}

/// Axum middleware: lets exempt paths through, otherwise resolves the user
/// once and injects it. Unauthenticated requests are redirected to login, or
/// get `401` when no login target exists.
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if is_exempt_path(request.uri().path()) {
        return next.run(request).await;
    }

    match state.auth.user_from_request(request.headers()) {
        Ok(user) => {
            with_user(&mut request, user);
            next.run(request).await
        }
        Err(e) => {
            debug!(path = %request.uri().path(), error = %e, "unauthenticated request");
            match state.auth.login_redirect() {
                Ok(location) => redirect_to_login(&location),
                Err(e) => AppError::Unauthorized(e.to_string()).into_response(),
            }
        }
    }
}
