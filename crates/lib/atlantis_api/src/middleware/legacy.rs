//! Legacy web gate: one shared Basic username/password, no roles.

use atlantis_core::auth::providers::parse_basic_auth_header;
use axum::{
    extract::{Request, State},
    http::{
        HeaderValue, StatusCode,
        header::{AUTHORIZATION, WWW_AUTHENTICATE},
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use subtle::ConstantTimeEq;
use tracing::debug;

const CHALLENGE: &str = r#"Basic realm="restricted", charset="UTF-8""#;
const EXEMPT_PREFIXES: [&str; 4] = ["/events", "/healthz", "/status", "/api/"];

/// Shared credential for the legacy gate. When `enabled` is false every
/// request passes.
#[derive(Clone, Debug)]
pub struct LegacyBasicAuth {
    pub enabled: bool,
    pub username: String,
    pub password: String,
}

impl LegacyBasicAuth {
    pub fn new(enabled: bool, username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            enabled,
            username: username.into(),
            password: password.into(),
        }
    }

    fn is_exempt(path: &str) -> bool {
        EXEMPT_PREFIXES.iter().any(|p| path.starts_with(p))
    }

    fn accepts(&self, header: Option<&HeaderValue>) -> bool {
        let Some((user, pass)) = header
            .and_then(|v| v.to_str().ok())
            .and_then(|v| parse_basic_auth_header(v).ok())
        else {
            return false;
        };
        let user_ok = user.as_bytes().ct_eq(self.username.as_bytes());
        let pass_ok = pass.as_bytes().ct_eq(self.password.as_bytes());
        bool::from(user_ok & pass_ok)
    }
}

/// Axum middleware: binary allow/deny with a Basic challenge on failure.
pub async fn legacy_basic_auth(
    State(auth): State<LegacyBasicAuth>,
    request: Request,
    next: Next,
) -> Response {
    if !auth.enabled || LegacyBasicAuth::is_exempt(request.uri().path()) {
        return next.run(request).await;
    }
    if auth.accepts(request.headers().get(AUTHORIZATION)) {
        return next.run(request).await;
    }
    debug!(path = %request.uri().path(), "legacy basic auth rejected");
    (
        StatusCode::UNAUTHORIZED,
        [(WWW_AUTHENTICATE, HeaderValue::from_static(CHALLENGE))],
        "Unauthorized",
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::routing::get;
    use axum::{Router, middleware};
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use tower::ServiceExt;

    use super::*;

    fn app(auth: LegacyBasicAuth) -> Router {
        Router::new()
            .route("/{*path}", get(|| async { "next" }))
            .layer(middleware::from_fn_with_state(auth, legacy_basic_auth))
    }

    async fn status(auth: LegacyBasicAuth, path: &str, creds: Option<(&str, &str)>) -> Response {
        let mut req = axum::http::Request::builder().uri(path);
        if let Some((u, p)) = creds {
            req = req.header(
                AUTHORIZATION,
                format!("Basic {}", STANDARD.encode(format!("{u}:{p}"))),
            );
        }
        app(auth)
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    fn enabled() -> LegacyBasicAuth {
        LegacyBasicAuth::new(true, "testuser", "testpass")
    }

    #[tokio::test]
    async fn disabled_gate_passes_everything() {
        let resp = status(LegacyBasicAuth::new(false, "testuser", "testpass"), "/public", None).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn exempt_paths_pass() {
        for path in ["/events", "/healthz", "/status", "/api/test"] {
            assert_eq!(status(enabled(), path, None).await.status(), StatusCode::OK, "{path}");
        }
    }

    #[tokio::test]
    async fn valid_credentials_pass() {
        let resp = status(enabled(), "/locks", Some(("testuser", "testpass"))).await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_credentials_are_challenged() {
        let resp = status(enabled(), "/locks", Some(("testuser", "wrong"))).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            resp.headers().get(WWW_AUTHENTICATE).unwrap(),
            r#"Basic realm="restricted", charset="UTF-8""#
        );
    }

    #[tokio::test]
    async fn missing_header_is_challenged() {
        let resp = status(enabled(), "/", None).await;
        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        assert!(resp.headers().contains_key(WWW_AUTHENTICATE));
    }
}
