//! Integration test: build the router around an auth manager and drive the
//! gate, login flow, cookies and permission-gated routes through it.

use std::collections::HashMap;

use atlantis_api::config::{ApiConfig, GateMode};
use atlantis_api::{AppState, router};
use atlantis_core::config::{AuthConfig, ProviderConfig, ProviderType};
use atlantis_core::models::auth::User;
use axum::body::Body;
use axum::http::header::{AUTHORIZATION, COOKIE, LOCATION, SET_COOKIE, WWW_AUTHENTICATE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tower::ServiceExt;

// =============================================================================
// Fixtures
// =============================================================================

fn state(auth: AuthConfig, gate: GateMode) -> AppState {
    AppState::from_config(ApiConfig {
        bind_addr: "127.0.0.1:0".into(),
        auth,
        gate,
    })
    .expect("app state")
}

fn google() -> ProviderConfig {
    ProviderConfig {
        provider_type: ProviderType::OAuth2,
        id: "google".into(),
        name: "Google".into(),
        client_id: "google-client".into(),
        client_secret: "google-secret".into(),
        redirect_url: "http://localhost:4141/auth/callback?provider=google".into(),
        ..ProviderConfig::default()
    }
}

fn basic(admin: bool) -> AuthConfig {
    AuthConfig {
        enable_basic_auth: true,
        basic_auth_user: "atlantis".into(),
        basic_auth_pass: "secret".into(),
        admin_groups: if admin { vec!["atlantis".into()] } else { vec![] },
        ..AuthConfig::default()
    }
}

fn basic_auth(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

async fn send(state: &AppState, uri: &str, headers: &[(&str, String)]) -> Response {
    send_with(state, "GET", uri, headers, Body::empty()).await
}

async fn send_with(
    state: &AppState,
    method: &str,
    uri: &str,
    headers: &[(&str, String)],
    body: Body,
) -> Response {
    let mut req = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        req = req.header(*name, value.as_str());
    }
    router(state.clone())
        .oneshot(req.body(body).unwrap())
        .await
        .expect("request")
}

async fn json_body(resp: Response) -> Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("parse JSON")
}

async fn text_body(resp: Response) -> String {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("read body");
    String::from_utf8(body.to_vec()).expect("utf-8")
}

fn location(resp: &Response) -> String {
    resp.headers()
        .get(LOCATION)
        .expect("location header")
        .to_str()
        .unwrap()
        .to_string()
}

/// `name=value` part of the first `Set-Cookie` header.
fn set_cookie(headers: &HeaderMap) -> (String, String) {
    let raw = headers
        .get(SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap()
        .to_string();
    let pair = raw.split(';').next().unwrap().to_string();
    (pair, raw)
}

fn query(url: &str) -> HashMap<String, String> {
    url::Url::parse(url)
        .unwrap()
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

// =============================================================================
// Gate
// =============================================================================

#[tokio::test]
async fn single_oauth_provider_redirects_straight_to_it() {
    let state = state(
        AuthConfig {
            providers: vec![google()],
            ..AuthConfig::default()
        },
        GateMode::Full,
    );
    let resp = send(&state, "/", &[]).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let to = location(&resp);
    assert!(to.starts_with("https://accounts.google.com/"), "{to}");
    assert_eq!(query(&to)["client_id"], "google-client");
}

#[tokio::test]
async fn several_providers_redirect_to_chooser() {
    let mut config = basic(false);
    config.providers.push(google());
    let state = state(config, GateMode::Full);

    let resp = send(&state, "/me", &[]).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");

    let resp = send(&state, "/login", &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let page = text_body(resp).await;
    assert!(page.contains("href=\"/auth/login/google\""), "{page}");
    assert!(page.contains("Sign in with Google"), "{page}");
    assert!(page.contains("HTTP Basic"), "{page}");
}

#[tokio::test]
async fn no_providers_is_unauthorized() {
    let state = state(AuthConfig::default(), GateMode::Full);
    let resp = send(&state, "/", &[]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_is_public() {
    let state = state(AuthConfig::default(), GateMode::Full);
    let resp = send(&state, "/healthz", &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await["status"], "ok");
}

#[tokio::test]
async fn basic_credentials_resolve_identity() {
    let state = state(basic(false), GateMode::Full);
    let resp = send(
        &state,
        "/me",
        &[(AUTHORIZATION.as_str(), basic_auth("atlantis", "secret"))],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await;
    assert_eq!(me["id"], "atlantis");
    assert_eq!(me["roles"], json!(["user"]));
    assert_eq!(me["is_admin"], false);
    let perms = me["permissions"].as_array().unwrap();
    assert!(perms.contains(&json!("repo:read")));
    assert!(!perms.contains(&json!("plan:apply")));

    let resp = send(
        &state,
        "/me",
        &[(AUTHORIZATION.as_str(), basic_auth("atlantis", "wrong"))],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    assert_eq!(location(&resp), "/login");
}

// =============================================================================
// Callback
// =============================================================================

#[tokio::test]
async fn callback_rejects_bad_requests() {
    let mut config = basic(false);
    config.providers.push(google());
    let state = state(config, GateMode::Full);

    for uri in [
        "/auth/callback?code=c&state=s",
        "/auth/callback?provider=nope&code=c&state=s",
        "/auth/callback?provider=basic&code=c&state=s",
        "/auth/callback?provider=google&state=s",
        "/auth/callback?provider=google&code=c",
        "/auth/callback?provider=google&code=c&state=forged",
        "/auth/callback?error=access_denied",
    ] {
        let resp = send(&state, uri, &[]).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert!(resp.headers().get(SET_COOKIE).is_none(), "{uri}");
    }
}

#[tokio::test]
async fn login_start_rejects_unknown_provider() {
    let state = state(basic(false), GateMode::Full);
    let resp = send(&state, "/auth/login/nope", &[]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let resp = send(&state, "/auth/login/basic", &[]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

async fn stub_token(Form(params): Form<HashMap<String, String>>) -> (StatusCode, Json<Value>) {
    if params.get("code").map(String::as_str) != Some("good-code") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_grant"})));
    }
    (
        StatusCode::OK,
        Json(json!({"access_token": "stub-access", "token_type": "Bearer"})),
    )
}

async fn stub_userinfo(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    let ok = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok()) == Some("Bearer stub-access");
    if !ok {
        return (StatusCode::UNAUTHORIZED, Json(json!({})));
    }
    (
        StatusCode::OK,
        Json(json!({"sub": "stub|7", "email": "erin@example.com", "name": "Erin"})),
    )
}

async fn start_stub_idp() -> String {
    let app = Router::new()
        .route("/token", post(stub_token))
        .route("/userinfo", get(stub_userinfo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn full_redirect_login_then_logout() {
    let base = start_stub_idp().await;
    let stub = ProviderConfig {
        provider_type: ProviderType::OAuth2,
        id: "stub".into(),
        name: "Stub".into(),
        client_id: "stub-client".into(),
        client_secret: "stub-secret".into(),
        redirect_url: "http://localhost:4141/auth/callback?provider=stub".into(),
        auth_url: format!("{base}/authorize"),
        token_url: format!("{base}/token"),
        user_info_url: format!("{base}/userinfo"),
        ..ProviderConfig::default()
    };
    let mut config = basic(false);
    config.providers.push(stub);
    let state = state(config, GateMode::Full);

    // Start the flow and pick up the issued state.
    let resp = send(&state, "/auth/login/stub", &[]).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
    let login_state = query(&location(&resp))["state"].clone();

    // Callback sets the cookie and goes home.
    let uri = format!("/auth/callback?provider=stub&code=good-code&state={login_state}");
    let resp = send(&state, &uri, &[]).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/");
    let (cookie, raw) = set_cookie(resp.headers());
    assert!(cookie.starts_with("atlantis_session="), "{raw}");
    assert!(raw.contains("HttpOnly"), "{raw}");
    assert!(raw.contains("SameSite=Lax"), "{raw}");
    assert!(raw.contains("Path=/"), "{raw}");

    // The state is single-use.
    let resp = send(&state, &uri, &[]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    // The cookie now identifies the user.
    let resp = send(&state, "/me", &[(COOKIE.as_str(), cookie.clone())]).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = json_body(resp).await;
    assert_eq!(me["id"], "stub|7");
    assert_eq!(me["roles"], json!(["user"]));

    // Logout drops the session and clears the cookie.
    let resp = send(&state, "/auth/logout", &[(COOKIE.as_str(), cookie.clone())]).await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&resp), "/auth/login");
    let (cleared, raw) = set_cookie(resp.headers());
    assert_eq!(cleared, "atlantis_session=");
    assert!(raw.contains("Max-Age=0"), "{raw}");
    assert!(state.auth.sessions().is_empty());

    let resp = send(&state, "/me", &[(COOKIE.as_str(), cookie)]).await;
    assert_eq!(resp.status(), StatusCode::FOUND);
}

#[tokio::test]
async fn rejected_code_is_bad_request() {
    let base = start_stub_idp().await;
    let stub = ProviderConfig {
        provider_type: ProviderType::OAuth2,
        id: "stub".into(),
        name: "Stub".into(),
        client_id: "stub-client".into(),
        client_secret: "stub-secret".into(),
        redirect_url: "http://localhost:4141/auth/callback?provider=stub".into(),
        auth_url: format!("{base}/authorize"),
        token_url: format!("{base}/token"),
        user_info_url: format!("{base}/userinfo"),
        ..ProviderConfig::default()
    };
    let state = state(
        AuthConfig {
            providers: vec![stub],
            ..AuthConfig::default()
        },
        GateMode::Full,
    );
    let resp = send(&state, "/auth/login/stub", &[]).await;
    let login_state = query(&location(&resp))["state"].clone();
    let uri = format!("/auth/callback?provider=stub&code=bad-code&state={login_state}");
    let resp = send(&state, &uri, &[]).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(state.auth.sessions().is_empty());
}

// =============================================================================
// Role administration
// =============================================================================

#[tokio::test]
async fn admin_manages_roles() {
    let state = state(basic(true), GateMode::Full);
    let admin = [(AUTHORIZATION.as_str(), basic_auth("atlantis", "secret"))];

    let resp = send(&state, "/admin/roles", &admin).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let roles = json_body(resp).await;
    let names: Vec<&str> = roles
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["admin", "developer", "superadmin", "user"]);

    let mut headers = admin.to_vec();
    headers.push(("content-type", "application/json".into()));
    let body = json!({
        "name": "release",
        "permissions": ["plan:apply", "lock:force"],
        "description": "Release managers"
    });
    let resp = send_with(
        &state,
        "POST",
        "/admin/roles",
        &headers,
        Body::from(body.to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    assert!(state.auth.permission_checker().role("release").is_some());

    let bad = json!({"name": "broken", "permissions": ["plan:launch"]});
    let resp = send_with(
        &state,
        "POST",
        "/admin/roles",
        &headers,
        Body::from(bad.to_string()),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(state.auth.permission_checker().role("broken").is_none());

    let resp = send_with(&state, "DELETE", "/admin/roles/release", &admin, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    let resp = send_with(&state, "DELETE", "/admin/roles/release", &admin, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let resp = send_with(&state, "DELETE", "/admin/roles/admin", &admin, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn plain_user_cannot_manage_roles() {
    let state = state(basic(false), GateMode::Full);
    let session = state
        .auth
        .authenticate_user(&User::with_id("eve"))
        .expect("session");
    let cookie = [(COOKIE.as_str(), format!("atlantis_session={}", session.id))];

    let resp = send(&state, "/admin/roles", &cookie).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send_with(&state, "DELETE", "/admin/roles/user", &cookie, Body::empty()).await;
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
    let resp = send(&state, "/", &cookie).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(text_body(resp).await.contains("Signed in as eve"));
}

// =============================================================================
// Legacy gate
// =============================================================================

#[tokio::test]
async fn legacy_gate_challenges_without_credentials() {
    let state = state(basic(false), GateMode::LegacyBasic);

    let resp = send(&state, "/", &[]).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(WWW_AUTHENTICATE));

    let resp = send(
        &state,
        "/",
        &[(AUTHORIZATION.as_str(), basic_auth("atlantis", "secret"))],
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&state, "/healthz", &[]).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
