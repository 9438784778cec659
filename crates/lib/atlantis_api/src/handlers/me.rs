//! Current-identity endpoint.

use atlantis_core::auth::Permission;
use axum::Json;
use axum::extract::State;
use axum::response::Html;
use serde::{Deserialize, Serialize};

use crate::AppState;
use crate::middleware::auth::AuthUser;

/// Response body for `GET /me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeResponse {
    pub id: String,
    pub email: String,
    pub name: String,
    pub provider: String,
    pub roles: Vec<String>,
    pub groups: Vec<String>,
    /// Effective permissions: role grants plus direct grants.
    pub permissions: Vec<Permission>,
    pub is_admin: bool,
}

/// `GET /me`: who the caller is and what they may do.
pub async fn me_handler(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> Json<MeResponse> {
    let checker = state.auth.permission_checker();
    let permissions = checker.user_permissions(Some(&user)).into_iter().collect();
    let is_admin = checker.is_admin(Some(&user));
    Json(MeResponse {
        id: user.id,
        email: user.email,
        name: user.name,
        provider: user.provider,
        roles: user.roles,
        groups: user.groups,
        permissions,
        is_admin,
    })
}

/// `GET /`: landing page after login.
pub async fn index_handler(user: Option<AuthUser>) -> Html<String> {
    let greeting = match user {
        Some(AuthUser(user)) if !user.name.is_empty() => format!("Signed in as {}", user.name),
        Some(AuthUser(user)) => format!("Signed in as {}", user.id),
        None => "Atlantis".to_string(),
    };
    Html(format!(
        "<!DOCTYPE html>\n<html>\n<body>\n<p>{}</p>\n<p><a href=\"/auth/logout\">Log out</a></p>\n</body>\n</html>\n",
        crate::handlers::auth::escape_html(&greeting)
    ))
}
