//! Role administration endpoints.

use atlantis_core::auth::{Permission, Role};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::AppState;
use crate::error::AppResult;
use crate::middleware::auth::AuthUser;

/// Body for `POST /admin/roles`. Permissions are tags such as `plan:apply`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoleRequest {
    pub name: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// `GET /admin/roles`: the live role table, sorted by name.
pub async fn list_roles_handler(State(state): State<AppState>) -> Json<Vec<Role>> {
    Json(state.auth.permission_checker().roles())
}

/// `POST /admin/roles`: add or replace a role.
pub async fn create_role_handler(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Json(body): Json<CreateRoleRequest>,
) -> AppResult<(StatusCode, Json<Role>)> {
    let permissions = body
        .permissions
        .iter()
        .map(|tag| Permission::parse(tag))
        .collect::<Result<Vec<_>, _>>()?;
    let role = Role::new(body.name, permissions, body.description);
    state.auth.permission_checker().add_role(role.clone())?;
    info!(role = %role.name, by = %caller.id, "role saved");
    Ok((StatusCode::CREATED, Json(role)))
}

/// `DELETE /admin/roles/{name}`: remove a custom role.
pub async fn delete_role_handler(
    State(state): State<AppState>,
    AuthUser(caller): AuthUser,
    Path(name): Path<String>,
) -> AppResult<StatusCode> {
    state.auth.permission_checker().remove_role(&name)?;
    info!(role = %name, by = %caller.id, "role deleted");
    Ok(StatusCode::NO_CONTENT)
}
