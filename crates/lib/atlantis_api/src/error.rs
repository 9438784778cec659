//! Application error types.

use atlantis_core::auth::AuthError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

/// Convenience alias for handler return types.
pub type AppResult<T> = Result<T, AppError>;

/// JSON error body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Application-level errors with HTTP status mapping.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal server error")]
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match &self {
            AppError::Validation(m) => (StatusCode::BAD_REQUEST, "validation_error", m.as_str()),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, "not_found", m.as_str()),
            AppError::Unauthorized(m) => (StatusCode::UNAUTHORIZED, "unauthorized", m.as_str()),
            AppError::Forbidden(m) => (StatusCode::FORBIDDEN, "forbidden", m.as_str()),
            AppError::Internal(detail) => {
                error!(%detail, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error",
                )
            }
        };
        let body = Json(ErrorResponse {
            error: error.to_string(),
            message: message.to_string(),
        });
        (status, body).into_response()
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        if e.is_auth_failure() {
            return AppError::Unauthorized(e.to_string());
        }
        match e {
            AuthError::InsufficientPermissions(_) => AppError::Forbidden(e.to_string()),
            AuthError::InvalidPermission(_)
            | AuthError::EmptyRoleName
            | AuthError::CannotRemoveDefaultRole(_) => AppError::Validation(e.to_string()),
            AuthError::RoleNotFound(_) | AuthError::ProviderNotFound(_) => {
                AppError::NotFound(e.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn error_body_shape() {
        let resp = AppError::Forbidden("plan:apply required".into()).into_response();
        assert_eq!(resp.status(), StatusCode::FORBIDDEN);
        let json = body_json(resp).await;
        assert_eq!(json["error"], "forbidden");
        assert_eq!(json["message"], "plan:apply required");
    }

    #[tokio::test]
    async fn internal_details_are_hidden() {
        let resp = AppError::Internal("lock poisoned at 0xdead".into()).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(resp).await;
        assert_eq!(json["message"], "Internal server error");
    }

    #[test]
    fn auth_error_mapping() {
        let status = |e: AuthError| AppError::from(e).into_response().status();
        assert_eq!(status(AuthError::SessionExpired), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::InvalidCredentials), StatusCode::UNAUTHORIZED);
        assert_eq!(status(AuthError::Unauthenticated), StatusCode::UNAUTHORIZED);
        assert_eq!(
            status(AuthError::InsufficientPermissions("user:delete".into())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(status(AuthError::EmptyRoleName), StatusCode::BAD_REQUEST);
        assert_eq!(
            status(AuthError::CannotRemoveDefaultRole("admin".into())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status(AuthError::RoleNotFound("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(
            status(AuthError::ExchangeFailed("HTTP 500".into())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
