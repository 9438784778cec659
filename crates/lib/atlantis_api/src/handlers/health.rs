//! Liveness probe.

use axum::Json;
use serde_json::{Value, json};

/// `GET /healthz`
pub async fn healthz_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": atlantis_core::version(),
    }))
}
