//! GET /health — liveness probe.

use axum::Json;
use serde_json::json;

use crate::config::APP_VERSION;

pub async fn check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": APP_VERSION,
    }))
}
