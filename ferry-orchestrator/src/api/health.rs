//! Health Check API Handler

use axum::Json;
use serde_json::{Value, json};

/// GET /health
/// Liveness probe
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ferry-orchestrator",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
