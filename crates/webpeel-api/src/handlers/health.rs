//! Public health endpoint.

use crate::state::AppState;
use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde_json::json;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime": state.started_at.elapsed().as_secs(),
        "timestamp": Utc::now().to_rfc3339(),
        "components": {
            "cache_entries": state.peel.cache().len(),
            "jobs": state.jobs.len(),
        },
    }))
}
