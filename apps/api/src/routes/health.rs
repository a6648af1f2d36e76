use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns service status, configured AI providers and tracker state.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "recipedeck",
        "ai_providers": state.llm.provider_names(),
        "import_tracker": {
            "running": state.tracker.is_running(),
            "active_jobs": state.tracker.active_count().await,
        }
    }))
}
