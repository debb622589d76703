//! Health check handler.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// Handle health check requests. `busy` is true while a generation holds the backend.
pub async fn handle_health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "model": state.config.model_name,
        "busy": state.sessions.is_busy(),
    }))
}
