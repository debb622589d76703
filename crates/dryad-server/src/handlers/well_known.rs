//! Service discovery document.

use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

const REPOSITORY: &str = "https://github.com/allura-org/dryad";

/// Handle `GET /.well-known/serviceinfo`.
pub async fn handle_serviceinfo(State(state): State<AppState>) -> Json<Value> {
    let mut api = serde_json::Map::new();
    if state.config.serve_openai {
        api.insert(
            "openai".to_string(),
            json!({
                "name": "OpenAI API",
                "base_url": state.config.openai_base_url(),
                "version": 1,
            }),
        );
    }

    Json(json!({
        "version": 0.1,
        "software": {
            "name": "Dryad",
            "version": env!("CARGO_PKG_VERSION"),
            "repository": REPOSITORY,
            "homepage": REPOSITORY,
        },
        "api": api,
    }))
}
