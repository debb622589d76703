//! Model listing handler.

use axum::{extract::State, Json};

use crate::{
    models::{ModelCard, ModelList},
    state::AppState,
};

/// Handle `GET /v1/models`. Dryad serves exactly one model.
pub async fn handle_models(State(state): State<AppState>) -> Json<ModelList> {
    Json(ModelList {
        object: "list".to_string(),
        data: vec![ModelCard {
            id: state.config.model_name.clone(),
            object: "model".to_string(),
            owned_by: state.config.owned_by.clone(),
        }],
    })
}
