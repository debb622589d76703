//! HTTP error handling and response mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dryad_engine::EngineError;
use dryad_runtime::{GenerateError, GenerationFailure};
use dryad_sampling::SamplingError;
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Generation(#[from] GenerationFailure),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<SamplingError> for ServerError {
    fn from(err: SamplingError) -> Self {
        ServerError::InvalidRequest(err.to_string())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ServerError::Generation(GenerationFailure {
                error: GenerateError::Engine(EngineError::Tokenization(msg)),
                ..
            }) => (StatusCode::BAD_REQUEST, "invalid_request_error", msg),
            ServerError::Generation(failure) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "server_error",
                failure.to_string(),
            ),
            ServerError::InvalidRequest(msg) => {
                (StatusCode::BAD_REQUEST, "invalid_request_error", msg)
            }
            ServerError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", msg)
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "param": null,
                "code": null,
            }
        }));

        (status, body).into_response()
    }
}
