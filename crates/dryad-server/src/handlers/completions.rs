//! Text completion handler.

use std::sync::Arc;

use axum::{extract::State, Json};
use chrono::Utc;
use dryad_runtime::{GenerationLimits, GenerationSession, TracingTelemetry};
use dryad_sampling::SamplingPipeline;
use uuid::Uuid;

use crate::{
    error::ServerError,
    models::{finish_reason, CompletionChoice, CompletionRequest, CompletionResponse, Usage},
    state::AppState,
};

/// Handle `POST /v1/completions`.
///
/// The request waits for exclusive use of the backend, then generates on a
/// blocking thread. If the client disconnects, this future is dropped and
/// the drop guard cancels the generation at its next step.
pub async fn handle_completion(
    State(state): State<AppState>,
    Json(req): Json<CompletionRequest>,
) -> Result<Json<CompletionResponse>, ServerError> {
    validate(&req)?;
    let pipeline = SamplingPipeline::from_params(
        &req.sampling_params(state.config.default_temperature),
    )?;
    let limits = GenerationLimits::new(req.max_tokens.unwrap_or(state.config.max_tokens));

    let mut guard = state.sessions.acquire().await;
    let cancel = guard.cancellation_token();
    let cancel_on_disconnect = cancel.clone().drop_guard();
    let request_id = format!("cmpl-{}", Uuid::new_v4());
    tracing::info!(
        %request_id,
        session_id = %guard.session_id(),
        max_tokens = limits.max_new_tokens,
        "completion started"
    );

    let prompt = req.prompt;
    let result = tokio::task::spawn_blocking(move || {
        let mut session = GenerationSession::new(pipeline, limits)
            .with_cancellation(cancel)
            .with_telemetry(Arc::new(TracingTelemetry));
        session.start(guard.backend_mut(), &prompt)
    })
    .await
    .map_err(|err| ServerError::Internal(err.to_string()))?;
    cancel_on_disconnect.disarm();

    let completion = result?;
    let created = Utc::now().timestamp() as u64;
    tracing::info!(
        %request_id,
        stop_reason = ?completion.stop_reason,
        completion_tokens = completion.output.tokens.len(),
        "completion finished"
    );

    Ok(Json(CompletionResponse {
        id: request_id,
        object: "text_completion".to_string(),
        created,
        model: state.config.model_name.clone(),
        choices: vec![CompletionChoice {
            index: 0,
            text: completion.output.text,
            finish_reason: finish_reason(completion.stop_reason).to_string(),
        }],
        usage: Usage::new(completion.prompt_tokens, completion.output.tokens.len()),
    }))
}

/// Reject parameters the sampling pipeline would otherwise accept silently.
fn validate(req: &CompletionRequest) -> Result<(), ServerError> {
    if let Some(p) = req.top_p {
        if !(p > 0.0 && p <= 1.0) {
            return Err(ServerError::InvalidRequest(format!(
                "top_p must be in (0, 1], got {p}"
            )));
        }
    }
    for (name, value) in [
        ("dynatemp_min", req.dynatemp_min),
        ("dynatemp_max", req.dynatemp_max),
        ("dynatemp_exponent", req.dynatemp_exponent),
    ] {
        if let Some(v) = value {
            if !(v.is_finite() && v >= 0.0) {
                return Err(ServerError::InvalidRequest(format!(
                    "{name} must be a non-negative number, got {v}"
                )));
            }
        }
    }
    Ok(())
}
