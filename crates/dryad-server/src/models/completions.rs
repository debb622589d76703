//! Text completion request/response types.

use dryad_runtime::StopReason;
use dryad_sampling::SamplingParams;
use serde::{Deserialize, Serialize};

use crate::models::common::Usage;

/// Text completion request.
///
/// Beyond the OpenAI fields it accepts `top_k`, `seed` and the dynamic
/// temperature knobs.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletionRequest {
    #[serde(default)]
    pub model: Option<String>,
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    pub seed: Option<u64>,
    pub dynatemp_min: Option<f32>,
    pub dynatemp_max: Option<f32>,
    pub dynatemp_exponent: Option<f32>,
}

impl CompletionRequest {
    /// Sampling knobs, falling back to `default_temperature`.
    pub fn sampling_params(&self, default_temperature: f32) -> SamplingParams {
        SamplingParams {
            temperature: Some(self.temperature.unwrap_or(default_temperature)),
            top_k: self.top_k,
            top_p: self.top_p,
            dynatemp_min: self.dynatemp_min,
            dynatemp_max: self.dynatemp_max,
            dynatemp_exponent: self.dynatemp_exponent,
            seed: self.seed,
        }
    }
}

/// Text completion choice.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionChoice {
    pub index: usize,
    pub text: String,
    pub finish_reason: String,
}

/// Text completion response.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionResponse {
    pub id: String,
    pub object: String,
    pub created: u64,
    pub model: String,
    pub choices: Vec<CompletionChoice>,
    pub usage: Usage,
}

/// OpenAI `finish_reason` for a stop condition: `"length"` when a token
/// budget ran out, `"stop"` otherwise.
pub fn finish_reason(stop: StopReason) -> &'static str {
    match stop {
        StopReason::MaxTokens | StopReason::ContextOverflow => "length",
        StopReason::EndOfGeneration | StopReason::Cancelled | StopReason::EmptyPrompt => "stop",
    }
}
