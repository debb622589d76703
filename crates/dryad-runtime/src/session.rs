//! The generation state machine.
//!
//! One [`GenerationSession::start`] call drives a prompt through tokenize,
//! prefill and an incremental decode/sample loop:
//!
//! ```text
//! Idle -> Tokenized -> Decoded -> Sampled -> (Decoded | Sampled)* -> Completed | Failed
//! ```
//!
//! The batch is leased from the backend for the whole call and handed back
//! before `start` returns, on success and on failure alike.

use std::sync::Arc;

use dryad_engine::{
    BatchLease, ContextWindow, EngineError, InferenceBackend, TokenId, DEFAULT_SEQ_ID,
};
use dryad_sampling::{SamplingError, SamplingPipeline};
use tokio_util::sync::CancellationToken;

use crate::telemetry::{GenerationTimer, InferenceMetrics, NoopTelemetry, TelemetryHook};

/// Where a session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Tokenized,
    Decoded,
    Sampled,
    Completed,
    Failed,
}

/// Why a successful generation stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The prompt tokenized to nothing; no decode was issued.
    EmptyPrompt,
    /// The backend sampled its end-of-generation token.
    EndOfGeneration,
    /// `max_new_tokens` tokens were produced.
    MaxTokens,
    /// The window reached the context limit.
    ContextOverflow,
    /// The cancellation token fired between steps.
    Cancelled,
}

/// Per-call generation bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerationLimits {
    pub max_new_tokens: usize,
    /// Caps the window below the backend's own context length.
    pub max_context: Option<usize>,
}

impl GenerationLimits {
    pub fn new(max_new_tokens: usize) -> Self {
        Self {
            max_new_tokens,
            max_context: None,
        }
    }

    pub fn with_max_context(mut self, max_context: usize) -> Self {
        self.max_context = Some(max_context);
        self
    }
}

impl Default for GenerationLimits {
    fn default() -> Self {
        Self::new(128)
    }
}

/// Tokens produced by a session and their text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationOutput {
    pub tokens: Vec<TokenId>,
    pub text: String,
}

/// A finished generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub output: GenerationOutput,
    /// Prompt tokens actually decoded, after truncation.
    pub prompt_tokens: usize,
    /// Prompt tokens dropped from the front to fit the window.
    pub dropped_tokens: usize,
    pub stop_reason: StopReason,
    pub metrics: InferenceMetrics,
}

impl Completion {
    pub fn text(&self) -> &str {
        &self.output.text
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.output.tokens
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerateError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Sampling(#[from] SamplingError),
}

/// A failed generation, with whatever was produced before the failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("generation failed after {} tokens: {error}", .partial.tokens.len())]
pub struct GenerationFailure {
    #[source]
    pub error: GenerateError,
    pub partial: GenerationOutput,
}

impl GenerationFailure {
    fn empty(error: impl Into<GenerateError>) -> Self {
        Self {
            error: error.into(),
            partial: GenerationOutput::default(),
        }
    }
}

/// Drives one prompt to completion against a backend.
pub struct GenerationSession {
    pipeline: SamplingPipeline,
    limits: GenerationLimits,
    state: SessionState,
    cancel: CancellationToken,
    telemetry: Arc<dyn TelemetryHook>,
}

impl GenerationSession {
    pub fn new(pipeline: SamplingPipeline, limits: GenerationLimits) -> Self {
        Self {
            pipeline,
            limits,
            state: SessionState::Idle,
            cancel: CancellationToken::new(),
            telemetry: Arc::new(NoopTelemetry),
        }
    }

    /// Checked once per decode step; cancelling stops at the next boundary.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn with_telemetry(mut self, hook: Arc<dyn TelemetryHook>) -> Self {
        self.telemetry = hook;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn limits(&self) -> &GenerationLimits {
        &self.limits
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Generate a continuation of `prompt`.
    ///
    /// Holding `&mut B` for the whole call is what makes the backend
    /// exclusive to this session.
    pub fn start<B: InferenceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        prompt: &str,
    ) -> Result<Completion, GenerationFailure> {
        self.state = SessionState::Idle;
        let result = self.run(backend, prompt);
        match &result {
            Ok(completion) => {
                self.state = SessionState::Completed;
                tracing::debug!(
                    stop_reason = ?completion.stop_reason,
                    generated = completion.output.tokens.len(),
                    "generation finished"
                );
            }
            Err(failure) => {
                self.state = SessionState::Failed;
                tracing::warn!(
                    error = %failure.error,
                    generated = failure.partial.tokens.len(),
                    "generation failed"
                );
            }
        }
        result
    }

    fn run<B: InferenceBackend + ?Sized>(
        &mut self,
        backend: &mut B,
        prompt: &str,
    ) -> Result<Completion, GenerationFailure> {
        let prompt_tokens = backend.tokenize(prompt).map_err(GenerationFailure::empty)?;
        self.state = SessionState::Tokenized;

        if prompt_tokens.is_empty() {
            tracing::debug!("empty prompt, nothing to decode");
            return Ok(Completion {
                output: GenerationOutput::default(),
                prompt_tokens: 0,
                dropped_tokens: 0,
                stop_reason: StopReason::EmptyPrompt,
                metrics: InferenceMetrics::default(),
            });
        }

        let backend_context = backend.context_length();
        let max_context = self
            .limits
            .max_context
            .map_or(backend_context, |cap| cap.min(backend_context));
        let (mut window, dropped_tokens) = ContextWindow::from_prompt(prompt_tokens, max_context);
        if dropped_tokens > 0 {
            tracing::warn!(
                dropped_tokens,
                max_context,
                "prompt exceeds context window, dropping oldest tokens"
            );
        }
        let prompt_len = window.len();

        if self.limits.max_new_tokens == 0 {
            return Ok(Completion {
                output: GenerationOutput::default(),
                prompt_tokens: prompt_len,
                dropped_tokens,
                stop_reason: StopReason::MaxTokens,
                metrics: InferenceMetrics {
                    prompt_tokens: prompt_len,
                    ..InferenceMetrics::default()
                },
            });
        }

        let vocab_size = backend.vocab_size();
        let mut timer = GenerationTimer::start(prompt_len, Arc::clone(&self.telemetry));
        let mut tokens = Vec::new();

        backend.clear_context();
        let outcome = match BatchLease::acquire(&mut *backend, max_context) {
            Ok(mut lease) => self.decode_loop(
                &mut lease,
                &mut window,
                &mut tokens,
                &mut timer,
                vocab_size,
            ),
            Err(err) => Err(err.into()),
        };

        let stop_reason = match outcome {
            Ok(stop_reason) => stop_reason,
            Err(error) => {
                let text = match detokenize_all(&*backend, &tokens) {
                    Ok(text) => text,
                    Err(err) => {
                        tracing::warn!(error = %err, "partial output could not be detokenized");
                        String::new()
                    }
                };
                return Err(GenerationFailure {
                    error,
                    partial: GenerationOutput { tokens, text },
                });
            }
        };

        let metrics = timer.finish();
        let text = match detokenize_all(&*backend, &tokens) {
            Ok(text) => text,
            Err(err) => {
                return Err(GenerationFailure {
                    error: err.into(),
                    partial: GenerationOutput {
                        tokens,
                        text: String::new(),
                    },
                })
            }
        };

        Ok(Completion {
            output: GenerationOutput { tokens, text },
            prompt_tokens: prompt_len,
            dropped_tokens,
            stop_reason,
            metrics,
        })
    }

    /// Prefill the window, then sample one token per step until a stop
    /// condition. Produced tokens land in `tokens` even when a later step
    /// fails.
    fn decode_loop<B: InferenceBackend + ?Sized>(
        &mut self,
        lease: &mut BatchLease<'_, B>,
        window: &mut ContextWindow,
        tokens: &mut Vec<TokenId>,
        timer: &mut GenerationTimer,
        vocab_size: usize,
    ) -> Result<StopReason, GenerateError> {
        tracing::debug!(
            prompt_tokens = window.len(),
            max_context = window.max_context(),
            "prefill"
        );
        lease.load_sequence(window.as_slice(), true);
        lease.submit()?;
        self.state = SessionState::Decoded;
        timer.prefill_done();

        for step in 0..self.limits.max_new_tokens {
            if self.cancel.is_cancelled() {
                tracing::debug!(step, "generation cancelled");
                return Ok(StopReason::Cancelled);
            }

            let token = self.pipeline.select(lease.last_logits()?, vocab_size)?;
            self.state = SessionState::Sampled;
            tracing::trace!(step, token, "sampled");

            if lease.backend().is_end_of_generation(token) {
                return Ok(StopReason::EndOfGeneration);
            }
            timer.token_sampled();
            tokens.push(token);
            window.append(token);

            if tokens.len() == self.limits.max_new_tokens {
                return Ok(StopReason::MaxTokens);
            }
            if window.exceeds_limit() {
                tracing::warn!(
                    max_context = window.max_context(),
                    generated = tokens.len(),
                    "context window full, stopping"
                );
                return Ok(StopReason::ContextOverflow);
            }

            let Some(position) = window.last_position() else {
                return Ok(StopReason::ContextOverflow);
            };
            lease.reset();
            lease.append(token, position, &[DEFAULT_SEQ_ID], true);
            lease.submit()?;
            self.state = SessionState::Decoded;
        }

        Ok(StopReason::MaxTokens)
    }
}

impl std::fmt::Debug for GenerationSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationSession")
            .field("pipeline", &self.pipeline)
            .field("limits", &self.limits)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

/// Concatenate every token's bytes, then decode once, so characters split
/// across tokens come out whole.
pub fn detokenize_all<B: InferenceBackend + ?Sized>(
    backend: &B,
    tokens: &[TokenId],
) -> Result<String, EngineError> {
    let mut bytes = Vec::with_capacity(tokens.len());
    for &token in tokens {
        bytes.extend(backend.detokenize(token)?);
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
