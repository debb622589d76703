//! Per-generation timing.
//!
//! A [`GenerationTimer`] lives for one `GenerationSession::start` call and
//! reports to a shared [`TelemetryHook`] as the session moves from prefill to
//! sampling to completion.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Timing and token counts for one generation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InferenceMetrics {
    /// Milliseconds from the start of the call until prefill logits were ready.
    pub ttft_ms: f64,
    /// Sampled tokens per second after prefill.
    pub tokens_per_sec: f64,
    pub prompt_tokens: usize,
    pub generated_tokens: usize,
    pub total_time_ms: f64,
}

/// Observer for session milestones. Every callback defaults to nothing.
pub trait TelemetryHook: Send + Sync {
    fn on_prefill(&self, _ttft_ms: f64) {}

    /// `index` counts from 1.
    fn on_token(&self, _index: usize, _elapsed_ms: f64) {}

    fn on_finish(&self, _metrics: &InferenceMetrics) {}
}

#[derive(Debug)]
pub struct NoopTelemetry;

impl TelemetryHook for NoopTelemetry {}

/// Keeps the most recent report; clones share it.
#[derive(Debug, Clone, Default)]
pub struct RecordingTelemetry {
    latest: Arc<Mutex<Option<InferenceMetrics>>>,
}

impl RecordingTelemetry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_metrics(&self) -> Option<InferenceMetrics> {
        self.latest.lock().ok().and_then(|latest| latest.clone())
    }
}

impl TelemetryHook for RecordingTelemetry {
    fn on_finish(&self, metrics: &InferenceMetrics) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(metrics.clone());
        }
    }
}

/// Logs each milestone through `tracing`.
#[derive(Debug)]
pub struct TracingTelemetry;

impl TelemetryHook for TracingTelemetry {
    fn on_prefill(&self, ttft_ms: f64) {
        tracing::debug!(ttft_ms, "prefill done");
    }

    fn on_token(&self, index: usize, elapsed_ms: f64) {
        tracing::trace!(index, elapsed_ms, "token");
    }

    fn on_finish(&self, metrics: &InferenceMetrics) {
        tracing::info!(
            prompt_tokens = metrics.prompt_tokens,
            generated_tokens = metrics.generated_tokens,
            ttft_ms = metrics.ttft_ms,
            tokens_per_sec = metrics.tokens_per_sec,
            total_time_ms = metrics.total_time_ms,
            "generation timing"
        );
    }
}

fn millis(span: Duration) -> f64 {
    span.as_secs_f64() * 1000.0
}

/// Stopwatch for one generation.
pub struct GenerationTimer {
    started: Instant,
    /// Time spent in prefill, once it has finished.
    prefill: Option<Duration>,
    prompt_tokens: usize,
    generated: usize,
    hook: Arc<dyn TelemetryHook>,
}

impl GenerationTimer {
    pub fn start(prompt_tokens: usize, hook: Arc<dyn TelemetryHook>) -> Self {
        Self {
            started: Instant::now(),
            prefill: None,
            prompt_tokens,
            generated: 0,
            hook,
        }
    }

    pub fn prefill_done(&mut self) {
        let prefill = self.started.elapsed();
        self.prefill = Some(prefill);
        self.hook.on_prefill(millis(prefill));
    }

    pub fn token_sampled(&mut self) {
        self.generated += 1;
        self.hook
            .on_token(self.generated, millis(self.started.elapsed()));
    }

    pub fn finish(self) -> InferenceMetrics {
        let total = self.started.elapsed();
        let prefill = self.prefill.unwrap_or_default();
        let decode_secs = total.saturating_sub(prefill).as_secs_f64();
        let tokens_per_sec = if self.generated == 0 || decode_secs <= 0.0 {
            0.0
        } else {
            self.generated as f64 / decode_secs
        };

        let metrics = InferenceMetrics {
            ttft_ms: millis(prefill),
            tokens_per_sec,
            prompt_tokens: self.prompt_tokens,
            generated_tokens: self.generated,
            total_time_ms: millis(total),
        };
        self.hook.on_finish(&metrics);
        metrics
    }
}
