//! # dryad-runtime
//!
//! Drives generation on top of `dryad-engine` and `dryad-sampling`.
//!
//! - [`GenerationSession`]: prompt in, [`Completion`] out, through the
//!   tokenize / prefill / decode-sample loop
//! - [`telemetry`]: TTFT and throughput measurement with pluggable hooks
//! - [`MockBackend`]: deterministic byte-level backend for the CLI demo and
//!   for tests

pub mod mock;
pub mod session;
pub mod telemetry;

pub use mock::MockBackend;
pub use session::{
    detokenize_all, Completion, GenerateError, GenerationFailure, GenerationLimits,
    GenerationOutput, GenerationSession, SessionState, StopReason,
};
pub use telemetry::{
    GenerationTimer, InferenceMetrics, NoopTelemetry, RecordingTelemetry, TelemetryHook,
    TracingTelemetry,
};
