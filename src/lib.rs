//! Dryad: a small single-user LLM completion engine.
//!
//! This facade re-exports the core crates so a backend implementation only
//! needs one dependency:
//!
//! - [`engine`]: the [`InferenceBackend`] trait, batches, the context window
//! - [`sampling`]: the logit-to-token pipeline
//! - [`runtime`]: the generation session, telemetry and a mock backend

pub use dryad_engine as engine;
pub use dryad_runtime as runtime;
pub use dryad_sampling as sampling;

pub use dryad_engine::{ContextWindow, EngineError, InferenceBackend, TokenBatch, TokenId};
pub use dryad_runtime::{
    Completion, GenerationFailure, GenerationLimits, GenerationSession, MockBackend, StopReason,
};
pub use dryad_sampling::{SamplingParams, SamplingPipeline};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
