//! OpenAI-compatible request/response types.

pub mod common;
pub mod completions;
pub mod model_list;

pub use common::Usage;
pub use completions::{finish_reason, CompletionChoice, CompletionRequest, CompletionResponse};
pub use model_list::{ModelCard, ModelList};
