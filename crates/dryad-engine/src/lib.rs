//! # dryad-engine
//!
//! The "narrow waist" of the dryad stack. Defines the [`InferenceBackend`] trait
//! that a neural backend (llama.cpp bindings, a test double, ...) implements, and
//! the two mutable resources the generation loop drives through it:
//!
//! - [`TokenBatch`]: fixed-capacity staging buffer submitted to `decode`
//! - [`ContextWindow`]: running token history with oldest-first truncation
//!
//! ## Design Notes
//!
//! ### Exclusive access
//! Backend methods that touch the inference context take `&mut self`. A
//! backend context is not reentrant, so holding `&mut B` is the right to
//! decode; callers that share a backend put it behind a lock.
//!
//! ### Token Type
//! `TokenId` is aliased as `i32` for FFI compatibility with llama.cpp style
//! backends, though token IDs are logically non-negative.

pub mod batch;
pub mod window;

pub use batch::{BatchLease, TokenBatch, UNUSED_SEQ_ID};
pub use window::ContextWindow;

pub type Result<T> = std::result::Result<T, EngineError>;

/// Token ID type (i32 for FFI compat; logically non-negative).
pub type TokenId = i32;

/// Position of a token within its sequence.
pub type Position = i32;

/// Sequence tag for multi-sequence batches. Dryad decodes a single sequence.
pub type SeqId = i32;

/// The only sequence dryad decodes.
pub const DEFAULT_SEQ_ID: SeqId = 0;

/// Errors raised at the backend boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("batch allocation failed for capacity {capacity}")]
    Allocation { capacity: usize },
    #[error("decode returned status {code}")]
    Decode { code: i32 },
    #[error("tokenization failed: {0}")]
    Tokenization(String),
    #[error("detokenization failed: {0}")]
    Detokenization(String),
    #[error("no logits for batch slot {index} (batch holds {len} tokens)")]
    Logits { index: usize, len: usize },
}

/// The inference backend contract consumed by the generation loop.
///
/// Everything above this trait (sampling, session, HTTP) depends on backend
/// *behavior*, not implementation details.
pub trait InferenceBackend: Send {
    /// Convert text into a sequence of token IDs.
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>>;

    /// Convert one token back into its text fragment.
    ///
    /// Fragments are raw bytes: a multi-byte character may be split across
    /// several tokens, so callers concatenate before decoding UTF-8.
    fn detokenize(&self, token: TokenId) -> Result<Vec<u8>>;

    /// Number of entries in every logit vector.
    fn vocab_size(&self) -> usize;

    /// Maximum number of positions the inference context can hold.
    fn context_length(&self) -> usize;

    /// Whether `token` marks the end of generation.
    fn is_end_of_generation(&self, token: TokenId) -> bool;

    /// Drop all cached positions so the next batch starts a fresh sequence.
    fn clear_context(&mut self);

    /// Allocate a batch with room for `capacity` tokens.
    fn acquire_batch(&mut self, capacity: usize) -> Result<TokenBatch> {
        TokenBatch::new(capacity, 1)
    }

    /// Return a batch obtained from [`acquire_batch`](Self::acquire_batch).
    fn release_batch(&mut self, _batch: &mut TokenBatch) {}

    /// Run the model over the batch. Returns `0` on success, a backend
    /// specific non-zero status otherwise.
    fn decode(&mut self, batch: &TokenBatch) -> i32;

    /// Logits produced by the last `decode` for the given batch slot.
    fn logits(&self, batch_index: usize) -> Result<&[f32]>;
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>> {
        (**self).tokenize(text)
    }

    fn detokenize(&self, token: TokenId) -> Result<Vec<u8>> {
        (**self).detokenize(token)
    }

    fn vocab_size(&self) -> usize {
        (**self).vocab_size()
    }

    fn context_length(&self) -> usize {
        (**self).context_length()
    }

    fn is_end_of_generation(&self, token: TokenId) -> bool {
        (**self).is_end_of_generation(token)
    }

    fn clear_context(&mut self) {
        (**self).clear_context()
    }

    fn acquire_batch(&mut self, capacity: usize) -> Result<TokenBatch> {
        (**self).acquire_batch(capacity)
    }

    fn release_batch(&mut self, batch: &mut TokenBatch) {
        (**self).release_batch(batch)
    }

    fn decode(&mut self, batch: &TokenBatch) -> i32 {
        (**self).decode(batch)
    }

    fn logits(&self, batch_index: usize) -> Result<&[f32]> {
        (**self).logits(batch_index)
    }
}
