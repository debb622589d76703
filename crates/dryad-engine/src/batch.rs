//! Fixed-capacity decode batches.
//!
//! A [`TokenBatch`] stages tokens plus per-token metadata (position, sequence
//! ids, logits request) for one backend `decode` call. Storage is reserved
//! once and reused across decode steps via [`TokenBatch::reset`].
//!
//! # Invariants
//! - `len() <= capacity()` at all times; appending to a full batch panics
//! - every slot carries between 1 and `max_sequences()` sequence ids

use std::ops::{Deref, DerefMut};

use crate::{EngineError, InferenceBackend, Position, Result, SeqId, TokenId, DEFAULT_SEQ_ID};

/// Fills the unused tail of a slot's sequence id row.
pub const UNUSED_SEQ_ID: SeqId = -1;

/// Staging buffer for one decode call.
#[derive(Debug, Clone)]
pub struct TokenBatch {
    tokens: Vec<TokenId>,
    positions: Vec<Position>,
    /// Flattened `[capacity, max_sequences]` sequence id table.
    seq_ids: Vec<SeqId>,
    n_seq_ids: Vec<usize>,
    logits: Vec<bool>,
    capacity: usize,
    max_sequences: usize,
}

impl TokenBatch {
    /// Reserve storage for `capacity` tokens, each tagged with at most
    /// `max_sequences` sequence ids.
    ///
    /// # Errors
    /// - `Allocation`: zero capacity, or the allocator refused the reservation
    pub fn new(capacity: usize, max_sequences: usize) -> Result<Self> {
        let max_sequences = max_sequences.max(1);
        if capacity == 0 {
            return Err(EngineError::Allocation { capacity });
        }
        let alloc_err = |_| EngineError::Allocation { capacity };

        let mut tokens = Vec::new();
        tokens.try_reserve_exact(capacity).map_err(alloc_err)?;
        let mut positions = Vec::new();
        positions.try_reserve_exact(capacity).map_err(alloc_err)?;
        let mut n_seq_ids = Vec::new();
        n_seq_ids.try_reserve_exact(capacity).map_err(alloc_err)?;
        let mut logits = Vec::new();
        logits.try_reserve_exact(capacity).map_err(alloc_err)?;
        let seq_len = capacity
            .checked_mul(max_sequences)
            .ok_or(EngineError::Allocation { capacity })?;
        let mut seq_ids = Vec::new();
        seq_ids.try_reserve_exact(seq_len).map_err(alloc_err)?;

        Ok(Self {
            tokens,
            positions,
            seq_ids,
            n_seq_ids,
            logits,
            capacity,
            max_sequences,
        })
    }

    /// Write one token into the next free slot.
    ///
    /// # Panics
    /// When the batch is full or `seq_ids` is empty or longer than
    /// `max_sequences()`. Both indicate a sizing bug in the caller.
    pub fn append(
        &mut self,
        token: TokenId,
        position: Position,
        seq_ids: &[SeqId],
        want_logits: bool,
    ) {
        let n = self.tokens.len();
        assert!(
            n < self.capacity,
            "TokenBatch capacity ({}) exceeded",
            self.capacity
        );
        assert!(
            !seq_ids.is_empty() && seq_ids.len() <= self.max_sequences,
            "slot {} has {} sequence ids, allowed 1..={}",
            n,
            seq_ids.len(),
            self.max_sequences
        );

        self.tokens.push(token);
        self.positions.push(position);
        self.seq_ids.extend_from_slice(seq_ids);
        self.seq_ids.resize((n + 1) * self.max_sequences, UNUSED_SEQ_ID);
        self.n_seq_ids.push(seq_ids.len());
        self.logits.push(want_logits);
    }

    /// Forget all slots while keeping the reserved storage.
    pub fn reset(&mut self) {
        self.tokens.clear();
        self.positions.clear();
        self.seq_ids.clear();
        self.n_seq_ids.clear();
        self.logits.clear();
    }

    /// Replace the contents with `tokens` at positions `0..tokens.len()` on
    /// the default sequence.
    ///
    /// With `logits_for_last`, only the final slot requests logits; the
    /// intermediate positions of a prompt are never sampled from.
    pub fn load_sequence(&mut self, tokens: &[TokenId], logits_for_last: bool) {
        self.reset();
        let last = tokens.len().saturating_sub(1);
        for (i, &token) in tokens.iter().enumerate() {
            let want_logits = logits_for_last && i == last;
            self.append(token, i as Position, &[DEFAULT_SEQ_ID], want_logits);
        }
    }

    /// Run the backend decode over the current contents.
    ///
    /// The batch is left untouched on failure so the caller can inspect what
    /// was rejected; reset it before reuse.
    pub fn submit<B: InferenceBackend + ?Sized>(&self, backend: &mut B) -> Result<()> {
        match backend.decode(self) {
            0 => Ok(()),
            code => Err(EngineError::Decode { code }),
        }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn max_sequences(&self) -> usize {
        self.max_sequences
    }

    pub fn tokens(&self) -> &[TokenId] {
        &self.tokens
    }

    pub fn positions(&self) -> &[Position] {
        &self.positions
    }

    /// Sequence ids of slot `index`.
    pub fn seq_ids(&self, index: usize) -> &[SeqId] {
        let start = index * self.max_sequences;
        &self.seq_ids[start..start + self.n_seq_ids[index]]
    }

    pub fn wants_logits(&self, index: usize) -> bool {
        self.logits[index]
    }

    /// Index of the last slot that requested logits.
    pub fn logits_index(&self) -> Option<usize> {
        self.logits.iter().rposition(|&wanted| wanted)
    }
}

/// A batch borrowed from a backend for the duration of one generation.
///
/// Acquired through [`InferenceBackend::acquire_batch`] and handed back via
/// [`InferenceBackend::release_batch`] when the lease is dropped, whichever
/// way the owning scope exits.
pub struct BatchLease<'a, B: InferenceBackend + ?Sized> {
    backend: &'a mut B,
    batch: TokenBatch,
}

impl<'a, B: InferenceBackend + ?Sized> BatchLease<'a, B> {
    pub fn acquire(backend: &'a mut B, capacity: usize) -> Result<Self> {
        let batch = backend.acquire_batch(capacity)?;
        Ok(Self { backend, batch })
    }

    /// Submit the leased batch to the backend it came from.
    pub fn submit(&mut self) -> Result<()> {
        self.batch.submit(&mut *self.backend)
    }

    pub fn backend(&self) -> &B {
        &*self.backend
    }

    /// Logits for the last slot of the current batch that requested them.
    pub fn last_logits(&self) -> Result<&[f32]> {
        let index = self.batch.logits_index().ok_or(EngineError::Logits {
            index: self.batch.len(),
            len: self.batch.len(),
        })?;
        self.backend.logits(index)
    }
}

impl<B: InferenceBackend + ?Sized> Deref for BatchLease<'_, B> {
    type Target = TokenBatch;

    fn deref(&self) -> &TokenBatch {
        &self.batch
    }
}

impl<B: InferenceBackend + ?Sized> DerefMut for BatchLease<'_, B> {
    fn deref_mut(&mut self) -> &mut TokenBatch {
        &mut self.batch
    }
}

impl<B: InferenceBackend + ?Sized> Drop for BatchLease<'_, B> {
    fn drop(&mut self) {
        self.backend.release_batch(&mut self.batch);
    }
}
