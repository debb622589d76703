//! Deterministic in-process backend.
//!
//! [`MockBackend`] tokenizes text byte by byte and "predicts" a canned reply:
//! every decode that requests logits yields a row sharply peaked on the next
//! reply byte, then on [`EOG_TOKEN`] once the reply is exhausted. It keeps a
//! positional cache like a real KV context, so decode statuses behave the way
//! a llama.cpp style backend reports them.

use dryad_engine::{EngineError, InferenceBackend, Position, Result, TokenBatch, TokenId};

/// End-of-generation token; one past the byte range.
pub const EOG_TOKEN: TokenId = 256;

/// 256 byte tokens plus [`EOG_TOKEN`].
pub const VOCAB_SIZE: usize = 257;

pub const DEFAULT_REPLY: &str = "Hello from dryad!";

const PEAK_LOGIT: f32 = 40.0;

/// Decode status when the batch would overrun the context.
pub const STATUS_NO_SPACE: i32 = 1;
/// Decode status for a malformed batch (empty, or positions out of order).
pub const STATUS_INVALID_BATCH: i32 = -1;

#[derive(Debug, Clone)]
pub struct MockBackend {
    context_length: usize,
    reply: Vec<TokenId>,
    cursor: usize,
    /// Next position the context expects.
    cached: usize,
    rows: Vec<(usize, Vec<f32>)>,
    last_batch_len: usize,
    failure: Option<(usize, i32)>,
    decode_calls: usize,
    batches_acquired: usize,
    batches_released: usize,
    positions: Vec<Position>,
}

impl MockBackend {
    pub fn new(context_length: usize) -> Self {
        Self {
            context_length,
            reply: tokenize_bytes(DEFAULT_REPLY),
            cursor: 0,
            cached: 0,
            rows: Vec::new(),
            last_batch_len: 0,
            failure: None,
            decode_calls: 0,
            batches_acquired: 0,
            batches_released: 0,
            positions: Vec::new(),
        }
    }

    /// Replay `reply` instead of the default.
    pub fn with_reply(mut self, reply: &str) -> Self {
        self.reply = tokenize_bytes(reply);
        self
    }

    /// Make the `call`-th decode (0-based) return `status`.
    pub fn with_decode_failure(mut self, call: usize, status: i32) -> Self {
        self.failure = Some((call, status));
        self
    }

    pub fn decode_calls(&self) -> usize {
        self.decode_calls
    }

    pub fn batches_acquired(&self) -> usize {
        self.batches_acquired
    }

    pub fn batches_released(&self) -> usize {
        self.batches_released
    }

    /// Positions decoded since the last `clear_context`, in order.
    pub fn decoded_positions(&self) -> &[Position] {
        &self.positions
    }

    fn next_row(&mut self) -> Vec<f32> {
        let target = self.reply.get(self.cursor).copied().unwrap_or(EOG_TOKEN);
        self.cursor += 1;
        let mut row = vec![0.0; VOCAB_SIZE];
        row[target as usize] = PEAK_LOGIT;
        row
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new(2048)
    }
}

fn tokenize_bytes(text: &str) -> Vec<TokenId> {
    text.bytes().map(TokenId::from).collect()
}

impl InferenceBackend for MockBackend {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>> {
        Ok(tokenize_bytes(text))
    }

    fn detokenize(&self, token: TokenId) -> Result<Vec<u8>> {
        match token {
            EOG_TOKEN => Ok(Vec::new()),
            _ => u8::try_from(token)
                .map(|byte| vec![byte])
                .map_err(|_| EngineError::Detokenization(format!("unknown token {token}"))),
        }
    }

    fn vocab_size(&self) -> usize {
        VOCAB_SIZE
    }

    fn context_length(&self) -> usize {
        self.context_length
    }

    fn is_end_of_generation(&self, token: TokenId) -> bool {
        token == EOG_TOKEN
    }

    fn clear_context(&mut self) {
        self.cursor = 0;
        self.cached = 0;
        self.rows.clear();
        self.last_batch_len = 0;
        self.positions.clear();
    }

    fn acquire_batch(&mut self, capacity: usize) -> Result<TokenBatch> {
        let batch = TokenBatch::new(capacity, 1)?;
        self.batches_acquired += 1;
        Ok(batch)
    }

    fn release_batch(&mut self, _batch: &mut TokenBatch) {
        self.batches_released += 1;
    }

    fn decode(&mut self, batch: &TokenBatch) -> i32 {
        let call = self.decode_calls;
        self.decode_calls += 1;
        self.rows.clear();
        self.last_batch_len = batch.len();

        if let Some((fail_call, status)) = self.failure {
            if fail_call == call {
                return status;
            }
        }
        if batch.is_empty() {
            return STATUS_INVALID_BATCH;
        }
        if self.cached + batch.len() > self.context_length {
            return STATUS_NO_SPACE;
        }
        let in_order = batch
            .positions()
            .iter()
            .enumerate()
            .all(|(i, &pos)| usize::try_from(pos).ok() == Some(self.cached + i));
        if !in_order {
            return STATUS_INVALID_BATCH;
        }

        self.cached += batch.len();
        self.positions.extend_from_slice(batch.positions());
        for index in 0..batch.len() {
            if batch.wants_logits(index) {
                let row = self.next_row();
                self.rows.push((index, row));
            }
        }
        0
    }

    fn logits(&self, batch_index: usize) -> Result<&[f32]> {
        self.rows
            .iter()
            .find(|(index, _)| *index == batch_index)
            .map(|(_, row)| row.as_slice())
            .ok_or(EngineError::Logits {
                index: batch_index,
                len: self.last_batch_len,
            })
    }
}
