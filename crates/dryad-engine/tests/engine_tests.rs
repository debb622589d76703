//! Integration tests for dryad-engine.
//!
//! Validates:
//! - InferenceBackend can be implemented by mock backends and used as a trait object
//! - Batch submission maps decode status codes to errors
//! - BatchLease hands the batch back on every exit path
//! - Batches and windows compose into the prefill → incremental decode pattern

use dryad_engine::*;

// ---------------------------------------------------------------------------
// Mock Backend
// ---------------------------------------------------------------------------

/// Echoes the last decoded token as a one-hot logit vector.
struct EchoBackend {
    vocab: usize,
    n_ctx: usize,
    status: i32,
    logits: Vec<Vec<f32>>,
    decoded: Vec<(Vec<TokenId>, Vec<Position>)>,
    acquired: usize,
    released: usize,
    cleared: usize,
}

impl EchoBackend {
    fn new() -> Self {
        Self {
            vocab: 16,
            n_ctx: 8,
            status: 0,
            logits: Vec::new(),
            decoded: Vec::new(),
            acquired: 0,
            released: 0,
            cleared: 0,
        }
    }
}

impl InferenceBackend for EchoBackend {
    fn tokenize(&self, text: &str) -> Result<Vec<TokenId>> {
        text.split_whitespace()
            .map(|w| {
                w.parse::<TokenId>()
                    .map_err(|e| EngineError::Tokenization(e.to_string()))
            })
            .collect()
    }

    fn detokenize(&self, token: TokenId) -> Result<Vec<u8>> {
        Ok(token.to_string().into_bytes())
    }

    fn vocab_size(&self) -> usize {
        self.vocab
    }

    fn context_length(&self) -> usize {
        self.n_ctx
    }

    fn is_end_of_generation(&self, token: TokenId) -> bool {
        token == 0
    }

    fn clear_context(&mut self) {
        self.cleared += 1;
    }

    fn acquire_batch(&mut self, capacity: usize) -> Result<TokenBatch> {
        self.acquired += 1;
        TokenBatch::new(capacity, 1)
    }

    fn release_batch(&mut self, _batch: &mut TokenBatch) {
        self.released += 1;
    }

    fn decode(&mut self, batch: &TokenBatch) -> i32 {
        if self.status != 0 {
            return self.status;
        }
        self.decoded
            .push((batch.tokens().to_vec(), batch.positions().to_vec()));
        self.logits = batch
            .tokens()
            .iter()
            .map(|&t| {
                let mut row = vec![0.0; self.vocab];
                row[t as usize % self.vocab] = 1.0;
                row
            })
            .collect();
        0
    }

    fn logits(&self, batch_index: usize) -> Result<&[f32]> {
        self.logits
            .get(batch_index)
            .map(Vec::as_slice)
            .ok_or(EngineError::Logits {
                index: batch_index,
                len: self.logits.len(),
            })
    }
}

// ---------------------------------------------------------------------------
// Submission
// ---------------------------------------------------------------------------

#[test]
fn submit_success_records_batch() {
    let mut backend = EchoBackend::new();
    let mut batch = TokenBatch::new(4, 1).unwrap();
    batch.load_sequence(&[3, 4, 5], true);

    batch.submit(&mut backend).unwrap();

    assert_eq!(backend.decoded, vec![(vec![3, 4, 5], vec![0, 1, 2])]);
    assert_eq!(backend.logits(2).unwrap()[5], 1.0);
}

#[test]
fn submit_nonzero_status_is_decode_error() {
    let mut backend = EchoBackend::new();
    backend.status = 1;
    let mut batch = TokenBatch::new(4, 1).unwrap();
    batch.load_sequence(&[3, 4], true);

    assert_eq!(
        batch.submit(&mut backend),
        Err(EngineError::Decode { code: 1 })
    );
    // Contents stay inspectable after a rejected decode.
    assert_eq!(batch.tokens(), &[3, 4]);
}

#[test]
fn trait_object_dispatch() {
    let mut backend: Box<dyn InferenceBackend> = Box::new(EchoBackend::new());
    assert_eq!(backend.tokenize("1 2 3").unwrap(), vec![1, 2, 3]);
    assert_eq!(backend.detokenize(12).unwrap(), b"12".to_vec());

    let mut batch = backend.acquire_batch(2).unwrap();
    batch.load_sequence(&[9], true);
    batch.submit(&mut backend).unwrap();
    assert_eq!(backend.logits(0).unwrap().len(), 16);
}

#[test]
fn missing_logits_slot_errors() {
    let backend = EchoBackend::new();
    assert_eq!(
        backend.logits(3),
        Err(EngineError::Logits { index: 3, len: 0 })
    );
}

#[test]
fn error_messages_carry_context() {
    assert_eq!(
        EngineError::Decode { code: -1 }.to_string(),
        "decode returned status -1"
    );
    assert_eq!(
        EngineError::Allocation { capacity: 4 }.to_string(),
        "batch allocation failed for capacity 4"
    );
}

// ---------------------------------------------------------------------------
// Leases
// ---------------------------------------------------------------------------

#[test]
fn lease_releases_on_drop() {
    let mut backend = EchoBackend::new();
    {
        let mut lease = BatchLease::acquire(&mut backend, 4).unwrap();
        lease.load_sequence(&[1, 2], true);
        lease.submit().unwrap();
        assert_eq!(lease.last_logits().unwrap()[2], 1.0);
    }
    assert_eq!(backend.acquired, 1);
    assert_eq!(backend.released, 1);
}

#[test]
fn lease_releases_on_error_path() {
    fn run(backend: &mut EchoBackend) -> Result<()> {
        let mut lease = BatchLease::acquire(backend, 4)?;
        lease.load_sequence(&[1], true);
        lease.submit()?;
        Ok(())
    }

    let mut backend = EchoBackend::new();
    backend.status = 2;
    assert_eq!(run(&mut backend), Err(EngineError::Decode { code: 2 }));
    assert_eq!(backend.acquired, 1);
    assert_eq!(backend.released, 1);
}

#[test]
fn lease_releases_on_panic() {
    let mut backend = EchoBackend::new();
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        let mut lease = BatchLease::acquire(&mut backend, 1).unwrap();
        lease.append(1, 0, &[0], false);
        lease.append(2, 1, &[0], false);
    }));
    assert!(result.is_err());
    assert_eq!(backend.released, 1);
}

#[test]
fn lease_without_logits_request_errors() {
    let mut backend = EchoBackend::new();
    let mut lease = BatchLease::acquire(&mut backend, 4).unwrap();
    lease.load_sequence(&[1, 2], false);
    lease.submit().unwrap();
    assert!(matches!(
        lease.last_logits(),
        Err(EngineError::Logits { .. })
    ));
}

// ---------------------------------------------------------------------------
// Prefill + incremental decode
// ---------------------------------------------------------------------------

#[test]
fn truncated_window_then_incremental_positions() {
    let mut backend = EchoBackend::new();
    let prompt = backend.tokenize("1 2 3 4 5 6 7 8 9 10").unwrap();
    let (mut window, dropped) = ContextWindow::from_prompt(prompt, backend.context_length());
    assert_eq!(dropped, 2);
    assert_eq!(window.as_slice(), &[3, 4, 5, 6, 7, 8, 9, 10]);

    let capacity = window.max_context();
    let mut lease = BatchLease::acquire(&mut backend, capacity).unwrap();
    lease.load_sequence(window.as_slice(), true);
    lease.submit().unwrap();

    window.append(11);
    lease.reset();
    lease.append(11, window.last_position().unwrap(), &[DEFAULT_SEQ_ID], true);
    lease.submit().unwrap();
    drop(lease);

    assert_eq!(backend.decoded[0].1, (0..8).collect::<Vec<Position>>());
    assert_eq!(backend.decoded[1], (vec![11], vec![8]));
    assert!(window.exceeds_limit());
}
