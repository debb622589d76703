//! # dryad-sampling
//!
//! Sampling pipeline for dryad: turns one logit vector into one token.
//!
//! A [`SamplingPipeline`] runs, in caller-specified order:
//! 1. [`LogitTransform`]s over the raw logits (temperature, top-k)
//! 2. a numerically stable softmax
//! 3. [`ProbabilityTransform`]s over the distribution (dynamic temperature, top-p)
//! 4. a weighted categorical draw from a [`RandomSource`]
//!
//! Order is part of the contract: the same transforms in a different order
//! produce a different distribution.

mod rng;
mod transform;

pub use rng::{RandomSource, SeededRng};
pub use transform::{softmax, LogitTransform, ProbabilityTransform};

use dryad_engine::TokenId;
use rand::SeedableRng;

/// Sampling error type.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SamplingError {
    #[error("expected {expected} logits, got {got}")]
    InvalidLogits { expected: usize, got: usize },
    #[error("temperature must be > 0")]
    InvalidTemperature,
    #[error("distribution is empty")]
    EmptyDistribution,
    #[error("distribution contains NaN or infinite values")]
    NonFinite,
    #[error("distribution has zero total mass")]
    ZeroMass,
}

pub type SamplingResult<T> = std::result::Result<T, SamplingError>;

/// Request-level sampling knobs, as they arrive from an API caller.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplingParams {
    pub temperature: Option<f32>,
    pub top_k: Option<usize>,
    pub top_p: Option<f32>,
    pub dynatemp_min: Option<f32>,
    pub dynatemp_max: Option<f32>,
    pub dynatemp_exponent: Option<f32>,
    pub seed: Option<u64>,
}

/// Ordered transforms plus the random source used for the final draw.
pub struct SamplingPipeline {
    before_softmax: Vec<LogitTransform>,
    after_softmax: Vec<ProbabilityTransform>,
    rng: Box<dyn RandomSource + Send>,
}

impl SamplingPipeline {
    /// A pipeline with no transforms (plain softmax sampling), seeded with 42.
    pub fn new() -> Self {
        Self {
            before_softmax: Vec::new(),
            after_softmax: Vec::new(),
            rng: Box::new(SeededRng::new(42)),
        }
    }

    /// Translate request parameters into transforms.
    ///
    /// Order: temperature, top-k (pre-softmax); dynamic temperature, top-p
    /// (post-softmax). A temperature of exactly `0` means greedy decoding and
    /// becomes `TopK(1)`. Without a seed the draw uses an entropy-seeded
    /// `StdRng`.
    pub fn from_params(params: &SamplingParams) -> SamplingResult<Self> {
        let mut pipeline = Self::new();

        match params.temperature {
            Some(t) if t == 0.0 => {
                pipeline = pipeline.with_logit_transform(LogitTransform::TopK(1));
            }
            Some(t) if !(t.is_finite() && t > 0.0) => {
                return Err(SamplingError::InvalidTemperature);
            }
            Some(t) => {
                pipeline = pipeline.with_logit_transform(LogitTransform::Temperature(t));
            }
            None => {}
        }

        if let Some(k) = params.top_k.filter(|&k| k > 0) {
            pipeline = pipeline.with_logit_transform(LogitTransform::TopK(k));
        }

        if let (Some(min_temp), Some(max_temp)) = (params.dynatemp_min, params.dynatemp_max) {
            let exponent = params.dynatemp_exponent.unwrap_or(1.0);
            pipeline = pipeline.with_probability_transform(
                ProbabilityTransform::DynamicTemperature {
                    min_temp,
                    max_temp,
                    exponent,
                },
            );
        }

        if let Some(p) = params.top_p.filter(|&p| p < 1.0) {
            pipeline = pipeline.with_probability_transform(ProbabilityTransform::TopP(p));
        }

        pipeline = match params.seed {
            Some(seed) => pipeline.with_seed(seed),
            None => pipeline.with_rng(rand::rngs::StdRng::from_entropy()),
        };

        Ok(pipeline)
    }

    pub fn with_logit_transform(mut self, transform: LogitTransform) -> Self {
        self.before_softmax.push(transform);
        self
    }

    pub fn with_probability_transform(mut self, transform: ProbabilityTransform) -> Self {
        self.after_softmax.push(transform);
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(SeededRng::new(seed))
    }

    pub fn with_rng(mut self, rng: impl RandomSource + Send + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn logit_transforms(&self) -> &[LogitTransform] {
        &self.before_softmax
    }

    pub fn probability_transforms(&self) -> &[ProbabilityTransform] {
        &self.after_softmax
    }

    /// Run the transforms and softmax without drawing.
    ///
    /// Only the first `vocab_size` logits are used; backends may pad.
    pub fn distribution(&self, logits: &[f32], vocab_size: usize) -> SamplingResult<Vec<f32>> {
        if logits.len() < vocab_size {
            return Err(SamplingError::InvalidLogits {
                expected: vocab_size,
                got: logits.len(),
            });
        }

        let logits = self
            .before_softmax
            .iter()
            .try_fold(logits[..vocab_size].to_vec(), |acc, t| t.apply(acc))?;
        let probs = softmax(&logits);
        Ok(self
            .after_softmax
            .iter()
            .fold(probs, |acc, t| t.apply(acc)))
    }

    /// Select one token from `logits`.
    pub fn select(&mut self, logits: &[f32], vocab_size: usize) -> SamplingResult<TokenId> {
        let probs = self.distribution(logits, vocab_size)?;
        let index = sample_categorical(&probs, self.rng.as_mut())?;
        Ok(index as TokenId)
    }
}

impl Default for SamplingPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SamplingPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SamplingPipeline")
            .field("before_softmax", &self.before_softmax)
            .field("after_softmax", &self.after_softmax)
            .finish_non_exhaustive()
    }
}

/// Draw an index with probability proportional to its weight.
///
/// Weights are not required to sum to exactly 1; the draw is scaled by the
/// actual total so a slightly off distribution still samples correctly.
pub fn sample_categorical<R: RandomSource + ?Sized>(
    probs: &[f32],
    rng: &mut R,
) -> SamplingResult<usize> {
    if probs.is_empty() {
        return Err(SamplingError::EmptyDistribution);
    }
    if probs.iter().any(|p| !p.is_finite()) {
        return Err(SamplingError::NonFinite);
    }
    let total: f32 = probs.iter().filter(|&&p| p > 0.0).sum();
    if total <= 0.0 {
        return Err(SamplingError::ZeroMass);
    }

    let r = rng.next_f32() * total;
    let mut cumsum = 0.0;
    for (i, &prob) in probs.iter().enumerate() {
        if prob <= 0.0 {
            continue;
        }
        cumsum += prob;
        if r < cumsum {
            return Ok(i);
        }
    }

    // Rounding can leave r just above the final cumulative sum.
    probs
        .iter()
        .rposition(|&p| p > 0.0)
        .ok_or(SamplingError::ZeroMass)
}
