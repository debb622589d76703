//! Logit and probability transforms.
//!
//! Each transform is a tagged variant applied as one step of a fold over the
//! pipeline's ordered list. Logit transforms run before the softmax,
//! probability transforms after it.

use crate::{SamplingError, SamplingResult};

/// Transform over a raw logit vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LogitTransform {
    /// Divide every logit by the temperature. Must be finite and > 0.
    Temperature(f32),
    /// Mask everything below the k-th highest logit to `-inf`. `0` disables.
    TopK(usize),
}

impl LogitTransform {
    pub fn apply(&self, mut logits: Vec<f32>) -> SamplingResult<Vec<f32>> {
        match *self {
            LogitTransform::Temperature(t) => {
                if !(t.is_finite() && t > 0.0) {
                    return Err(SamplingError::InvalidTemperature);
                }
                if (t - 1.0).abs() > 1e-6 {
                    for logit in &mut logits {
                        *logit /= t;
                    }
                }
            }
            LogitTransform::TopK(k) => apply_top_k(&mut logits, k),
        }
        Ok(logits)
    }
}

/// Transform over a normalized probability vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbabilityTransform {
    /// Entropy-adaptive temperature.
    ///
    /// The effective temperature is
    /// `min_temp + (max_temp - min_temp) * (H / H_max)^exponent`, where `H` is
    /// the entropy of the distribution and `H_max = ln(n)`. The distribution
    /// is then re-exponentiated by `1 / effective` and renormalized. A
    /// passthrough when `max_temp <= min_temp`.
    DynamicTemperature {
        min_temp: f32,
        max_temp: f32,
        exponent: f32,
    },
    /// Nucleus filtering: keep the smallest set of most likely tokens whose
    /// mass reaches `p`, then renormalize.
    TopP(f32),
}

impl ProbabilityTransform {
    pub fn apply(&self, probs: Vec<f32>) -> Vec<f32> {
        match *self {
            ProbabilityTransform::DynamicTemperature {
                min_temp,
                max_temp,
                exponent,
            } => apply_dynamic_temperature(probs, min_temp, max_temp, exponent),
            ProbabilityTransform::TopP(p) => apply_top_p(probs, p),
        }
    }
}

/// Numerically stable softmax.
///
/// Non-finite input (NaN, `+inf`, all `-inf`) yields non-finite output,
/// which the categorical draw rejects.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max_logit).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.iter().map(|&e| e / sum).collect()
}

fn apply_top_k(logits: &mut [f32], k: usize) {
    if k == 0 || k >= logits.len() {
        return;
    }

    let mut sorted = logits.to_vec();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let threshold = sorted[k - 1];
    for logit in logits.iter_mut() {
        if *logit < threshold {
            *logit = f32::NEG_INFINITY;
        }
    }
}

fn apply_top_p(probs: Vec<f32>, p: f32) -> Vec<f32> {
    if probs.is_empty() {
        return probs;
    }

    let mut sorted = probs.clone();
    sorted.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

    let mut cumsum = 0.0;
    let mut cutoff_prob = sorted[0];
    for &prob in &sorted {
        cumsum += prob;
        cutoff_prob = prob;
        if cumsum >= p {
            break;
        }
    }

    let mut result: Vec<f32> = probs
        .iter()
        .map(|&pr| if pr >= cutoff_prob { pr } else { 0.0 })
        .collect();

    let sum: f32 = result.iter().sum();
    if sum > 0.0 {
        for pr in &mut result {
            *pr /= sum;
        }
    }
    result
}

fn apply_dynamic_temperature(
    probs: Vec<f32>,
    min_temp: f32,
    max_temp: f32,
    exponent: f32,
) -> Vec<f32> {
    if max_temp <= min_temp || probs.len() <= 1 {
        return probs;
    }

    let max_prob = probs.iter().cloned().fold(0.0, f32::max);
    if max_prob <= 0.0 {
        return probs;
    }

    let max_entropy = (probs.len() as f32).ln();
    let entropy: f32 = probs
        .iter()
        .filter(|&&p| p > 0.0)
        .map(|&p| -p * p.ln())
        .sum();
    let normalized = (entropy / max_entropy).clamp(0.0, 1.0);
    let temp = min_temp + (max_temp - min_temp) * normalized.powf(exponent);
    let temp = temp.max(f32::MIN_POSITIVE);

    // p^(1/t) relative to the max, in log space so tiny t cannot underflow
    // every entry to zero.
    let log_max = max_prob.ln();
    let scaled: Vec<f32> = probs
        .iter()
        .map(|&p| ((p.ln() - log_max) / temp).exp())
        .collect();
    let sum: f32 = scaled.iter().sum();
    scaled.into_iter().map(|s| s / sum).collect()
}
