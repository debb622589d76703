//! End-to-end generation through the facade.

use dryad::sampling::{LogitTransform, ProbabilityTransform};
use dryad::*;

#[test]
fn params_drive_a_full_generation() {
    let params = SamplingParams {
        temperature: Some(0.0),
        ..SamplingParams::default()
    };
    let pipeline = SamplingPipeline::from_params(&params).unwrap();
    let mut backend = MockBackend::new(128).with_reply("Once upon a time");
    let mut session = GenerationSession::new(pipeline, GenerationLimits::new(64));

    let completion = session.start(&mut backend, "Tell me a story").unwrap();

    assert_eq!(completion.text(), "Once upon a time");
    assert_eq!(completion.stop_reason, StopReason::EndOfGeneration);
    assert_eq!(completion.prompt_tokens, "Tell me a story".len());
    assert_eq!(completion.metrics.generated_tokens, completion.tokens().len());
}

#[test]
fn full_pipeline_keeps_a_peaked_choice() {
    let pipeline = SamplingPipeline::new()
        .with_logit_transform(LogitTransform::Temperature(0.9))
        .with_logit_transform(LogitTransform::TopK(8))
        .with_probability_transform(ProbabilityTransform::DynamicTemperature {
            min_temp: 0.5,
            max_temp: 1.5,
            exponent: 1.0,
        })
        .with_probability_transform(ProbabilityTransform::TopP(0.9))
        .with_seed(7);
    let mut backend = MockBackend::new(128).with_reply("abc");
    let mut session = GenerationSession::new(pipeline, GenerationLimits::new(16));

    assert_eq!(session.start(&mut backend, "go").unwrap().text(), "abc");
}

#[test]
fn small_context_overflows_instead_of_truncating_mid_stream() {
    let mut backend = MockBackend::new(8).with_reply("0123456789");
    let mut session = GenerationSession::new(
        SamplingPipeline::new().with_logit_transform(LogitTransform::TopK(1)),
        GenerationLimits::new(64),
    );

    let completion = session.start(&mut backend, "abcdef").unwrap();

    // Six prompt tokens leave room to decode two more; the third is sampled
    // but has no position left.
    assert_eq!(completion.stop_reason, StopReason::ContextOverflow);
    assert_eq!(completion.text(), "012");
    assert_eq!(backend.decoded_positions(), &[0, 1, 2, 3, 4, 5, 6, 7]);
}

#[test]
fn version_is_set() {
    assert!(!VERSION.is_empty());
}
