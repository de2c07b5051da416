//! Request-level orchestration: validate, gate by language, extract features,
//! embed, fuse, classify.

use std::sync::Arc;

use detectai_stylometry::StylometricVector;
use tracing::debug;

use crate::error::DetectError;
use crate::registry::ModelRegistry;

/// Language tags detection is supported for. Requests whose tags do not
/// intersect this set are rejected before any model work.
pub const ALLOWED_TAGS: &[&str] = &["python", "java"];

/// Verdict cutoff. Strictly greater-than: a probability of exactly 0.5
/// classifies as human. This tie-break is part of the service contract.
pub const AI_PROBABILITY_THRESHOLD: f32 = 0.5;

/// Outcome of a single detection request.
#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct DetectionResult {
    pub ai_probability: f32,
    pub is_ai_generated: bool,
}

impl DetectionResult {
    #[must_use]
    pub fn from_probability(probability: f32) -> Self {
        Self {
            ai_probability: probability,
            is_ai_generated: probability > AI_PROBABILITY_THRESHOLD,
        }
    }
}

/// The detection pipeline, parameterized by an explicitly injected registry.
pub struct DetectionPipeline {
    registry: Arc<ModelRegistry>,
}

impl DetectionPipeline {
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Classify `code` as AI-generated or human-written.
    ///
    /// Validation and the language-tag policy run before any model work, so
    /// rejected requests never trigger a model load. The first accepted
    /// request pays the one-time bundle load; afterwards the call is pure
    /// per-request computation.
    pub fn detect(&self, code: &str, tags: &[String]) -> Result<DetectionResult, DetectError> {
        if code.is_empty() {
            return Err(DetectError::EmptyCode);
        }
        if !tags.iter().any(|tag| ALLOWED_TAGS.contains(&tag.as_str())) {
            debug!(?tags, "rejected unsupported language tags");
            return Err(DetectError::TagNotAllowed);
        }

        let bundle = self.registry.ensure_loaded()?;

        let stylometric = detectai_stylometry::extract(code);
        let embedding = bundle.embed(code)?;
        let features = fuse(embedding, &stylometric);
        let probability = bundle.predict_probability(&features)?;

        debug!(probability, "classified snippet");
        Ok(DetectionResult::from_probability(probability))
    }
}

/// Concatenate `[embedding ‖ stylometric]`.
///
/// The order and total length (hidden size + 17) are fixed at classifier
/// training time; this is an external contract, not a tunable.
fn fuse(embedding: Vec<f32>, stylometric: &StylometricVector) -> Vec<f32> {
    let mut fused = embedding;
    fused.extend_from_slice(stylometric);
    fused
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use detectai_stylometry::FEATURE_COUNT;

    use super::*;

    fn failing_pipeline() -> (DetectionPipeline, Arc<AtomicUsize>) {
        let load_attempts = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&load_attempts);
        let registry = ModelRegistry::with_loader(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(DetectError::model_load("artifacts unavailable in tests"))
        });
        (DetectionPipeline::new(Arc::new(registry)), load_attempts)
    }

    fn tags(names: &[&str]) -> Vec<String> {
        names.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn empty_code_is_rejected_before_model_work() {
        let (pipeline, load_attempts) = failing_pipeline();

        let err = pipeline.detect("", &tags(&["python"])).unwrap_err();
        assert!(matches!(err, DetectError::EmptyCode));
        assert_eq!(err.to_string(), "No code provided");
        assert_eq!(load_attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_code_wins_over_bad_tags() {
        let (pipeline, _) = failing_pipeline();
        let err = pipeline.detect("", &tags(&["javascript"])).unwrap_err();
        assert!(matches!(err, DetectError::EmptyCode));
    }

    #[test]
    fn unsupported_tags_are_rejected_before_model_work() {
        let (pipeline, load_attempts) = failing_pipeline();

        let err = pipeline
            .detect("const x = 1;", &tags(&["javascript"]))
            .unwrap_err();
        assert!(matches!(err, DetectError::TagNotAllowed));
        assert_eq!(err.to_string(), "Tag not allowed");
        assert_eq!(load_attempts.load(Ordering::SeqCst), 0);

        let err = pipeline.detect("x = 1", &[]).unwrap_err();
        assert!(matches!(err, DetectError::TagNotAllowed));
        assert_eq!(load_attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn one_allowed_tag_is_enough() {
        let (pipeline, load_attempts) = failing_pipeline();

        // Policy passes, so the pipeline reaches the (failing) model load.
        let err = pipeline
            .detect("x = 1", &tags(&["javascript", "python"]))
            .unwrap_err();
        assert!(matches!(err, DetectError::ModelLoad(_)));
        assert_eq!(load_attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_load_is_retried_on_the_next_request() {
        let (pipeline, load_attempts) = failing_pipeline();

        for _ in 0..2 {
            let err = pipeline.detect("x = 1", &tags(&["python"])).unwrap_err();
            assert!(matches!(err, DetectError::ModelLoad(_)));
        }
        assert_eq!(load_attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn fused_vector_is_embedding_then_stylometric() {
        let embedding = vec![0.25f32; 768];
        let stylometric = detectai_stylometry::extract("def foo():\n    pass\n");

        let fused = fuse(embedding, &stylometric);
        assert_eq!(fused.len(), 768 + FEATURE_COUNT);
        assert!(fused[..768].iter().all(|&v| v == 0.25));
        assert_eq!(&fused[768..], &stylometric[..]);
    }

    #[test]
    fn verdict_threshold_is_strict() {
        assert!(!DetectionResult::from_probability(0.5).is_ai_generated);
        assert!(!DetectionResult::from_probability(0.25).is_ai_generated);
        assert!(DetectionResult::from_probability(0.500_1).is_ai_generated);
        assert!(DetectionResult::from_probability(1.0).is_ai_generated);
    }

    #[test]
    fn result_serializes_to_wire_shape() {
        let json = serde_json::to_value(DetectionResult::from_probability(0.75)).unwrap();
        assert_eq!(json["ai_probability"], 0.75);
        assert_eq!(json["is_ai_generated"], true);
    }
}
