//! # detectai-inference
//!
//! Classifies a source-code snippet as AI-generated or human-written by
//! fusing a deterministic stylometric feature vector with a CodeBERT CLS
//! embedding and running the result through a pretrained ONNX classifier.
//!
//! The models are large and slow to load, so they live in a [`ModelRegistry`]
//! that loads them lazily exactly once and shares them read-only across
//! concurrent requests.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use detectai_inference::{DetectionPipeline, ModelPaths, ModelRegistry};
//!
//! let registry = Arc::new(ModelRegistry::new(ModelPaths {
//!     encoder_dir: "models/codebert-base".into(),
//!     classifier: "models/human_ai_classifier.onnx".into(),
//! }));
//! let pipeline = DetectionPipeline::new(registry);
//!
//! let result = pipeline.detect("def foo():\n    pass\n", &["python".into()])?;
//! println!("P(AI) = {:.3}", result.ai_probability);
//! # Ok::<(), detectai_inference::DetectError>(())
//! ```

mod classifier;
mod embedding;
mod error;
mod pipeline;
mod registry;

pub use embedding::MAX_SEQUENCE_LENGTH;
pub use error::DetectError;
pub use pipeline::{DetectionPipeline, DetectionResult, AI_PROBABILITY_THRESHOLD, ALLOWED_TAGS};
pub use registry::{GuardedCell, ModelBundle, ModelPaths, ModelRegistry};
