use std::fmt;

/// Error taxonomy for the detection pipeline.
///
/// The first two variants are client-input defects and map to 4xx responses
/// at the HTTP boundary; the last two are server-side failures. Display
/// strings double as the wire-level error messages.
#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// The request carried no code.
    #[error("No code provided")]
    EmptyCode,

    /// None of the request's language tags is in the supported set.
    #[error("Tag not allowed")]
    TagNotAllowed,

    /// A model artifact is missing, corrupt, or incompatible. Fatal to the
    /// triggering request; the registry stays unloaded so a later request
    /// retries the load.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// Embedding or classification failed after the bundle was loaded.
    #[error("inference failed: {0}")]
    Inference(String),
}

impl DetectError {
    pub fn model_load(msg: impl fmt::Display) -> Self {
        Self::ModelLoad(msg.to_string())
    }

    pub fn inference(msg: impl fmt::Display) -> Self {
        Self::Inference(msg.to_string())
    }

    /// True for errors caused by the request rather than the service.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyCode | Self::TagNotAllowed)
    }
}
