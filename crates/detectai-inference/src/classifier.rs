//! Probability prediction against the opaque ONNX classifier artifact.

use std::sync::PoisonError;

use ort::value::Tensor;

use crate::error::DetectError;
use crate::registry::ModelBundle;

impl ModelBundle {
    /// P(AI-generated) for a fused feature vector.
    ///
    /// The caller guarantees the vector's length and field order match the
    /// classifier's training-time contract. The artifact is a scikit-learn
    /// export whose second output carries per-class probabilities; class 1
    /// is "AI".
    pub fn predict_probability(&self, features: &[f32]) -> Result<f32, DetectError> {
        let shape = vec![1, features.len()];
        let data = features.to_vec().into_boxed_slice();
        let input = Tensor::from_array((shape, data))
            .map_err(|e| DetectError::inference(format!("input tensor failed: {e}")))?;

        let mut session = self
            .classifier
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let input_name = session.inputs()[0].name().to_string();
        let outputs = session
            .run(ort::inputs![input_name => input])
            .map_err(|e| DetectError::inference(format!("classifier run failed: {e}")))?;

        let probabilities = outputs[1]
            .try_extract_array::<f32>()
            .map_err(|e| DetectError::inference(format!("probabilities extraction failed: {e}")))?
            .into_dimensionality::<ndarray::Ix2>()
            .map_err(|e| {
                DetectError::inference(format!("probabilities output is not 2-dimensional: {e}"))
            })?;

        Ok(probabilities[[0, 1]])
    }
}
