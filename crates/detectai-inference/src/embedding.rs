//! Semantic code embedding via the pretrained encoder.

use candle_core::{IndexOp, Tensor};
use tokenizers::TruncationDirection;

use crate::error::DetectError;
use crate::registry::ModelBundle;

/// Maximum token sequence fed to the encoder; longer input is truncated,
/// never rejected.
pub const MAX_SEQUENCE_LENGTH: usize = 512;

impl ModelBundle {
    /// Embed `code` as the encoder's first-token (CLS) hidden state.
    ///
    /// The forward pass is inference-only and never mutates the shared
    /// weights. The returned vector always has length
    /// [`hidden_size`](Self::hidden_size).
    pub fn embed(&self, code: &str) -> Result<Vec<f32>, DetectError> {
        let mut encoding = self
            .tokenizer
            .encode(code, true)
            .map_err(|e| DetectError::inference(format!("tokenization failed: {e}")))?;
        encoding.truncate(MAX_SEQUENCE_LENGTH, 0, TruncationDirection::Right);

        let ids = encoding.get_ids();
        if ids.is_empty() {
            return Err(DetectError::inference("tokenizer produced no tokens"));
        }

        // Raw BPE tokenizers may not emit an attention mask; fall back to
        // all-ones (single unpadded sequence).
        let raw_mask = encoding.get_attention_mask();
        let mask: Vec<u32> = if raw_mask.is_empty() || raw_mask.iter().all(|&m| m == 0) {
            vec![1; ids.len()]
        } else {
            raw_mask.to_vec()
        };

        let input_ids = Tensor::new(ids, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| DetectError::inference(format!("input_ids tensor failed: {e}")))?;
        let token_type_ids = Tensor::new(encoding.get_type_ids(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| DetectError::inference(format!("token_type_ids tensor failed: {e}")))?;
        let attention_mask = Tensor::new(mask.as_slice(), &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(|e| DetectError::inference(format!("attention mask tensor failed: {e}")))?;

        let hidden_states = self
            .encoder
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))
            .map_err(|e| DetectError::inference(format!("encoder forward pass failed: {e}")))?;

        let embedding: Vec<f32> = hidden_states
            .i((0, 0, ..))
            .and_then(|t| t.to_vec1())
            .map_err(|e| DetectError::inference(format!("CLS extraction failed: {e}")))?;

        if embedding.len() != self.hidden_size {
            return Err(DetectError::inference(format!(
                "embedding length {} does not match encoder hidden size {}",
                embedding.len(),
                self.hidden_size
            )));
        }

        Ok(embedding)
    }
}
