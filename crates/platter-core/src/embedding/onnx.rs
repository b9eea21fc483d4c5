//! ONNX Runtime session for the embedding network.

use std::path::Path;
use std::sync::Mutex;

use ndarray::Array4;
use ort::session::Session;
use ort::value::Value;

use crate::bundle::EmbeddingSpec;
use crate::error::{ArtifactError, PipelineError, PipelineResult};

use super::EmbeddingFunction;

/// Embedding network backed by an ONNX Runtime session.
///
/// Uses a `Mutex` because `Session::run` requires `&mut self`; only the
/// inference call is serialized, not the rest of the pipeline.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    /// Name of the input tensor (detected from model metadata).
    input_name: String,
    /// Output tensor to read; first output when `None`.
    output_name: Option<String>,
    dimension: usize,
    l2_normalize: bool,
}

impl OnnxEmbedder {
    /// Load the embedding network from an ONNX file.
    pub fn load(model_path: &Path, spec: &EmbeddingSpec) -> Result<Self, ArtifactError> {
        if !model_path.exists() {
            return Err(ArtifactError::NotFound(model_path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| ArtifactError::Corrupt {
                path: model_path.to_path_buf(),
                message: format!("Failed to create ONNX session builder: {e}"),
            })?
            .commit_from_file(model_path)
            .map_err(|e| ArtifactError::Corrupt {
                path: model_path.to_path_buf(),
                message: format!("Failed to load ONNX model: {e}"),
            })?;

        let input_name = session
            .inputs()
            .first()
            .map(|i| i.name().to_string())
            .ok_or_else(|| ArtifactError::Corrupt {
                path: model_path.to_path_buf(),
                message: "Model declares no inputs".to_string(),
            })?;

        let output_names: Vec<String> = session
            .outputs()
            .iter()
            .map(|o| o.name().to_string())
            .collect();
        if let Some(ref wanted) = spec.output {
            if !output_names.iter().any(|n| n == wanted) {
                return Err(ArtifactError::Consistency(format!(
                    "embedding output {wanted:?} not found in model outputs {output_names:?}"
                )));
            }
        }

        tracing::debug!(
            "Loaded embedding model from {:?} (input: {:?}, outputs: {:?})",
            model_path,
            input_name,
            output_names
        );

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name: spec.output.clone(),
            dimension: spec.dimension,
            l2_normalize: spec.l2_normalize,
        })
    }
}

impl EmbeddingFunction for OnnxEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, tensor: &Array4<f32>) -> PipelineResult<Vec<f32>> {
        let shape: Vec<i64> = tensor.shape().iter().map(|&d| d as i64).collect();
        let flat_data: Vec<f32> = tensor.iter().copied().collect();

        let input_value =
            Value::from_array((shape, flat_data)).map_err(|e| PipelineError::Embedding {
                message: format!("Failed to create input tensor: {e}"),
            })?;

        let inputs = ort::inputs![self.input_name.as_str() => input_value];

        let mut session = self.session.lock().map_err(|e| PipelineError::Embedding {
            message: format!("Session lock poisoned: {e}"),
        })?;

        let outputs = session.run(inputs).map_err(|e| PipelineError::Embedding {
            message: format!("ONNX inference failed: {e}"),
        })?;

        let output = match self.output_name {
            Some(ref name) => outputs.iter().find(|(n, _)| *n == name.as_str()),
            None => outputs.iter().next(),
        }
        .ok_or_else(|| PipelineError::Embedding {
            message: "Model produced no usable output".to_string(),
        })?;

        let (shape, data) =
            output
                .1
                .try_extract_tensor::<f32>()
                .map_err(|e| PipelineError::Embedding {
                    message: format!("Failed to extract output tensor: {e}"),
                })?;

        // Batch of one: [D] or [1, D]. Anything else is a model/bundle mismatch.
        let mut raw = match shape.len() {
            1 => data.to_vec(),
            2 if shape[0] == 1 => data.to_vec(),
            _ => {
                return Err(PipelineError::ShapeMismatch {
                    stage: "embed",
                    expected: self.dimension,
                    actual: data.len(),
                });
            }
        };

        if self.l2_normalize {
            crate::math::l2_normalize_in_place(&mut raw);
        }
        Ok(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::TensorLayout;
    use std::path::PathBuf;

    fn spec() -> EmbeddingSpec {
        EmbeddingSpec {
            model: PathBuf::from("embedding.onnx"),
            input_width: 224,
            input_height: 224,
            layout: TensorLayout::Nhwc,
            dimension: 1280,
            output: None,
            l2_normalize: false,
        }
    }

    #[test]
    fn test_missing_model_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("embedding.onnx");
        let err = OnnxEmbedder::load(&path, &spec()).err().unwrap();
        assert!(matches!(err, ArtifactError::NotFound(p) if p == path));
    }
}
