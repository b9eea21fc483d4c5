//! Image embedding.
//!
//! The embedding model is a frozen network exported to ONNX. The pipeline
//! only sees it through [`EmbeddingFunction`], so tests and alternative
//! runtimes can stand in for it.
//!
//! ```rust,ignore
//! use platter_core::embedding::{EmbeddingFunction, OnnxEmbedder, Preprocessor};
//!
//! let embedder = OnnxEmbedder::load(&model_path, &manifest.embedding)?;
//! let tensor = preprocessor.preprocess(&image);
//! let embedding = embedder.embed(&tensor)?;
//! ```

mod onnx;
pub(crate) mod preprocess;

use ndarray::Array4;

use crate::error::PipelineResult;

pub use self::onnx::OnnxEmbedder;
pub use self::preprocess::{Preprocessor, ResizeFilter, TensorLayout};

/// Maps one preprocessed image tensor to a dense vector.
///
/// Implementations must be safe to call from several threads at once; one
/// that cannot run concurrently serializes internally around its own call.
pub trait EmbeddingFunction: Send + Sync {
    /// Number of components the function is expected to return.
    fn dimension(&self) -> usize;

    /// Embed a `[1, ...]` tensor shaped as the bundle declares.
    fn embed(&self, tensor: &Array4<f32>) -> PipelineResult<Vec<f32>>;
}
