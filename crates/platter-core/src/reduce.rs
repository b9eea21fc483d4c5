//! Dimensionality reduction by a pre-fitted linear projection.
//!
//! The reducer artifact is a JSON export of a fitted PCA:
//!
//! ```json
//! {
//!   "mean": [0.12, 0.03, ...],
//!   "components": [[...], [...]],
//!   "whiten": false,
//!   "explained_variance": [4.1, 2.7, ...]
//! }
//! ```
//!
//! `components` has one row per output dimension; each row has one entry
//! per input dimension. The projection is `y = C · (x - mean)`, divided by
//! `sqrt(explained_variance)` when `whiten` is set.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, PipelineError, PipelineResult};

/// Maps an embedding vector to a shorter vector.
pub trait DimensionalityReducer: Send + Sync {
    fn input_dim(&self) -> usize;

    fn output_dim(&self) -> usize;

    /// Project one vector of `input_dim()` components.
    fn reduce(&self, embedding: &[f32]) -> PipelineResult<Vec<f32>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct PcaFile {
    /// Redundant with `mean`/`components`; checked when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    input_dim: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output_dim: Option<usize>,
    mean: Vec<f32>,
    components: Vec<Vec<f32>>,
    #[serde(default)]
    whiten: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    explained_variance: Option<Vec<f32>>,
}

/// Fitted PCA projection, stored row-major.
#[derive(Debug, Clone)]
pub struct PcaProjection {
    mean: Vec<f32>,
    /// `output_dim × input_dim`, row-major.
    components: Vec<f32>,
    /// Per-output divisor (`sqrt(explained_variance)` when whitening, else 1).
    scale: Vec<f32>,
    input_dim: usize,
    output_dim: usize,
}

impl PcaProjection {
    /// Build a projection from its parts, checking every shape.
    pub fn new(
        mean: Vec<f32>,
        components: Vec<Vec<f32>>,
        explained_variance: Option<Vec<f32>>,
        whiten: bool,
    ) -> Result<Self, String> {
        let input_dim = mean.len();
        let output_dim = components.len();
        if input_dim == 0 || output_dim == 0 {
            return Err("projection must have non-empty mean and components".into());
        }
        if let Some((row, bad)) = components
            .iter()
            .enumerate()
            .find(|(_, r)| r.len() != input_dim)
        {
            return Err(format!(
                "component row {row} has {} entries, mean has {input_dim}",
                bad.len()
            ));
        }
        if mean.iter().any(|v| !v.is_finite()) {
            return Err("mean has a non-finite entry".into());
        }
        if let Some(row) = components
            .iter()
            .position(|r| r.iter().any(|v| !v.is_finite()))
        {
            return Err(format!("component row {row} has a non-finite entry"));
        }

        let scale = if whiten {
            let variance = explained_variance
                .ok_or_else(|| "whiten requires explained_variance".to_string())?;
            if variance.len() != output_dim {
                return Err(format!(
                    "explained_variance has {} entries, expected {output_dim}",
                    variance.len()
                ));
            }
            if variance.iter().any(|v| !v.is_finite() || *v <= 0.0) {
                return Err("explained_variance entries must be positive".into());
            }
            variance.iter().map(|v| v.sqrt()).collect()
        } else {
            vec![1.0; output_dim]
        };

        Ok(Self {
            mean,
            components: components.into_iter().flatten().collect(),
            scale,
            input_dim,
            output_dim,
        })
    }

    /// Load a projection from its JSON artifact.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        let corrupt = |message: String| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
        let file: PcaFile = serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;
        let projection = Self::new(
            file.mean,
            file.components,
            file.explained_variance,
            file.whiten,
        )
        .map_err(corrupt)?;

        let declared = (
            file.input_dim.unwrap_or(projection.input_dim),
            file.output_dim.unwrap_or(projection.output_dim),
        );
        if declared != (projection.input_dim, projection.output_dim) {
            return Err(corrupt(format!(
                "declares {} -> {} but matrices are {} -> {}",
                declared.0, declared.1, projection.input_dim, projection.output_dim
            )));
        }

        tracing::debug!(
            "Loaded projection {} -> {} from {:?}",
            projection.input_dim,
            projection.output_dim,
            path
        );
        Ok(projection)
    }
}

impl DimensionalityReducer for PcaProjection {
    fn input_dim(&self) -> usize {
        self.input_dim
    }

    fn output_dim(&self) -> usize {
        self.output_dim
    }

    fn reduce(&self, embedding: &[f32]) -> PipelineResult<Vec<f32>> {
        if embedding.len() != self.input_dim {
            return Err(PipelineError::ShapeMismatch {
                stage: "embed",
                expected: self.input_dim,
                actual: embedding.len(),
            });
        }

        let centered: Vec<f32> = embedding
            .iter()
            .zip(&self.mean)
            .map(|(x, m)| x - m)
            .collect();

        Ok(self
            .components
            .chunks_exact(self.input_dim)
            .zip(&self.scale)
            .map(|(row, s)| crate::math::dot(row, &centered) / s)
            .collect())
    }
}
