//! Exact (brute-force) index stored as one contiguous matrix.
//!
//! The on-disk artifact is the `bincode` encoding of [`FlatIndex`]. Catalogs
//! of a few tens of thousands of recipe images scan in well under a
//! millisecond per query at PCA dimensions, so exact search is the default.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ArtifactError, PipelineError, PipelineResult};

use super::{Metric, Neighbor, SimilarityIndex};

/// Highest index file version this build reads.
const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    format_version: u32,
    metric: Metric,
    dimension: usize,
    /// `len × dimension`, row-major; row `i` is catalog id `i`.
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from rows of equal length.
    pub fn build(metric: Metric, rows: &[Vec<f32>]) -> Result<Self, ArtifactError> {
        let dimension = rows.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(ArtifactError::Consistency(
                "cannot build an index from zero-length or no vectors".into(),
            ));
        }
        if let Some((i, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dimension) {
            return Err(ArtifactError::Consistency(format!(
                "vector {i} has {} components, expected {dimension}",
                row.len()
            )));
        }
        let vectors: Vec<f32> = rows.iter().flatten().copied().collect();
        if let Some(at) = first_non_finite(&vectors) {
            return Err(ArtifactError::Consistency(format!(
                "vector {} has a non-finite component",
                at / dimension
            )));
        }
        Ok(Self {
            format_version: FORMAT_VERSION,
            metric,
            dimension,
            vectors,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    /// Load and validate an index artifact.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        let corrupt = |message: String| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            message,
        };
        let file = File::open(path).map_err(|e| corrupt(e.to_string()))?;
        let index: FlatIndex = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| corrupt(e.to_string()))?;

        if index.format_version != FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                what: "index",
                found: index.format_version,
                supported: FORMAT_VERSION,
            });
        }
        if index.dimension == 0 || index.vectors.len() % index.dimension != 0 {
            return Err(corrupt(format!(
                "{} values do not form rows of dimension {}",
                index.vectors.len(),
                index.dimension
            )));
        }
        if let Some(at) = first_non_finite(&index.vectors) {
            return Err(corrupt(format!(
                "vector {} has a non-finite component",
                at / index.dimension
            )));
        }

        tracing::debug!(
            "Loaded {:?} index from {:?}: {} vectors x {} dims",
            index.metric,
            path,
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    /// Write the index artifact.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let corrupt = |message: String| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            message,
        };
        let file = File::create(path).map_err(|e| corrupt(e.to_string()))?;
        bincode::serialize_into(BufWriter::new(file), self).map_err(|e| corrupt(e.to_string()))
    }

    fn row(&self, id: usize) -> &[f32] {
        &self.vectors[id * self.dimension..(id + 1) * self.dimension]
    }
}

fn first_non_finite(values: &[f32]) -> Option<usize> {
    values.iter().position(|v| !v.is_finite())
}

fn by_distance_then_id(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then_with(|| a.id.cmp(&b.id))
}

impl SimilarityIndex for FlatIndex {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    fn search(&self, query: &[f32], k: usize) -> PipelineResult<Vec<Neighbor>> {
        if query.len() != self.dimension {
            return Err(PipelineError::ShapeMismatch {
                stage: "reduce",
                expected: self.dimension,
                actual: query.len(),
            });
        }
        let k = k.min(self.len());
        if k == 0 {
            return Ok(vec![]);
        }

        let mut scored: Vec<Neighbor> = (0..self.len())
            .map(|id| Neighbor {
                id,
                distance: self.metric.distance(query, self.row(id)),
            })
            .collect();

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance_then_id);
            scored.truncate(k);
        }
        scored.sort_unstable_by(by_distance_then_id);
        Ok(scored)
    }
}
