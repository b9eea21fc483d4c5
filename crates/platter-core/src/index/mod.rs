//! Nearest-neighbor search over the reduced catalog vectors.

mod flat;

use serde::{Deserialize, Serialize};

use crate::error::PipelineResult;

pub use flat::FlatIndex;

/// Distance metric used by an index. All metrics are non-negative.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Squared Euclidean distance
    #[default]
    L2,
    /// `1 - cosine similarity`
    Cosine,
}

impl Metric {
    pub fn distance(self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Metric::L2 => crate::math::squared_l2(a, b),
            Metric::Cosine => crate::math::cosine_distance(a, b),
        }
    }
}

/// One search result: catalog id and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Neighbor {
    pub id: usize,
    pub distance: f32,
}

/// A fixed set of vectors answering k-nearest-neighbor queries.
pub trait SimilarityIndex: Send + Sync {
    /// Length of every stored vector.
    fn dimension(&self) -> usize;

    /// Number of stored vectors.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Up to `k` nearest vectors, ascending by distance, ties by ascending id.
    fn search(&self, query: &[f32], k: usize) -> PipelineResult<Vec<Neighbor>>;
}
