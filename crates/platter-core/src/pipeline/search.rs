//! Query orchestration: decode → preprocess → embed → reduce → search → resolve.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tokio::time::timeout;

use crate::context::InferenceContext;
use crate::error::{PipelineError, PipelineResult};
use crate::types::SearchHit;

/// Runs one query against a borrowed [`InferenceContext`].
///
/// Holds no state of its own, so any number of pipelines can run over the
/// same context concurrently.
#[derive(Clone, Copy)]
pub struct PredictionPipeline<'a> {
    ctx: &'a InferenceContext,
}

impl<'a> PredictionPipeline<'a> {
    pub fn new(ctx: &'a InferenceContext) -> Self {
        Self { ctx }
    }

    /// Paths of the `k` catalog images closest to the uploaded image,
    /// nearest first. `k` above the catalog size is clamped.
    pub fn search(&self, image_bytes: &[u8], k: usize) -> PipelineResult<Vec<String>> {
        Ok(self
            .search_hits(image_bytes, k)?
            .into_iter()
            .map(|hit| hit.path)
            .collect())
    }

    /// Like [`search`](Self::search), keeping ids and distances.
    pub fn search_hits(&self, image_bytes: &[u8], k: usize) -> PipelineResult<Vec<SearchHit>> {
        check_k(k)?;
        let decode_start = Instant::now();
        let image = self.ctx.decoder().decode(image_bytes)?;
        tracing::trace!("  Decode: {:?}", decode_start.elapsed());
        self.search_image(&image, k)
    }

    /// Search with an already-decoded image.
    pub fn search_image(&self, image: &DynamicImage, k: usize) -> PipelineResult<Vec<SearchHit>> {
        check_k(k)?;
        let start = Instant::now();

        let tensor = self.ctx.preprocessor().preprocess(image);
        tracing::trace!("  Preprocess: {:?}", start.elapsed());

        let embed_start = Instant::now();
        let embedder = self.ctx.embedder();
        let embedding = embedder.embed(&tensor)?;
        if embedding.len() != embedder.dimension() {
            return Err(PipelineError::ShapeMismatch {
                stage: "embed",
                expected: embedder.dimension(),
                actual: embedding.len(),
            });
        }
        tracing::trace!("  Embed: {:?}", embed_start.elapsed());

        let index = self.ctx.index();
        let reduced = self.ctx.reducer().reduce(&embedding)?;
        if reduced.len() != index.dimension() {
            return Err(PipelineError::ShapeMismatch {
                stage: "reduce",
                expected: index.dimension(),
                actual: reduced.len(),
            });
        }

        let search_start = Instant::now();
        let catalog = self.ctx.catalog();
        let k = k.min(catalog.len());
        let neighbors = index.search(&reduced, k)?;
        tracing::trace!("  Index search: {:?}", search_start.elapsed());

        let hits = neighbors
            .into_iter()
            .enumerate()
            .map(|(i, n)| {
                Ok(SearchHit {
                    rank: i + 1,
                    id: n.id,
                    distance: n.distance,
                    path: catalog.resolve(n.id)?.to_string(),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;

        tracing::debug!(
            "Search returned {} of k={} in {:?}",
            hits.len(),
            k,
            start.elapsed()
        );
        Ok(hits)
    }
}

fn check_k(k: usize) -> PipelineResult<()> {
    if k == 0 {
        return Err(PipelineError::InvalidRequest(
            "result count k must be at least 1".to_string(),
        ));
    }
    Ok(())
}

/// Run a whole search on a blocking worker, abandoning it after `deadline`.
///
/// On timeout the computation is left to finish in the background and its
/// result is dropped; no partial results are returned.
pub async fn search_with_timeout(
    ctx: Arc<InferenceContext>,
    image_bytes: Vec<u8>,
    k: usize,
    deadline: Duration,
) -> PipelineResult<Vec<SearchHit>> {
    let result = timeout(deadline, async move {
        tokio::task::spawn_blocking(move || ctx.pipeline().search_hits(&image_bytes, k)).await
    })
    .await;

    match result {
        Ok(Ok(hits)) => hits,
        Ok(Err(e)) => Err(PipelineError::Worker {
            message: e.to_string(),
        }),
        Err(_) => Err(PipelineError::Timeout {
            timeout_ms: deadline.as_millis() as u64,
        }),
    }
}
