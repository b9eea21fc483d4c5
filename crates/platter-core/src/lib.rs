//! Platter Core - recipe image similarity search.
//!
//! Given a photo of a dish, Platter finds the visually closest images in a
//! fixed catalog and returns their paths, nearest first, optionally joined
//! with the recipe each image belongs to.
//!
//! # Architecture
//!
//! Everything a query needs is loaded once from an artifact bundle into an
//! immutable [`InferenceContext`]; queries only read it:
//!
//! ```text
//! bytes → Decode → Preprocess → Embed (ONNX) → Reduce (PCA) → Index → Catalog paths
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use platter_core::{Config, Platter};
//!
//! #[tokio::main]
//! async fn main() -> platter_core::Result<()> {
//!     let platter = Platter::new(Config::load()?).await?;
//!     let bytes = std::fs::read("./dinner.jpg")?;
//!     for result in platter.search(bytes, Some(5)).await? {
//!         println!("{} {}", result.hit.rank, result.hit.path);
//!     }
//!     Ok(())
//! }
//! ```

pub mod bundle;
pub mod catalog;
pub mod config;
pub mod context;
pub mod embedding;
pub mod error;
pub mod index;
pub mod math;
pub mod output;
pub mod pipeline;
pub mod recipes;
pub mod reduce;
pub mod types;

pub use bundle::BundleManifest;
pub use catalog::ImageCatalog;
pub use config::Config;
pub use context::InferenceContext;
pub use embedding::{EmbeddingFunction, OnnxEmbedder, Preprocessor};
pub use error::{ArtifactError, ConfigError, PipelineError, PipelineResult, PlatterError, Result};
pub use index::{FlatIndex, Metric, Neighbor, SimilarityIndex};
pub use output::{OutputFormat, OutputWriter};
pub use pipeline::{search_with_timeout, ImageDecoder, PredictionPipeline};
pub use recipes::{Recipe, RecipeBook};
pub use reduce::{DimensionalityReducer, PcaProjection};
pub use types::{SearchHit, SearchResult};

use std::sync::Arc;
use std::time::Duration;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Platter search service - the main entry point.
///
/// Owns the shared [`InferenceContext`] and the optional recipe table.
/// Cheap to clone; clones share the loaded artifacts.
#[derive(Clone)]
pub struct Platter {
    config: Config,
    context: Arc<InferenceContext>,
    recipes: Option<Arc<RecipeBook>>,
}

impl Platter {
    /// Load the bundle and recipe table named by `config`.
    pub async fn new(config: Config) -> Result<Self> {
        tracing::debug!("Initializing Platter v{}", VERSION);
        let bundle_dir = config.bundle_dir();
        let limits = config.limits.clone();
        let context = tokio::task::spawn_blocking(move || InferenceContext::load(&bundle_dir, limits))
            .await
            .map_err(|e| PlatterError::Worker(format!("bundle load: {e}")))??;

        let recipes = match config.recipe_table() {
            Some(path) => Some(RecipeBook::load(&path)?),
            None => None,
        };

        Ok(Self::from_context(config, context, recipes))
    }

    /// Wrap an already-built context.
    pub fn from_context(
        config: Config,
        context: InferenceContext,
        recipes: Option<RecipeBook>,
    ) -> Self {
        Self {
            config,
            context: Arc::new(context),
            recipes: recipes.map(Arc::new),
        }
    }

    /// Search for the catalog images closest to `image_bytes`.
    ///
    /// `k` defaults to `search.default_k`. The whole call is bounded by
    /// `search.timeout_ms`.
    pub async fn search(&self, image_bytes: Vec<u8>, k: Option<usize>) -> Result<Vec<SearchResult>> {
        let k = k.unwrap_or(self.config.search.default_k);
        let deadline = Duration::from_millis(self.config.search.timeout_ms);
        let hits = search_with_timeout(Arc::clone(&self.context), image_bytes, k, deadline).await?;

        let image_root = self.config.image_root();
        Ok(hits
            .into_iter()
            .map(|hit| {
                SearchResult::assemble(hit, image_root.as_deref(), self.recipes.as_deref())
            })
            .collect())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> &InferenceContext {
        &self.context
    }

    pub fn recipes(&self) -> Option<&RecipeBook> {
        self.recipes.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::color_context;
    use crate::recipes::RecipeRow;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn png(color: [u8; 3]) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(color)));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_search_uses_default_k() {
        let mut config = Config::default();
        config.search.default_k = 2;
        let platter = Platter::from_context(config, color_context(), None);

        let results = platter.search(png([255, 255, 255]), None).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].hit.path, "images/rice_pudding_0004.jpg");
    }

    #[tokio::test]
    async fn test_search_attaches_recipes() {
        let book = RecipeBook::from_rows(vec![RecipeRow {
            lemmatized_name: "tomato soup".into(),
            original_name: "Roasted Tomato Soup".into(),
            recipe: "Roast tomatoes | Blend | Season".into(),
        }]);
        let platter = Platter::from_context(Config::default(), color_context(), Some(book));

        let results = platter.search(png([240, 0, 0]), Some(2)).await.unwrap();
        let recipe = results[0].recipe.as_ref().unwrap();
        assert_eq!(recipe.original_name, "Roasted Tomato Soup");
        assert_eq!(recipe.steps.len(), 3);
        assert!(results[1].recipe.is_none());
    }

    #[tokio::test]
    async fn test_search_errors_surface_as_pipeline_errors() {
        let platter = Platter::from_context(Config::default(), color_context(), None);
        let err = platter.search(b"nope".to_vec(), Some(3)).await.unwrap_err();
        assert!(matches!(err, PlatterError::Pipeline(PipelineError::Decode { .. })));
    }

    #[tokio::test]
    async fn test_new_fails_without_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.general.bundle_dir = dir.path().join("missing");
        let err = Platter::new(config).await.err().unwrap();
        assert!(matches!(err, PlatterError::Artifact(ArtifactError::NotFound(_))));
    }
}
