//! The immutable set of artifacts every query reads.
//!
//! An [`InferenceContext`] is built once at startup and shared (by reference
//! or `Arc`) across all queries. Construction checks that the artifacts agree
//! with each other, so a context that exists is always consistent.

use std::path::Path;

use crate::bundle::{BundleManifest, GoldenReport};
use crate::catalog::ImageCatalog;
use crate::config::LimitsConfig;
use crate::embedding::{EmbeddingFunction, OnnxEmbedder, Preprocessor};
use crate::error::ArtifactError;
use crate::index::{FlatIndex, SimilarityIndex};
use crate::pipeline::{ImageDecoder, PredictionPipeline};
use crate::reduce::{DimensionalityReducer, PcaProjection};

pub struct InferenceContext {
    decoder: ImageDecoder,
    preprocessor: Preprocessor,
    embedder: Box<dyn EmbeddingFunction>,
    reducer: Box<dyn DimensionalityReducer>,
    index: Box<dyn SimilarityIndex>,
    catalog: ImageCatalog,
}

impl InferenceContext {
    /// Load every artifact named by `bundle.toml` in `bundle_dir`.
    pub fn load(bundle_dir: &Path, limits: LimitsConfig) -> Result<Self, ArtifactError> {
        let manifest = BundleManifest::load(bundle_dir)?;
        Self::load_manifest(bundle_dir, &manifest, limits)
    }

    /// Load the artifacts of an already-parsed manifest.
    ///
    /// The cheap artifacts are loaded and cross-checked before the embedding
    /// model, so a mismatched bundle fails without paying for model startup.
    pub fn load_manifest(
        bundle_dir: &Path,
        manifest: &BundleManifest,
        limits: LimitsConfig,
    ) -> Result<Self, ArtifactError> {
        let start = std::time::Instant::now();
        let catalog =
            ImageCatalog::load(&BundleManifest::resolve(bundle_dir, &manifest.catalog.file))?;
        let index = FlatIndex::load(&BundleManifest::resolve(bundle_dir, &manifest.index.file))?;
        check_counts(&catalog, &index)?;
        let reducer =
            PcaProjection::load(&BundleManifest::resolve(bundle_dir, &manifest.reducer.file))?;
        check_dims(manifest.embedding.dimension, &reducer, &index)?;

        let model_path = BundleManifest::resolve(bundle_dir, &manifest.embedding.model);
        tracing::info!("Loading embedding model from {:?}", model_path);
        let embedder = OnnxEmbedder::load(&model_path, &manifest.embedding)?;

        let preprocessor = Preprocessor::new(
            manifest.embedding.input_width,
            manifest.embedding.input_height,
            manifest.embedding.layout,
            &manifest.preprocess,
        );

        let context = Self::from_parts(
            preprocessor,
            Box::new(embedder),
            Box::new(reducer),
            Box::new(index),
            catalog,
        )?
        .with_limits(limits);

        tracing::info!(
            "Bundle loaded in {:?}: {} images, {} -> {} dims",
            start.elapsed(),
            context.catalog.len(),
            context.embedder.dimension(),
            context.index.dimension()
        );
        Ok(context)
    }

    /// Assemble a context from already-loaded parts.
    ///
    /// Fails if the embedding, reducer and index dimensions do not chain, or
    /// if the catalog and index disagree on the number of images.
    pub fn from_parts(
        preprocessor: Preprocessor,
        embedder: Box<dyn EmbeddingFunction>,
        reducer: Box<dyn DimensionalityReducer>,
        index: Box<dyn SimilarityIndex>,
        catalog: ImageCatalog,
    ) -> Result<Self, ArtifactError> {
        check_counts(&catalog, index.as_ref())?;
        check_dims(embedder.dimension(), reducer.as_ref(), index.as_ref())?;
        Ok(Self {
            decoder: ImageDecoder::default(),
            preprocessor,
            embedder,
            reducer,
            index,
            catalog,
        })
    }

    /// Replace the upload limits applied by the decoder.
    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.decoder = ImageDecoder::new(limits);
        self
    }

    /// A pipeline borrowing this context.
    pub fn pipeline(&self) -> PredictionPipeline<'_> {
        PredictionPipeline::new(self)
    }

    /// Re-run the manifest's golden tensors through this context's preprocessor.
    pub fn verify_golden(
        &self,
        bundle_dir: &Path,
        manifest: &BundleManifest,
    ) -> Result<Vec<GoldenReport>, ArtifactError> {
        crate::bundle::golden::verify(bundle_dir, &manifest.golden, &self.preprocessor)
    }

    pub fn decoder(&self) -> &ImageDecoder {
        &self.decoder
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    pub fn embedder(&self) -> &dyn EmbeddingFunction {
        self.embedder.as_ref()
    }

    pub fn reducer(&self) -> &dyn DimensionalityReducer {
        self.reducer.as_ref()
    }

    pub fn index(&self) -> &dyn SimilarityIndex {
        self.index.as_ref()
    }

    pub fn catalog(&self) -> &ImageCatalog {
        &self.catalog
    }
}

fn check_counts(catalog: &ImageCatalog, index: &dyn SimilarityIndex) -> Result<(), ArtifactError> {
    if index.is_empty() {
        return Err(ArtifactError::Consistency("index holds no vectors".into()));
    }
    if catalog.len() != index.len() {
        return Err(ArtifactError::Consistency(format!(
            "catalog has {} entries but index holds {} vectors",
            catalog.len(),
            index.len()
        )));
    }
    Ok(())
}

fn check_dims(
    embedding_dim: usize,
    reducer: &dyn DimensionalityReducer,
    index: &dyn SimilarityIndex,
) -> Result<(), ArtifactError> {
    if reducer.input_dim() != embedding_dim {
        return Err(ArtifactError::Consistency(format!(
            "embedding produces {} components but reducer expects {}",
            embedding_dim,
            reducer.input_dim()
        )));
    }
    if reducer.output_dim() != index.dimension() {
        return Err(ArtifactError::Consistency(format!(
            "reducer produces {} components but index stores {}",
            reducer.output_dim(),
            index.dimension()
        )));
    }
    Ok(())
}
