//! Artifact bundle manifest.
//!
//! A bundle is a directory holding `bundle.toml` plus the four search
//! artifacts it names. The manifest carries the preprocessing parameters
//! explicitly so query-time normalization cannot silently drift from the
//! normalization the index was built with.
//!
//! ```toml
//! format_version = 1
//!
//! [embedding]
//! model = "embedding.onnx"
//! input_width = 224
//! input_height = 224
//! layout = "nhwc"
//! dimension = 1280
//!
//! [preprocess]
//! version = 1
//! filter = "triangle"
//! scale = 0.00392156862745098
//! mean = [0.0, 0.0, 0.0]
//! std = [1.0, 1.0, 1.0]
//!
//! [reducer]
//! file = "pca.json"
//!
//! [index]
//! file = "recipes.index"
//!
//! [catalog]
//! file = "image_paths.json"
//! ```

pub mod golden;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::embedding::{ResizeFilter, TensorLayout};
use crate::error::ArtifactError;

pub use golden::{GoldenReport, GoldenTensor};

/// Manifest filename inside a bundle directory.
pub const MANIFEST_FILENAME: &str = "bundle.toml";

/// Highest manifest format this build reads.
pub const SUPPORTED_FORMAT_VERSION: u32 = 1;

/// Highest preprocessing recipe version this build implements.
pub const SUPPORTED_PREPROCESS_VERSION: u32 = 1;

/// Parsed `bundle.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub format_version: u32,
    pub embedding: EmbeddingSpec,
    pub preprocess: PreprocessSpec,
    pub reducer: FileSpec,
    pub index: FileSpec,
    pub catalog: FileSpec,
    /// Reference tensors captured when the index was built
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub golden: Vec<GoldenTensor>,
}

/// Embedding model description.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSpec {
    /// ONNX model file, relative to the bundle directory
    pub model: PathBuf,
    pub input_width: u32,
    pub input_height: u32,
    #[serde(default)]
    pub layout: TensorLayout,
    /// Length of the vector the model produces
    pub dimension: usize,
    /// Output tensor to read; the first output when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// L2-normalize the model output before reduction
    #[serde(default)]
    pub l2_normalize: bool,
}

/// Pixel normalization: `(pixel * scale - mean[c]) / std[c]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessSpec {
    pub version: u32,
    #[serde(default)]
    pub filter: ResizeFilter,
    pub scale: f32,
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for PreprocessSpec {
    fn default() -> Self {
        Self {
            version: SUPPORTED_PREPROCESS_VERSION,
            filter: ResizeFilter::default(),
            scale: 1.0 / 255.0,
            mean: [0.0; 3],
            std: [1.0; 3],
        }
    }
}

/// Reference to an artifact file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpec {
    pub file: PathBuf,
}

impl BundleManifest {
    /// Read and check `bundle.toml` from a bundle directory.
    pub fn load(bundle_dir: &Path) -> Result<Self, ArtifactError> {
        let path = bundle_dir.join(MANIFEST_FILENAME);
        if !path.exists() {
            return Err(ArtifactError::NotFound(path));
        }
        let content = std::fs::read_to_string(&path).map_err(|e| ArtifactError::Corrupt {
            path: path.clone(),
            message: e.to_string(),
        })?;
        let manifest: BundleManifest =
            toml::from_str(&content).map_err(|e| ArtifactError::Corrupt {
                path: path.clone(),
                message: e.to_string(),
            })?;
        manifest.check()?;
        Ok(manifest)
    }

    /// Structural checks that need no other artifact.
    pub fn check(&self) -> Result<(), ArtifactError> {
        if self.format_version != SUPPORTED_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                what: "bundle format",
                found: self.format_version,
                supported: SUPPORTED_FORMAT_VERSION,
            });
        }
        if self.preprocess.version != SUPPORTED_PREPROCESS_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                what: "preprocess",
                found: self.preprocess.version,
                supported: SUPPORTED_PREPROCESS_VERSION,
            });
        }
        if self.embedding.input_width == 0 || self.embedding.input_height == 0 {
            return Err(ArtifactError::Consistency(
                "embedding input size must be non-zero".into(),
            ));
        }
        if self.embedding.dimension == 0 {
            return Err(ArtifactError::Consistency(
                "embedding dimension must be non-zero".into(),
            ));
        }
        if !self.preprocess.scale.is_finite() || self.preprocess.scale <= 0.0 {
            return Err(ArtifactError::Consistency(
                "preprocess.scale must be a positive finite number".into(),
            ));
        }
        if self.preprocess.mean.iter().any(|m| !m.is_finite()) {
            return Err(ArtifactError::Consistency(
                "preprocess.mean entries must be finite".into(),
            ));
        }
        if self.preprocess.std.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ArtifactError::Consistency(
                "preprocess.std entries must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Absolute path of an artifact named in the manifest.
    pub fn resolve(bundle_dir: &Path, file: &Path) -> PathBuf {
        if file.is_absolute() {
            file.to_path_buf()
        } else {
            bundle_dir.join(file)
        }
    }

    /// Serialize to TOML (used when writing bundles from tooling and tests).
    pub fn to_toml(&self) -> Result<String, ArtifactError> {
        toml::to_string_pretty(self).map_err(|e| ArtifactError::Corrupt {
            path: PathBuf::from(MANIFEST_FILENAME),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn sample_manifest() -> BundleManifest {
        BundleManifest {
            format_version: 1,
            embedding: EmbeddingSpec {
                model: PathBuf::from("embedding.onnx"),
                input_width: 8,
                input_height: 8,
                layout: TensorLayout::Nhwc,
                dimension: 3,
                output: None,
                l2_normalize: false,
            },
            preprocess: PreprocessSpec::default(),
            reducer: FileSpec {
                file: PathBuf::from("pca.json"),
            },
            index: FileSpec {
                file: PathBuf::from("recipes.index"),
            },
            catalog: FileSpec {
                file: PathBuf::from("image_paths.json"),
            },
            golden: vec![],
        }
    }

    #[test]
    fn test_manifest_roundtrips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = sample_manifest();
        std::fs::write(
            dir.path().join(MANIFEST_FILENAME),
            manifest.to_toml().unwrap(),
        )
        .unwrap();

        let loaded = BundleManifest::load(dir.path()).unwrap();
        assert_eq!(loaded.embedding.dimension, 3);
        assert_eq!(loaded.preprocess, PreprocessSpec::default());
        assert_eq!(loaded.catalog.file, PathBuf::from("image_paths.json"));
    }

    #[test]
    fn test_missing_manifest_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = BundleManifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[test]
    fn test_rejects_future_format_version() {
        let mut manifest = sample_manifest();
        manifest.format_version = 2;
        let err = manifest.check().unwrap_err();
        assert!(matches!(
            err,
            ArtifactError::UnsupportedVersion {
                what: "bundle format",
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_rejects_future_preprocess_version() {
        let mut manifest = sample_manifest();
        manifest.preprocess.version = 7;
        assert!(matches!(
            manifest.check(),
            Err(ArtifactError::UnsupportedVersion {
                what: "preprocess",
                ..
            })
        ));
    }

    #[test]
    fn test_rejects_zero_std() {
        let mut manifest = sample_manifest();
        manifest.preprocess.std = [1.0, 0.0, 1.0];
        let err = manifest.check().unwrap_err();
        assert!(err.to_string().contains("std"));
    }

    #[test]
    fn test_rejects_non_finite_mean() {
        let mut manifest = sample_manifest();
        manifest.preprocess.mean = [0.5, f32::NAN, 0.5];
        let err = manifest.check().unwrap_err();
        assert!(matches!(err, ArtifactError::Consistency(_)));
        assert!(err.to_string().contains("preprocess.mean"));
    }

    #[test]
    fn test_parses_minimal_toml_with_defaults() {
        let text = r#"
            format_version = 1

            [embedding]
            model = "embedding.onnx"
            input_width = 224
            input_height = 224
            dimension = 1280

            [preprocess]
            version = 1
            scale = 0.00392156862745098
            mean = [0.0, 0.0, 0.0]
            std = [1.0, 1.0, 1.0]

            [reducer]
            file = "pca.json"

            [index]
            file = "recipes.index"

            [catalog]
            file = "image_paths.json"
        "#;
        let manifest: BundleManifest = toml::from_str(text).unwrap();
        manifest.check().unwrap();
        assert_eq!(manifest.embedding.layout, TensorLayout::Nhwc);
        assert_eq!(manifest.preprocess.filter, ResizeFilter::Triangle);
        assert!(manifest.golden.is_empty());
    }

    #[test]
    fn test_resolve_keeps_absolute_paths() {
        let bundle = Path::new("/srv/bundle");
        assert_eq!(
            BundleManifest::resolve(bundle, Path::new("pca.json")),
            PathBuf::from("/srv/bundle/pca.json")
        );
        assert_eq!(
            BundleManifest::resolve(bundle, Path::new("/data/pca.json")),
            PathBuf::from("/data/pca.json")
        );
    }
}
