//! Catalog id → image path mapping.
//!
//! The catalog artifact is a JSON array of relative paths, row-aligned with
//! the vectors the index was built from: entry `i` is catalog id `i`.

use std::path::Path;

use crate::error::{ArtifactError, PipelineError, PipelineResult};

#[derive(Debug, Clone)]
pub struct ImageCatalog {
    paths: Vec<String>,
}

impl ImageCatalog {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.exists() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        let corrupt = |message: String| ArtifactError::Corrupt {
            path: path.to_path_buf(),
            message,
        };
        let content = std::fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
        let paths: Vec<String> =
            serde_json::from_str(&content).map_err(|e| corrupt(e.to_string()))?;

        tracing::debug!("Loaded catalog of {} images from {:?}", paths.len(), path);
        Ok(Self { paths })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path for a catalog id.
    ///
    /// An id outside the catalog means the index and catalog were built from
    /// different data.
    pub fn resolve(&self, id: usize) -> PipelineResult<&str> {
        self.paths
            .get(id)
            .map(String::as_str)
            .ok_or(PipelineError::CatalogLookup {
                id,
                catalog_len: self.paths.len(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_in_range() {
        let catalog = ImageCatalog::new(vec!["a/1.jpg".into(), "b/2.jpg".into()]);
        assert_eq!(catalog.resolve(1).unwrap(), "b/2.jpg");
    }

    #[test]
    fn test_resolve_out_of_range_is_lookup_error() {
        let catalog = ImageCatalog::new(vec!["a/1.jpg".into()]);
        let err = catalog.resolve(5).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::CatalogLookup {
                id: 5,
                catalog_len: 1
            }
        ));
    }

    #[test]
    fn test_load_json_array() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image_paths.json");
        std::fs::write(&path, r#"["images/pad_thai_0001.jpg", "images/ramen_0002.jpg"]"#)
            .unwrap();
        let catalog = ImageCatalog::load(&path).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.resolve(0).unwrap(), "images/pad_thai_0001.jpg");
    }

    #[test]
    fn test_load_rejects_non_string_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image_paths.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            ImageCatalog::load(&path),
            Err(ArtifactError::Corrupt { .. })
        ));
    }
}
