//! Golden-tensor checks for preprocessing drift.
//!
//! When an index is built, a few reference images are preprocessed and the
//! resulting tensors are saved next to the bundle as little-endian `f32`
//! files in the manifest's declared layout. Re-running the live preprocessor
//! over the same images must reproduce them within `tolerance`.

use std::path::{Path, PathBuf};

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::embedding::Preprocessor;
use crate::error::ArtifactError;

use super::BundleManifest;

fn default_tolerance() -> f32 {
    1e-5
}

/// A reference image with its captured tensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoldenTensor {
    pub image: PathBuf,
    pub tensor: PathBuf,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
}

/// Outcome of checking one golden tensor.
#[derive(Debug, Clone, Serialize)]
pub struct GoldenReport {
    pub image: PathBuf,
    pub max_abs_diff: f32,
    pub tolerance: f32,
    pub passed: bool,
}

/// Check every golden tensor against the live preprocessor.
///
/// Missing or unreadable reference files are artifact errors; a numeric
/// divergence is reported through `GoldenReport::passed`.
pub fn verify(
    bundle_dir: &Path,
    goldens: &[GoldenTensor],
    preprocessor: &Preprocessor,
) -> Result<Vec<GoldenReport>, ArtifactError> {
    goldens
        .iter()
        .map(|golden| verify_one(bundle_dir, golden, preprocessor))
        .collect()
}

fn verify_one(
    bundle_dir: &Path,
    golden: &GoldenTensor,
    preprocessor: &Preprocessor,
) -> Result<GoldenReport, ArtifactError> {
    let image_path = BundleManifest::resolve(bundle_dir, &golden.image);
    let tensor_path = BundleManifest::resolve(bundle_dir, &golden.tensor);

    if !image_path.exists() {
        return Err(ArtifactError::NotFound(image_path));
    }
    let image = image::open(&image_path).map_err(|e| ArtifactError::Corrupt {
        path: image_path.clone(),
        message: e.to_string(),
    })?;
    let expected = read_tensor_file(&tensor_path)?;
    let actual = preprocessor.preprocess(&image);

    if expected.len() != actual.len() {
        return Err(ArtifactError::Consistency(format!(
            "golden tensor {:?} has {} values, preprocessing produces {}",
            tensor_path,
            expected.len(),
            actual.len()
        )));
    }

    let max_abs_diff = max_abs_diff(&expected, &actual);
    let passed = max_abs_diff <= golden.tolerance;
    if passed {
        tracing::debug!("Golden {:?}: max diff {:e}", golden.image, max_abs_diff);
    } else {
        tracing::error!(
            "Golden {:?} diverged: max diff {:e} > tolerance {:e}",
            golden.image,
            max_abs_diff,
            golden.tolerance
        );
    }

    Ok(GoldenReport {
        image: golden.image.clone(),
        max_abs_diff,
        tolerance: golden.tolerance,
        passed,
    })
}

/// Largest absolute difference; any non-finite difference counts as infinite.
fn max_abs_diff(expected: &[f32], actual: &Array4<f32>) -> f32 {
    expected
        .iter()
        .zip(actual.iter())
        .map(|(e, a)| {
            let d = (e - a).abs();
            if d.is_finite() {
                d
            } else {
                f32::INFINITY
            }
        })
        .fold(0.0, f32::max)
}

/// Read a little-endian `f32` tensor file.
pub fn read_tensor_file(path: &Path) -> Result<Vec<f32>, ArtifactError> {
    if !path.exists() {
        return Err(ArtifactError::NotFound(path.to_path_buf()));
    }
    let bytes = std::fs::read(path).map_err(|e| ArtifactError::Corrupt {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    if bytes.len() % 4 != 0 {
        return Err(ArtifactError::Corrupt {
            path: path.to_path_buf(),
            message: format!("length {} is not a multiple of 4", bytes.len()),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

/// Write a tensor as little-endian `f32`, in logical (row-major) order.
pub fn write_tensor_file(path: &Path, tensor: &Array4<f32>) -> std::io::Result<()> {
    let mut bytes = Vec::with_capacity(tensor.len() * 4);
    for v in tensor.iter() {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    std::fs::write(path, bytes)
}
