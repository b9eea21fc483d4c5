//! End-to-end search over a synthetic catalog of solid-color dishes.
//!
//! The embedding model is replaced by an in-test function (mean RGB) so the
//! whole pipeline runs without ONNX Runtime, while the index, reducer and
//! catalog go through their real on-disk formats.

use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use ndarray::Array4;
use platter_core::bundle::golden::{self, GoldenTensor};
use platter_core::bundle::{BundleManifest, EmbeddingSpec, FileSpec, PreprocessSpec};
use platter_core::embedding::{EmbeddingFunction, Preprocessor, TensorLayout};
use platter_core::{
    search_with_timeout, ArtifactError, FlatIndex, ImageCatalog, InferenceContext, Metric,
    PcaProjection, PipelineError, PipelineResult,
};

const CATALOG_SIZE: usize = 100;

/// Mean of each channel over an NHWC tensor.
struct MeanRgb;

impl EmbeddingFunction for MeanRgb {
    fn dimension(&self) -> usize {
        3
    }

    fn embed(&self, tensor: &Array4<f32>) -> PipelineResult<Vec<f32>> {
        let pixels = (tensor.len() / 3) as f32;
        let mut sums = [0.0f32; 3];
        for ((_, _, _, c), v) in tensor.indexed_iter() {
            sums[c] += *v;
        }
        Ok(sums.iter().map(|s| s / pixels).collect())
    }
}

fn color(i: usize) -> [u8; 3] {
    [(i * 2) as u8, (255 - i * 2) as u8, ((i * 7) % 256) as u8]
}

fn png(rgb: [u8; 3]) -> Vec<u8> {
    let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 16, Rgb(rgb)));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

fn identity3() -> PcaProjection {
    PcaProjection::new(
        vec![0.0; 3],
        vec![
            vec![1.0, 0.0, 0.0],
            vec![0.0, 1.0, 0.0],
            vec![0.0, 0.0, 1.0],
        ],
        None,
        false,
    )
    .unwrap()
}

fn preprocessor() -> Preprocessor {
    Preprocessor::new(8, 8, TensorLayout::Nhwc, &PreprocessSpec::default())
}

/// Catalog images written to `root/images`, plus a context indexing them.
struct Fixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    paths: Vec<String>,
    context: InferenceContext,
}

fn fixture() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("images")).unwrap();

    let pre = preprocessor();
    let mut paths = Vec::with_capacity(CATALOG_SIZE);
    let mut rows = Vec::with_capacity(CATALOG_SIZE);
    for i in 0..CATALOG_SIZE {
        let rel = format!("images/dish_{i}_{:04}.png", i + 1);
        let bytes = png(color(i));
        std::fs::write(root.join(&rel), &bytes).unwrap();

        let image = image::load_from_memory(&bytes).unwrap();
        rows.push(MeanRgb.embed(&pre.preprocess(&image)).unwrap());
        paths.push(rel);
    }

    let context = InferenceContext::from_parts(
        pre,
        Box::new(MeanRgb),
        Box::new(identity3()),
        Box::new(FlatIndex::build(Metric::L2, &rows).unwrap()),
        ImageCatalog::new(paths.clone()),
    )
    .unwrap();

    Fixture {
        _dir: dir,
        root,
        paths,
        context,
    }
}

#[test]
fn catalog_image_finds_itself_first() {
    let fx = fixture();
    for i in [0, 17, 42, 99] {
        let bytes = std::fs::read(fx.root.join(&fx.paths[i])).unwrap();
        let hits = fx.context.pipeline().search_hits(&bytes, 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, fx.paths[i]);
        assert!(hits[0].distance.abs() < 1e-6, "distance {}", hits[0].distance);
    }
}

#[test]
fn oversized_k_returns_whole_catalog_in_order() {
    let fx = fixture();
    let hits = fx.context.pipeline().search_hits(&png([10, 200, 60]), 1000).unwrap();
    assert_eq!(hits.len(), CATALOG_SIZE);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));

    let mut ids: Vec<_> = hits.iter().map(|h| h.id).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), CATALOG_SIZE);
}

#[test]
fn corrupt_upload_is_decode_error() {
    let fx = fixture();
    let mut bytes = png([1, 2, 3]);
    bytes.truncate(20);
    let err = fx.context.pipeline().search(&bytes, 5).unwrap_err();
    assert!(matches!(err, PipelineError::Decode { .. }));
}

#[test]
fn repeated_queries_agree() {
    let fx = fixture();
    let bytes = png([77, 131, 5]);
    let first = fx.context.pipeline().search(&bytes, 10).unwrap();
    for _ in 0..3 {
        assert_eq!(fx.context.pipeline().search(&bytes, 10).unwrap(), first);
    }
}

#[tokio::test]
async fn concurrent_queries_share_one_context() {
    let fx = fixture();
    let ctx = Arc::new(fx.context);

    let tasks: Vec<_> = (0..8)
        .map(|i| {
            let ctx = Arc::clone(&ctx);
            let bytes = png(color(i * 10));
            tokio::spawn(search_with_timeout(ctx, bytes, 1, Duration::from_secs(10)))
        })
        .collect();

    for (i, task) in tasks.into_iter().enumerate() {
        let hits = task.await.unwrap().unwrap();
        assert_eq!(hits[0].path, fx.paths[i * 10]);
    }
}

// ── Loading from disk ──────────────────────────────────────────────────────

fn manifest(golden: Vec<GoldenTensor>) -> BundleManifest {
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
        golden,
    }
}

fn write_bundle(dir: &Path, catalog_len: usize, index_rows: usize, pca_input: usize) {
    let paths: Vec<String> = (0..catalog_len)
        .map(|i| format!("images/dish_{:04}.jpg", i + 1))
        .collect();
    std::fs::write(
        dir.join("image_paths.json"),
        serde_json::to_string(&paths).unwrap(),
    )
    .unwrap();

    let rows: Vec<Vec<f32>> = (0..index_rows).map(|i| vec![i as f32; 3]).collect();
    FlatIndex::build(Metric::L2, &rows)
        .unwrap()
        .save(&dir.join("recipes.index"))
        .unwrap();

    let components: Vec<Vec<f32>> = (0..3)
        .map(|r| (0..pca_input).map(|c| if r == c { 1.0 } else { 0.0 }).collect())
        .collect();
    std::fs::write(
        dir.join("pca.json"),
        serde_json::json!({ "mean": vec![0.0; pca_input], "components": components }).to_string(),
    )
    .unwrap();

    std::fs::write(
        dir.join(platter_core::bundle::MANIFEST_FILENAME),
        manifest(vec![]).to_toml().unwrap(),
    )
    .unwrap();
}

#[test]
fn catalog_index_count_mismatch_refuses_to_load() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), 99, 100, 3);

    let err = InferenceContext::load(dir.path(), Default::default())
        .err()
        .unwrap();
    assert!(matches!(err, ArtifactError::Consistency(_)), "{err}");
}

#[test]
fn reducer_input_mismatch_refuses_to_load() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), 5, 5, 4);

    let err = InferenceContext::load(dir.path(), Default::default())
        .err()
        .unwrap();
    assert!(err.to_string().contains("reducer expects 4"), "{err}");
}

#[test]
fn missing_model_is_not_found_after_checks_pass() {
    let dir = tempfile::tempdir().unwrap();
    write_bundle(dir.path(), 5, 5, 3);

    let err = InferenceContext::load(dir.path(), Default::default())
        .err()
        .unwrap();
    match err {
        ArtifactError::NotFound(path) => assert!(path.ends_with("embedding.onnx")),
        other => panic!("expected NotFound, got {other}"),
    }
}

#[test]
fn golden_tensors_detect_preprocessing_drift() {
    let dir = tempfile::tempdir().unwrap();
    let img = DynamicImage::ImageRgb8(RgbImage::from_fn(20, 12, |x, y| {
        Rgb([(x * 12) as u8, (y * 20) as u8, 90])
    }));
    img.save(dir.path().join("golden.png")).unwrap();

    let pre = preprocessor();
    golden::write_tensor_file(&dir.path().join("golden.bin"), &pre.preprocess(&img)).unwrap();
    let goldens = vec![GoldenTensor {
        image: PathBuf::from("golden.png"),
        tensor: PathBuf::from("golden.bin"),
        tolerance: 1e-5,
    }];

    let reports = golden::verify(dir.path(), &goldens, &pre).unwrap();
    assert!(reports[0].passed);

    let drifted = PreprocessSpec {
        mean: [0.485, 0.456, 0.406],
        std: [0.229, 0.224, 0.225],
        ..PreprocessSpec::default()
    };
    let drifted = Preprocessor::new(8, 8, TensorLayout::Nhwc, &drifted);
    let reports = golden::verify(dir.path(), &goldens, &drifted).unwrap();
    assert!(!reports[0].passed);
    assert!(reports[0].max_abs_diff > 0.1);
}
