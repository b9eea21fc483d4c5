//! Image preprocessing for the embedding model.
//!
//! Every query image goes through the same steps the catalog images went
//! through at index-build time:
//! - convert to 8-bit RGB (alpha dropped, grayscale expanded)
//! - resize to the model's exact input size with the bundle's filter
//! - normalize each channel as `(pixel * scale - mean[c]) / std[c]`
//! - lay out as a batch of one, NHWC or NCHW

use image::imageops::{self, FilterType};
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use crate::bundle::PreprocessSpec;

/// Number of color channels (RGB).
const CHANNELS: usize = 3;

/// Memory layout the model expects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorLayout {
    /// [batch, height, width, channels] (Keras/TensorFlow exports)
    #[default]
    Nhwc,
    /// [batch, channels, height, width] (PyTorch exports)
    Nchw,
}

/// Resampling filter used to reach the model input size.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResizeFilter {
    Nearest,
    /// Bilinear
    #[default]
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Deterministic image → tensor transform.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    width: u32,
    height: u32,
    layout: TensorLayout,
    filter: ResizeFilter,
    scale: f32,
    mean: [f32; 3],
    std: [f32; 3],
}

impl Preprocessor {
    pub fn new(width: u32, height: u32, layout: TensorLayout, spec: &PreprocessSpec) -> Self {
        Self {
            width,
            height,
            layout,
            filter: spec.filter,
            scale: spec.scale,
            mean: spec.mean,
            std: spec.std,
        }
    }

    /// Tensor shape produced by [`Preprocessor::preprocess`].
    pub fn shape(&self) -> [usize; 4] {
        let (h, w) = (self.height as usize, self.width as usize);
        match self.layout {
            TensorLayout::Nhwc => [1, h, w, CHANNELS],
            TensorLayout::Nchw => [1, CHANNELS, h, w],
        }
    }

    pub fn layout(&self) -> TensorLayout {
        self.layout
    }

    /// Convert, resize and normalize one image.
    pub fn preprocess(&self, image: &DynamicImage) -> Array4<f32> {
        let rgb = self.resized_rgb(image);
        let [_, d1, d2, d3] = self.shape();

        match self.layout {
            TensorLayout::Nhwc => Array4::from_shape_fn((1, d1, d2, d3), |(_, y, x, c)| {
                self.normalize(rgb.get_pixel(x as u32, y as u32)[c], c)
            }),
            TensorLayout::Nchw => Array4::from_shape_fn((1, d1, d2, d3), |(_, c, y, x)| {
                self.normalize(rgb.get_pixel(x as u32, y as u32)[c], c)
            }),
        }
    }

    fn resized_rgb(&self, image: &DynamicImage) -> RgbImage {
        let rgb = image.to_rgb8();
        if rgb.dimensions() == (self.width, self.height) {
            return rgb;
        }
        imageops::resize(&rgb, self.width, self.height, self.filter.into())
    }

    #[inline]
    fn normalize(&self, value: u8, channel: usize) -> f32 {
        (value as f32 * self.scale - self.mean[channel]) / self.std[channel]
    }
}
