//! Query image decoding with format sniffing and upload limits.

use std::io::Cursor;

use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader};

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};

/// Decoder for uploaded query images.
#[derive(Debug, Clone)]
pub struct ImageDecoder {
    limits: LimitsConfig,
}

impl Default for ImageDecoder {
    fn default() -> Self {
        Self::new(LimitsConfig::default())
    }
}

impl ImageDecoder {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Decode raw upload bytes. The format is detected from content, not name.
    pub fn decode(&self, bytes: &[u8]) -> PipelineResult<DynamicImage> {
        let max_bytes = self.limits.max_upload_size_mb.saturating_mul(1024 * 1024);
        if bytes.len() as u64 > max_bytes {
            return Err(PipelineError::Decode {
                message: format!(
                    "upload is {} bytes, limit is {}MB",
                    bytes.len(),
                    self.limits.max_upload_size_mb
                ),
            });
        }
        if bytes.is_empty() {
            return Err(PipelineError::Decode {
                message: "upload is empty".to_string(),
            });
        }

        let mut reader = ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(|e| PipelineError::Decode {
                message: format!("Cannot detect image format: {e}"),
            })?;
        let format = reader.format().ok_or_else(|| PipelineError::Decode {
            message: "unrecognized image format".to_string(),
        })?;

        let mut limits = image::Limits::default();
        limits.max_image_width = Some(self.limits.max_image_dimension);
        limits.max_image_height = Some(self.limits.max_image_dimension);
        reader.limits(limits);

        let image = reader.decode().map_err(|e| PipelineError::Decode {
            message: e.to_string(),
        })?;

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PipelineError::Decode {
                message: "image has no pixels".to_string(),
            });
        }
        tracing::trace!("Decoded {} {}x{}", format_to_string(format), width, height);
        Ok(image)
    }
}

/// Short name for an image format, for logs.
pub fn format_to_string(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpeg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        ImageFormat::Gif => "gif",
        ImageFormat::Tiff => "tiff",
        ImageFormat::Bmp => "bmp",
        _ => "other",
    }
}
