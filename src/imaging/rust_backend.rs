//! Pure Rust backend. No external tools.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP) | `image` crate (pure Rust decoders) |
//! | Resize | `image::imageops::resize` with `Lanczos3` filter |
//! | Working raster | JPEG at quality 100, or PNG when the path says so |
//! | Compress | `image::codecs::jpeg::JpegEncoder` at the trial quality |
//!
//! There is no lossless optimization pass; the encoder output is the artifact.

use super::backend::{BackendError, Compressor, FsSizeProbe, Resizer, SizeProbe};
use super::params::{CompressParams, Quality, ResizeParams};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::path::Path;

/// Pure Rust backend using the `image` crate ecosystem.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Load and decode an image from disk.
fn load_image(path: &Path) -> Result<DynamicImage, BackendError> {
    ImageReader::open(path)
        .map_err(BackendError::Io)?
        .with_guessed_format()
        .map_err(BackendError::Io)?
        .decode()
        .map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
        })
}

/// Height that keeps the aspect ratio at `target_width`, never below 1px.
pub(crate) fn scaled_height(source: (u32, u32), target_width: u32) -> u32 {
    let (w, h) = source;
    let height = (h as f64 * target_width as f64 / w as f64).round() as u32;
    height.max(1)
}

/// Encode as baseline JPEG at `quality`. JPEG has no alpha, so it is flattened.
fn save_jpeg(img: &DynamicImage, path: &Path, quality: Quality) -> Result<(), BackendError> {
    let file = std::fs::File::create(path)?;
    let writer = std::io::BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(writer, quality.value() as u8);
    let encodable = match img {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => img.clone(),
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };
    encodable
        .write_with_encoder(encoder)
        .map_err(|e| BackendError::ProcessingFailed(format!("JPEG encode failed: {}", e)))
}

/// Save the working raster. Lossless when the path asks for PNG.
fn save_working(img: &DynamicImage, path: &Path) -> Result<(), BackendError> {
    match ImageFormat::from_path(path) {
        Ok(ImageFormat::Png) => img.save_with_format(path, ImageFormat::Png).map_err(|e| {
            BackendError::ProcessingFailed(format!("PNG encode failed: {}", e))
        }),
        Ok(ImageFormat::Jpeg) => save_jpeg(img, path, Quality::MAX),
        _ => Err(BackendError::ProcessingFailed(format!(
            "Unsupported working raster format: {}",
            path.display()
        ))),
    }
}

impl Resizer for RustBackend {
    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source)?;
        let height = scaled_height((img.width(), img.height()), params.width);
        let resized = img.resize_exact(params.width, height, FilterType::Lanczos3);
        save_working(&resized, &params.output)
    }
}

impl Compressor for RustBackend {
    fn compress(&self, params: &CompressParams) -> Result<(), BackendError> {
        let img = load_image(&params.input)?;
        save_jpeg(&img, &params.output, params.quality)
    }
}

impl SizeProbe for RustBackend {
    fn size_bytes(&self, path: &Path) -> Result<u64, BackendError> {
        FsSizeProbe.size_bytes(path)
    }
}
