//! Transform backends.
//!
//! A backend turns a source file into a derived file given an ordered
//! filter list. [`NativeBackend`] does this in-process with the `image`
//! crate; see [`super::MagickBackend`] for the ImageMagick CLI backend.

use std::path::Path;

use assetforged_common::{Error, Result};
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::profiles::Filter;

/// External transformation backend.
pub trait TransformBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the backend can transform content of this mime type.
    fn supports(&self, mime_type: &str) -> bool;

    /// Transform `source` into `dest`, applying `filters` in order.
    fn transform(
        &self,
        source: &Path,
        mime_type: &str,
        filters: &[Filter],
        dest: &Path,
    ) -> Result<()>;
}

/// Strip parameters and normalise case: `Image/JPEG; q=1` -> `image/jpeg`.
pub fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Formats the native backend reads and writes.
const NATIVE_FORMATS: &[(&str, ImageFormat)] = &[
    ("image/jpeg", ImageFormat::Jpeg),
    ("image/pjpeg", ImageFormat::Jpeg),
    ("image/png", ImageFormat::Png),
    ("image/gif", ImageFormat::Gif),
    ("image/webp", ImageFormat::WebP),
    ("image/bmp", ImageFormat::Bmp),
    ("image/tiff", ImageFormat::Tiff),
];

/// In-process backend built on the `image` crate.
///
/// Output is written in the same format as the source.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }

    fn format_for(mime_type: &str) -> Option<ImageFormat> {
        let mime = essence(mime_type);
        NATIVE_FORMATS
            .iter()
            .find(|(m, _)| *m == mime)
            .map(|(_, f)| *f)
    }
}

impl TransformBackend for NativeBackend {
    fn name(&self) -> &str {
        "native"
    }

    fn supports(&self, mime_type: &str) -> bool {
        Self::format_for(mime_type).is_some()
    }

    fn transform(
        &self,
        source: &Path,
        mime_type: &str,
        filters: &[Filter],
        dest: &Path,
    ) -> Result<()> {
        let format = Self::format_for(mime_type).ok_or_else(|| {
            Error::generation(format!("native backend cannot write {}", mime_type))
        })?;

        let img = ImageReader::open(source)?
            .with_guessed_format()?
            .decode()
            .map_err(|e| {
                Error::generation(format!("failed to decode {}: {}", source.display(), e))
            })?;

        let img = filters.iter().fold(img, apply_filter);

        // JPEG cannot carry alpha.
        let img = match format {
            ImageFormat::Jpeg if img.color().has_alpha() => DynamicImage::ImageRgb8(img.to_rgb8()),
            _ => img,
        };

        img.save_with_format(dest, format)
            .map_err(|e| Error::generation(format!("failed to encode {}: {}", dest.display(), e)))
    }
}

fn apply_filter(img: DynamicImage, filter: &Filter) -> DynamicImage {
    match *filter {
        Filter::Scale { width, height } => img.resize(width, height, FilterType::Lanczos3),
        Filter::ScaleExact { width, height } => {
            img.resize_exact(width, height, FilterType::Lanczos3)
        }
        Filter::ScaleWidth { width } => img.resize(width, u32::MAX, FilterType::Lanczos3),
        Filter::ScaleHeight { height } => img.resize(u32::MAX, height, FilterType::Lanczos3),
        Filter::Crop {
            x,
            y,
            width,
            height,
        } => img.crop_imm(x, y, width, height),
        Filter::Grayscale => img.grayscale(),
        Filter::Blur { sigma } => img.blur(sigma),
    }
}
