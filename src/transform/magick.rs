//! ImageMagick CLI backend.

use std::path::{Path, PathBuf};
use std::process::Command;

use assetforged_common::{Error, Result};

use super::backend::{essence, TransformBackend};
use super::tools::find_imagemagick;
use crate::profiles::Filter;

/// Backend that shells out to ImageMagick.
#[derive(Debug, Clone)]
pub struct MagickBackend {
    program: PathBuf,
}

impl MagickBackend {
    pub fn new(program: PathBuf) -> Self {
        Self { program }
    }

    /// Find ImageMagick on the configured path or on PATH.
    pub fn discover(config_path: Option<&Path>) -> Result<Self> {
        find_imagemagick(config_path).map(Self::new)
    }
}

/// ImageMagick output coder for a mime type. The staging file has no
/// extension, so the format is always spelled out.
fn coder_for(mime_type: &str) -> Option<&'static str> {
    match essence(mime_type).as_str() {
        "image/jpeg" | "image/pjpeg" => Some("JPEG"),
        "image/png" => Some("PNG"),
        "image/gif" => Some("GIF"),
        "image/webp" => Some("WEBP"),
        "image/bmp" => Some("BMP"),
        "image/tiff" => Some("TIFF"),
        "image/avif" => Some("AVIF"),
        "image/heic" => Some("HEIC"),
        "application/pdf" => Some("PDF"),
        _ => None,
    }
}

/// Translate filters into ImageMagick operators.
pub fn filter_args(filters: &[Filter]) -> Vec<String> {
    let mut args = Vec::new();
    for filter in filters {
        match *filter {
            Filter::Scale { width, height } => {
                args.extend(["-resize".to_string(), format!("{}x{}", width, height)])
            }
            Filter::ScaleExact { width, height } => {
                args.extend(["-resize".to_string(), format!("{}x{}!", width, height)])
            }
            Filter::ScaleWidth { width } => {
                args.extend(["-resize".to_string(), format!("{}", width)])
            }
            Filter::ScaleHeight { height } => {
                args.extend(["-resize".to_string(), format!("x{}", height)])
            }
            Filter::Crop {
                x,
                y,
                width,
                height,
            } => args.extend([
                "-crop".to_string(),
                format!("{}x{}+{}+{}", width, height, x, y),
                "+repage".to_string(),
            ]),
            Filter::Grayscale => args.extend(["-colorspace".to_string(), "Gray".to_string()]),
            Filter::Blur { sigma } => {
                args.extend(["-blur".to_string(), format!("0x{}", sigma)])
            }
        }
    }
    args
}

impl TransformBackend for MagickBackend {
    fn name(&self) -> &str {
        "imagemagick"
    }

    fn supports(&self, mime_type: &str) -> bool {
        coder_for(mime_type).is_some()
    }

    fn transform(
        &self,
        source: &Path,
        mime_type: &str,
        filters: &[Filter],
        dest: &Path,
    ) -> Result<()> {
        let coder = coder_for(mime_type)
            .ok_or_else(|| Error::generation(format!("imagemagick cannot write {}", mime_type)))?;

        // Only the first page/frame of multi-image sources.
        let input = format!("{}[0]", source.display());
        let output = format!("{}:{}", coder, dest.display());

        let result = Command::new(&self.program)
            .arg(&input)
            .args(filter_args(filters))
            .arg(&output)
            .output()
            .map_err(|e| {
                Error::generation(format!("failed to run {}: {}", self.program.display(), e))
            })?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(Error::generation(format!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                stderr.trim()
            )));
        }

        Ok(())
    }
}
