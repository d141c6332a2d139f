//! Conversion dispatcher.
//!
//! Each stored upload is decoded, normalised to a pixel layout the target
//! encoder accepts, and written next to the original as
//! `<stem>.<extension>`.  Icon containers take a two-step path: the ICO is
//! first flattened into an in-memory PNG, which is then re-encoded.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, ImageFormat, ImageReader};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::format::TargetFormat;
use crate::workspace::{StoredUpload, Workspace};

/// The ICO encoder cannot store entries larger than this on either side.
const ICO_MAX_SIDE: u32 = 256;

/// How a stored upload must be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Raster,
    Icon,
}

impl SourceKind {
    /// Classify a declared media type such as `image/vnd.microsoft.icon`.
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        match essence.as_str() {
            "image/vnd.microsoft.icon" | "image/x-icon" => SourceKind::Icon,
            _ => SourceKind::Raster,
        }
    }
}

/// Result of converting one upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileOutcome {
    Converted { source: String, output: String },
    Failed { source: String, reason: String },
}

impl FileOutcome {
    /// Output filename when the conversion succeeded.
    pub fn output(&self) -> Option<&str> {
        match self {
            FileOutcome::Converted { output, .. } => Some(output),
            FileOutcome::Failed { .. } => None,
        }
    }
}

/// Drop the last `.`-segment when it is a non-empty alphanumeric extension.
///
/// `photo.v2.png` → `photo.v2`, `README` → `README`, `archive.tar-gz` is left
/// untouched.
pub fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot)
            if dot + 1 < name.len()
                && name[dot + 1..].bytes().all(|b| b.is_ascii_alphanumeric()) =>
        {
            &name[..dot]
        }
        _ => name,
    }
}

/// Name of the converted file for `file_name`.
pub fn output_name(file_name: &str, format: TargetFormat) -> String {
    format!("{}.{}", strip_extension(file_name), format.extension())
}

/// Convert every upload in list order.  A failing file is reported and the
/// batch moves on; outputs already written stay on disk.
pub fn convert_batch(
    workspace: &Workspace,
    uploads: &[StoredUpload],
    format: TargetFormat,
) -> Vec<FileOutcome> {
    uploads
        .iter()
        .map(|upload| match convert_file(upload, workspace.upload_dir(), format) {
            Ok(output) => {
                info!(workspace = %workspace.id(), source = %upload.file_name, %output, "image converted");
                FileOutcome::Converted { source: upload.file_name.clone(), output }
            }
            Err(e) => {
                warn!(workspace = %workspace.id(), source = %upload.file_name, error = %e, "image conversion failed");
                FileOutcome::Failed { source: upload.file_name.clone(), reason: e.to_string() }
            }
        })
        .collect()
}

/// Convert a single upload into `out_dir`, returning the output filename.
pub fn convert_file(upload: &StoredUpload, out_dir: &Path, format: TargetFormat) -> Result<String> {
    let output = output_name(&upload.file_name, format);
    let kind = SourceKind::from_media_type(&upload.media_type);
    debug!(source = %upload.file_name, ?kind, %format, "converting");

    let image = match kind {
        SourceKind::Icon => {
            let png = icon_to_png(&std::fs::read(&upload.path)?)?;
            image::load_from_memory_with_format(&png, ImageFormat::Png)?
        }
        SourceKind::Raster => ImageReader::open(&upload.path)?.with_guessed_format()?.decode()?,
    };

    prepare(image, format).save_with_format(out_dir.join(&output), format.image_format())?;
    Ok(output)
}

/// Flatten an ICO container (its largest entry) into PNG bytes.
pub fn icon_to_png(ico: &[u8]) -> Result<Vec<u8>> {
    let icon = image::load_from_memory_with_format(ico, ImageFormat::Ico)?;
    let mut png = Cursor::new(Vec::new());
    icon.write_to(&mut png, ImageFormat::Png)?;
    Ok(png.into_inner())
}

/// Convert pixel layout to one the target encoder accepts.
fn prepare(image: DynamicImage, format: TargetFormat) -> DynamicImage {
    match format {
        TargetFormat::Png => match image {
            DynamicImage::ImageRgb32F(_) | DynamicImage::ImageRgba32F(_) => {
                DynamicImage::ImageRgba16(image.to_rgba16())
            }
            other => other,
        },
        TargetFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        TargetFormat::Ico if image.width() > ICO_MAX_SIDE || image.height() > ICO_MAX_SIDE => {
            DynamicImage::ImageRgba8(image.thumbnail(ICO_MAX_SIDE, ICO_MAX_SIDE).to_rgba8())
        }
        _ => DynamicImage::ImageRgba8(image.to_rgba8()),
    }
}
