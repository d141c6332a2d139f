//! The closed set of output formats a batch may request.

use std::str::FromStr;

use image::ImageFormat;
use serde::Serialize;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::error::CoreError;

/// An output format supported by the conversion pipeline.
///
/// Parsing is case-insensitive and accepts the usual aliases (`jpg`, `tif`).
/// [`Display`](std::fmt::Display) yields the canonical name, which is also the
/// extension given to converted files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, Serialize)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum TargetFormat {
    Png,
    #[strum(to_string = "jpeg", serialize = "jpg")]
    Jpeg,
    Webp,
    Gif,
    Bmp,
    #[strum(to_string = "tiff", serialize = "tif")]
    Tiff,
    Ico,
}

impl TargetFormat {
    /// Validate a client-supplied format identifier.
    pub fn parse(raw: &str) -> Result<Self, CoreError> {
        Self::from_str(raw.trim()).map_err(|_| CoreError::UnsupportedFormat(raw.to_owned()))
    }

    /// File extension (without the dot) for converted files.
    pub fn extension(self) -> String {
        self.to_string()
    }

    pub fn image_format(self) -> ImageFormat {
        match self {
            TargetFormat::Png => ImageFormat::Png,
            TargetFormat::Jpeg => ImageFormat::Jpeg,
            TargetFormat::Webp => ImageFormat::WebP,
            TargetFormat::Gif => ImageFormat::Gif,
            TargetFormat::Bmp => ImageFormat::Bmp,
            TargetFormat::Tiff => ImageFormat::Tiff,
            TargetFormat::Ico => ImageFormat::Ico,
        }
    }

    /// Canonical names of every supported format, for error messages and docs.
    pub fn supported() -> Vec<String> {
        Self::iter().map(|f| f.to_string()).collect()
    }
}
