use thiserror::Error;

/// Errors that can be returned by imgpack-core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A filesystem I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The imaging library could not decode or encode an image.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// Failed to write the zip archive.
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The requested target format is not one of the supported outputs.
    #[error("unsupported target format: {0}")]
    UnsupportedFormat(String),

    /// A filename that cannot be used as a single path component.
    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    /// A workspace id that is malformed or does not exist.
    #[error("invalid workspace: {0}")]
    InvalidWorkspace(String),
}

pub type Result<T, E = CoreError> = std::result::Result<T, E>;
