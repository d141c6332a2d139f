use imgpack_core::FileOutcome;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Multipart body of `POST /convert` (documentation only; the handler reads
/// the stream directly).
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ConvertUpload {
    /// One or more binary image file parts, conventionally under the field
    /// name `images`.
    pub images: Vec<String>,
    /// Target format, e.g. `png`, `jpeg`, `webp`.
    pub format: String,
}

/// Per-file conversion result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FileResult {
    Converted { source: String, output: String },
    Failed { source: String, reason: String },
}

impl From<FileOutcome> for FileResult {
    fn from(outcome: FileOutcome) -> Self {
        match outcome {
            FileOutcome::Converted { source, output } => FileResult::Converted { source, output },
            FileOutcome::Failed { source, reason } => FileResult::Failed { source, reason },
        }
    }
}

/// Response body of `POST /convert`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConvertResponse {
    pub message: String,
    /// Workspace id to pass back to `POST /download`.
    pub workspace: String,
    /// Output filenames of the successful conversions, in upload order.
    pub files: Vec<String>,
    pub results: Vec<FileResult>,
}
