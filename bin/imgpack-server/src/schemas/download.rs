use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /download`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DownloadRequest {
    /// Workspace id returned by `POST /convert`.
    pub workspace: String,
    /// Converted filenames to pack.
    #[serde(default)]
    pub files: Vec<String>,
}
