//! Archive download route.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, header};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use imgpack_core::{ARCHIVE_FILE_NAME, archive, codec};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{info, warn};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::download::DownloadRequest;
use crate::state::AppState;

/// Percent-encoded, comma-separated names that were requested but not packed.
pub const X_ARCHIVE_MISSING: HeaderName = HeaderName::from_static("x-archive-missing");

#[derive(OpenApi)]
#[openapi(paths(download_archive), components(schemas(DownloadRequest)))]
pub struct DownloadApi;

/// Register download routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download", post(download_archive))
}

/// Zip download (`POST /download`).
///
/// Packs the named files of a workspace into `converted_files.zip` and sends
/// it once the archive is completely written.  Names that do not exist are
/// skipped and listed in the `x-archive-missing` header.
#[utoipa::path(
    post,
    path = "/download",
    tag = "download",
    request_body = DownloadRequest,
    responses(
        (status = 200, description = "Zip archive", content_type = "application/zip", body = Vec<u8>),
        (status = 400, description = "Unknown or malformed workspace id"),
        (status = 500, description = "Archive could not be written"),
    )
)]
pub async fn download_archive(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DownloadRequest>,
) -> Result<Response, ServerError> {
    let roots = state.roots.clone();
    let report = tokio::task::spawn_blocking(move || {
        let ws = roots.open(&req.workspace)?;
        archive::build_archive(&ws, req.files.as_slice())
    })
    .await??;

    // Stream the finished archive from disk rather than buffering it.
    let served = ServeFile::new(&report.path)
        .oneshot(Request::new(Body::empty()))
        .await
        .unwrap_or_else(|never| match never {});
    if !served.status().is_success() {
        return Err(ServerError::Internal(format!(
            "archive {} could not be served: {}",
            report.path.display(),
            served.status()
        )));
    }
    let mut response = served.map(Body::new);

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&format!("attachment; filename=\"{ARCHIVE_FILE_NAME}\""))
            .map_err(|e| ServerError::Internal(e.to_string()))?,
    );
    if !report.missing.is_empty() {
        let missing: Vec<String> = report.missing.iter().map(|n| codec::encode(n)).collect();
        warn!(missing = ?report.missing, "download requested files that do not exist");
        match HeaderValue::from_str(&missing.join(",")) {
            Ok(value) => {
                headers.insert(X_ARCHIVE_MISSING, value);
            }
            Err(e) => warn!(error = %e, "missing-file list not representable as a header"),
        }
    }

    info!(
        entries = report.included.len(),
        missing = report.missing.len(),
        "archive sent"
    );
    Ok(response)
}

// ── Tests ──────────────────────────────────────────────────────────────────────
