//! Image conversion route.
//!
//! Reads the whole multipart body first so the target format can be
//! validated before anything touches the disk, then stores the uploads in a
//! fresh workspace and converts them one by one on a blocking thread.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Multipart, State};
use axum::routing::post;
use axum::{Json, Router};
use imgpack_core::{FileOutcome, StoredUpload, TargetFormat, Workspace, convert, workspace};
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::schemas::convert::{ConvertResponse, ConvertUpload, FileResult};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(convert_images),
    components(schemas(ConvertUpload, ConvertResponse, FileResult))
)]
pub struct ConvertApi;

/// Register conversion routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/convert", post(convert_images))
}

/// One file part read from the request.
struct UploadPart {
    file_name: String,
    media_type: String,
    bytes: Bytes,
}

/// Batch image conversion (`POST /convert`).
///
/// Every file part is converted to `format`.  One failing file does not fail
/// the request: each input gets its own entry in `results`, and `files` lists
/// the outputs that were written.
#[utoipa::path(
    post,
    path = "/convert",
    tag = "convert",
    request_body(content = ConvertUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Per-file conversion results", body = ConvertResponse),
        (status = 400, description = "Missing or unsupported format, or unusable filename"),
        (status = 500, description = "Upload could not be stored"),
        (status = 504, description = "Conversion did not finish in time"),
    )
)]
pub async fn convert_images(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<ConvertResponse>, ServerError> {
    let (format, parts) = read_form(&mut multipart).await?;

    let format = format.ok_or_else(|| {
        ServerError::BadRequest(format!(
            "missing form field `format`; supported formats: {}",
            TargetFormat::supported().join(", ")
        ))
    })?;
    let format = TargetFormat::parse(&format)?;
    for part in &parts {
        workspace::upload_file_name(&part.file_name)?;
    }
    debug!(%format, files = parts.len(), "conversion request");

    let roots = state.roots.clone();
    let (ws, uploads) = tokio::task::spawn_blocking(move || store_parts(&roots, parts)).await??;

    let batch_ws = ws.clone();
    let outcomes = tokio::time::timeout(
        state.config.conversion_timeout,
        tokio::task::spawn_blocking(move || convert::convert_batch(&batch_ws, &uploads, format)),
    )
    .await
    .map_err(|_| {
        ServerError::Timeout(format!(
            "conversion did not finish within {}s",
            state.config.conversion_timeout.as_secs()
        ))
    })??;

    let response = summarize(&ws, outcomes);
    info!(
        workspace = %ws.id(),
        converted = response.files.len(),
        total = response.results.len(),
        "conversion batch finished"
    );
    Ok(Json(response))
}

async fn read_form(multipart: &mut Multipart) -> Result<(Option<String>, Vec<UploadPart>), ServerError> {
    let mut format = None;
    let mut parts = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        let field_name = field.name().unwrap_or_default().to_owned();
        match field.file_name().map(str::to_owned) {
            // An empty file input still submits a part with `filename=""`.
            Some(file_name) if file_name.is_empty() => {
                debug!(field = %field_name, "skipping file part without a name");
            }
            Some(file_name) => {
                let media_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_owned();
                let bytes = field.bytes().await.map_err(|e| {
                    ServerError::BadRequest(format!("Failed to read file '{file_name}': {e}"))
                })?;
                parts.push(UploadPart { file_name, media_type, bytes });
            }
            None if field_name == "format" => {
                let value = field.text().await.map_err(|e| {
                    ServerError::BadRequest(format!("Failed to read `format` field: {e}"))
                })?;
                format = Some(value);
            }
            None => debug!(field = %field_name, "ignoring unknown form field"),
        }
    }

    Ok((format, parts))
}

/// Write every part into a new workspace.  A failed write aborts the batch;
/// parts written before it stay on disk.
fn store_parts(
    roots: &imgpack_core::WorkspaceRoots,
    parts: Vec<UploadPart>,
) -> imgpack_core::Result<(Workspace, Vec<StoredUpload>)> {
    let ws = roots.create()?;
    let uploads = parts
        .iter()
        .map(|part| ws.store(&part.file_name, &part.media_type, &part.bytes))
        .collect::<imgpack_core::Result<Vec<_>>>()?;
    Ok((ws, uploads))
}

fn summarize(ws: &Workspace, outcomes: Vec<FileOutcome>) -> ConvertResponse {
    let files: Vec<String> = outcomes
        .iter()
        .filter_map(|o| o.output().map(str::to_owned))
        .collect();
    let total = outcomes.len();
    let message = if total == 0 {
        "No images uploaded".to_owned()
    } else if files.len() == total {
        "Images converted!".to_owned()
    } else {
        format!("Converted {} of {} images", files.len(), total)
    };

    ConvertResponse {
        message,
        workspace: ws.id().to_string(),
        files,
        results: outcomes.into_iter().map(FileResult::from).collect(),
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_utils::{TestApp, ico_bytes, png_bytes};
    use axum::http::StatusCode;
    use axum_test::multipart::{MultipartForm, Part};
    use std::time::Duration;

    fn image_part(bytes: Vec<u8>, name: &str, mime: &str) -> Part {
        Part::bytes(bytes).file_name(name).mime_type(mime)
    }

    #[tokio::test]
    async fn converts_icon_to_png() {
        let app = TestApp::new();
        let form = MultipartForm::new()
            .add_part("images", image_part(ico_bytes(&[16, 32]), "cat.ico", "image/vnd.microsoft.icon"))
            .add_text("format", "png");

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status_ok();
        let body: ConvertResponse = response.json();
        assert_eq!(body.files, vec!["cat.png"]);
        assert_eq!(body.message, "Images converted!");
        let ws = app.state.roots.open(&body.workspace).unwrap();
        let out = image::open(ws.upload_dir().join("cat.png")).unwrap();
        assert_eq!((out.width(), out.height()), (32, 32));
    }

    #[tokio::test]
    async fn format_field_may_come_before_or_after_files() {
        let app = TestApp::new();
        let form = MultipartForm::new()
            .add_text("format", "JPG")
            .add_part("images", image_part(png_bytes(8, 8), "photo.v2.png", "image/png"));

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status_ok();
        let body: ConvertResponse = response.json();
        assert_eq!(body.files, vec!["photo.v2.jpeg"]);
    }

    #[tokio::test]
    async fn decodes_percent_encoded_filenames() {
        let app = TestApp::new();
        let form = MultipartForm::new()
            .add_part("images", image_part(png_bytes(4, 4), "%E7%8C%AB.png", "image/png"))
            .add_text("format", "webp");

        let response = app.server.post("/convert").multipart(form).await;

        let body: ConvertResponse = response.json();
        assert_eq!(body.files, vec!["猫.webp"]);
    }

    #[tokio::test]
    async fn reports_failed_files_individually() {
        let app = TestApp::new();
        let form = MultipartForm::new()
            .add_part("images", image_part(b"garbage".to_vec(), "bad.png", "image/png"))
            .add_part("images", image_part(png_bytes(4, 4), "good.png", "image/png"))
            .add_text("format", "gif");

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status_ok();
        let body: ConvertResponse = response.json();
        assert_eq!(body.files, vec!["good.gif"]);
        assert_eq!(body.message, "Converted 1 of 2 images");
        assert!(matches!(&body.results[0], FileResult::Failed { source, .. } if source == "bad.png"));
        assert_eq!(
            body.results[1],
            FileResult::Converted { source: "good.png".into(), output: "good.gif".into() }
        );
    }

    #[tokio::test]
    async fn unsupported_format_fails_before_any_upload_is_stored() {
        let app = TestApp::new();
        let form = MultipartForm::new()
            .add_part("images", image_part(png_bytes(4, 4), "a.png", "image/png"))
            .add_text("format", "heic");

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "unsupported_format");
        assert_eq!(std::fs::read_dir(app.state.roots.uploads()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn missing_format_is_rejected() {
        let app = TestApp::new();
        let form = MultipartForm::new()
            .add_part("images", image_part(png_bytes(4, 4), "a.png", "image/png"));

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        let body: serde_json::Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("format"));
    }

    #[tokio::test]
    async fn nameless_file_parts_are_skipped() {
        let app = TestApp::new();
        let form = MultipartForm::new()
            .add_part("images", image_part(Vec::new(), "", "application/octet-stream"))
            .add_part("images", image_part(png_bytes(4, 4), "a.png", "image/png"))
            .add_text("format", "bmp");

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status_ok();
        let body: ConvertResponse = response.json();
        assert_eq!(body.files, vec!["a.bmp"]);
        assert_eq!(body.results.len(), 1);
    }

    #[tokio::test]
    async fn unwritable_upload_root_is_a_storage_error() {
        let app = TestApp::new();
        let uploads = app.state.roots.uploads().to_path_buf();
        std::fs::remove_dir_all(&uploads).unwrap();
        std::fs::write(&uploads, b"not a directory").unwrap();
        let form = MultipartForm::new()
            .add_part("images", image_part(png_bytes(4, 4), "a.png", "image/png"))
            .add_text("format", "png");

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "storage_error");
        assert_eq!(body["error"], "internal server error");
    }

    #[tokio::test]
    async fn slow_conversion_times_out() {
        let app = TestApp::with_config(|cfg| cfg.conversion_timeout = Duration::ZERO);
        let form = MultipartForm::new()
            .add_part("images", image_part(png_bytes(1024, 1024), "big.png", "image/png"))
            .add_text("format", "gif");

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status(StatusCode::GATEWAY_TIMEOUT);
        let body: serde_json::Value = response.json();
        assert_eq!(body["code"], "timeout");
    }

    #[tokio::test]
    async fn empty_batch_is_not_an_error() {
        let app = TestApp::new();
        let form = MultipartForm::new().add_text("format", "png");

        let response = app.server.post("/convert").multipart(form).await;

        response.assert_status_ok();
        let body: ConvertResponse = response.json();
        assert!(body.files.is_empty());
        assert_eq!(body.message, "No images uploaded");
    }
}
