use crate::routes::{convert, download, health};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(info(
    title = "imgpack-server",
    description = "Local image conversion and zip download API",
    version = "0.1.0",
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(convert::ConvertApi::openapi());
    root.merge(download::DownloadApi::openapi());
    root
}
