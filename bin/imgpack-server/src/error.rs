//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON-body HTTP response with an appropriate status code.
//!
//! **Security note:** storage and other internal errors are logged with full
//! detail but only a generic message and an error code are returned, so
//! filesystem paths never reach the client.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use imgpack_core::CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the imgpack-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the conversion pipeline.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The server is draining and refuses new work.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A bounded operation did not finish in time.
    #[error("timed out: {0}")]
    Timeout(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            ServerError::Core(CoreError::UnsupportedFormat(_)) => "unsupported_format",
            ServerError::Core(CoreError::InvalidFileName(_)) => "invalid_file_name",
            ServerError::Core(CoreError::InvalidWorkspace(_)) => "invalid_workspace",
            ServerError::Core(CoreError::Io(_)) => "storage_error",
            ServerError::Core(CoreError::Image(_)) => "conversion_error",
            ServerError::Core(CoreError::Zip(_)) => "archive_error",
            ServerError::BadRequest(_) => "bad_request",
            ServerError::ServiceUnavailable(_) => "shutting_down",
            ServerError::Timeout(_) => "timeout",
            ServerError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let code = self.code();
        let (status, client_message) = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            ServerError::Timeout(m) => (StatusCode::GATEWAY_TIMEOUT, m.clone()),
            ServerError::Core(
                e @ (CoreError::UnsupportedFormat(_)
                | CoreError::InvalidFileName(_)
                | CoreError::InvalidWorkspace(_)),
            ) => (StatusCode::BAD_REQUEST, e.to_string()),

            // Internal errors: log the full detail, return an opaque message.
            ServerError::Core(e) => {
                error!(error = %e, code, "pipeline error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(json!({ "error": client_message, "code": code }))).into_response()
    }
}

impl From<tokio::task::JoinError> for ServerError {
    fn from(e: tokio::task::JoinError) -> Self {
        ServerError::Internal(format!("blocking task failed: {e}"))
    }
}
