use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::error::ServerError;
use crate::lifecycle::Phase;
use crate::state::AppState;

/// Refuse new requests once shutdown has begun so the drain only waits for
/// work that was already running.
pub async fn reject_when_draining(
    State(state): State<Arc<AppState>>,
    req: Request,
    next: Next,
) -> Response {
    match state.lifecycle.phase() {
        Phase::ShuttingDown | Phase::Stopped => {
            ServerError::ServiceUnavailable("server is shutting down".into()).into_response()
        }
        Phase::Starting | Phase::Listening => next.run(req).await,
    }
}
