//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection, drain guard,
//!   request timeout, body limit)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `IMGPACK_ENABLE_SWAGGER=false`)
//! - Health, conversion and download routes
//! - The static front-end bundle as fallback

mod convert;
pub mod doc;
mod download;
mod health;

use axum::{Router, extract::DefaultBodyLimit, middleware};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::timeout::TimeoutLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, guard, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(convert::router())
        .merge(download::router());

    let mut app = Router::new().merge(api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.fallback_service(ServeDir::new(&state.config.static_dir))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            guard::reject_when_draining,
        ))
        // Outermost layers execute first on the way in.
        .layer(
            ServiceBuilder::new()
                .layer(cors::cors_layer(state.clone()))
                .layer(TimeoutLayer::new(state.config.request_timeout)),
        )
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
