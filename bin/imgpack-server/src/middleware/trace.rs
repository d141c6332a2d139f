use axum::{
    body::{Body, Bytes},
    extract::Request,
    http::{HeaderMap, HeaderValue, header},
    middleware::Next,
    response::Response,
};
use http_body_util::BodyExt;
use std::time::Instant;
use tracing::{Instrument, info, info_span, warn};
use uuid::Uuid;

pub static X_TRACE_ID: &str = "x-trace-id";

/// JSON bodies up to this size are logged verbatim.
const MAX_LOGGED_BODY: usize = 1024;

/// Wrap each request in an `http_request` span keyed by a trace id, taken from
/// the caller's `x-trace-id` when it is a valid uuid and generated otherwise.
/// The id is echoed on the response.
pub async fn trace_middleware(mut req: Request, next: Next) -> Response {
    let started = Instant::now();
    let trace_id = incoming_trace_id(req.headers()).unwrap_or_else(Uuid::new_v4);
    let span = info_span!(
        "http_request",
        %trace_id,
        method = %req.method(),
        path = %req.uri().path(),
    );

    async move {
        info!(content_length = ?content_length(req.headers()), "→ request started");
        let trace_header = HeaderValue::from_str(&trace_id.to_string()).ok();
        if let Some(value) = &trace_header {
            req.headers_mut().insert(X_TRACE_ID, value.clone());
        }
        let req = map_body(req, "request").await;

        let mut response = map_response_body(next.run(req).await).await;
        if let Some(value) = trace_header {
            response.headers_mut().insert(X_TRACE_ID, value);
        }

        info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis(),
            "← response finished"
        );
        response
    }
    .instrument(span)
    .await
}

fn incoming_trace_id(headers: &HeaderMap) -> Option<Uuid> {
    let raw = headers.get(X_TRACE_ID)?.to_str().ok()?;
    Uuid::parse_str(raw).ok()
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers.get(header::CONTENT_LENGTH)?.to_str().ok()?.parse().ok()
}

async fn map_body(req: Request, direction: &str) -> Request {
    let (parts, body) = req.into_parts();
    let body = log_json_body(direction, &parts.headers, body).await;
    Request::from_parts(parts, body)
}

async fn map_response_body(response: Response) -> Response {
    let (parts, body) = response.into_parts();
    let body = log_json_body("response", &parts.headers, body).await;
    Response::from_parts(parts, body)
}

/// Buffer and log small JSON bodies.  Multipart uploads, zip archives and
/// static assets stream through untouched.
async fn log_json_body(direction: &str, headers: &HeaderMap, body: Body) -> Body {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));
    if !is_json {
        return body;
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!(error = %e, "{direction} body could not be read");
            Bytes::new()
        }
    };

    match std::str::from_utf8(&bytes) {
        Ok(text) if bytes.len() < MAX_LOGGED_BODY => info!("{direction} body: {text}"),
        _ => info!("{direction} body: [skipped: size={}]", bytes.len()),
    }

    Body::from(bytes)
}
