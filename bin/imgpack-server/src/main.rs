//! imgpack-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON or pretty).
//! 3. Create the uploads / downloads working roots.
//! 4. Bind (ephemeral port by default), open the browser, serve.
//! 5. On SIGINT/SIGTERM: refuse new requests, drain in-flight ones, purge the
//!    working roots, exit with a status reflecting whether that was clean.
//!
//! The runtime is built by hand so its teardown can be bounded: a conversion
//! that already timed out keeps its blocking thread, and dropping the runtime
//! would otherwise wait for it.

mod config;
mod error;
mod lifecycle;
mod middleware;
mod routes;
mod schemas;
mod state;
#[cfg(test)]
mod test_utils;

use std::process::ExitCode;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::Config;
use crate::lifecycle::Phase;
use crate::state::AppState;

fn main() -> anyhow::Result<ExitCode> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    // Build the log-level filter, warning loudly if the configured value is
    // not a valid tracing filter expression.
    let env_filter = match tracing_subscriber::EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<tracing_subscriber::EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: IMGPACK_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                tracing_subscriber::EnvFilter::new("info")
            }
        },
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true);

    if cfg.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    info!(version = env!("CARGO_PKG_VERSION"), "imgpack-server starting");

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let result = runtime.block_on(serve(cfg.clone()));
    lifecycle::shutdown_runtime(runtime, cfg.drain_timeout);
    result
}

async fn serve(cfg: Config) -> anyhow::Result<ExitCode> {
    // ── 3. Working roots ───────────────────────────────────────────────────────
    let state = Arc::new(AppState::new(cfg.clone()));
    state.roots.ensure()?;
    info!(
        uploads = %state.roots.uploads().display(),
        downloads = %state.roots.downloads().display(),
        static_dir = %cfg.static_dir.display(),
        "working directories ready"
    );

    // ── 4. HTTP server ─────────────────────────────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind(&cfg.bind_address).await?;
    let addr = listener.local_addr()?;
    let url = if addr.ip().is_unspecified() || addr.ip().is_loopback() {
        format!("http://localhost:{}", addr.port())
    } else {
        format!("http://{addr}")
    };
    state.lifecycle.advance(Phase::Listening);
    info!(%addr, %url, "HTTP server listening");

    if cfg.open_browser {
        tokio::spawn(lifecycle::open_browser(url));
    }

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(lifecycle::shutdown_signal(state.lifecycle.clone()));
    let drained = lifecycle::drain(server, &state.lifecycle, cfg.drain_timeout).await?;

    // ── 5. Cleanup ─────────────────────────────────────────────────────────────
    info!("deleting working files");
    let report = lifecycle::purge_working_dirs(&state.roots).await;
    state.lifecycle.advance(Phase::Stopped);

    if drained && report.is_clean() {
        info!(removed = report.removed, "imgpack-server stopped");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            removed = report.removed,
            failed = report.failed,
            drained,
            "imgpack-server stopped with leftovers"
        );
        Ok(ExitCode::FAILURE)
    }
}
