//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use imgpack_core::WorkspaceRoots;

use crate::config::Config;
use crate::lifecycle::Lifecycle;

/// State shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Upload / download roots that hold every workspace.
    pub roots: WorkspaceRoots,
    /// Current server phase; handlers refuse work once shutdown begins.
    pub lifecycle: Lifecycle,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let roots = WorkspaceRoots::new(config.uploads_dir(), config.downloads_dir());
        Self {
            config: Arc::new(config),
            roots,
            lifecycle: Lifecycle::new(),
        }
    }
}
