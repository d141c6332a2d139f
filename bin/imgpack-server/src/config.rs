//! Server configuration, loaded from environment variables at startup.

use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration for imgpack-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"127.0.0.1:0"`, port chosen by the OS).
    pub bind_address: String,

    /// Parent of the `uploads/` and `downloads/` working roots.
    /// Defaults to the directory containing the server executable.
    pub data_dir: PathBuf,

    /// Front-end bundle served at `/` (default: `<data_dir>/public`).
    pub static_dir: PathBuf,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Launch the default browser at the server URL once listening.
    pub open_browser: bool,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    /// Comma-separated CORS origins; `None` allows any origin.
    pub cors_allowed_origins: Option<String>,

    /// Maximum request body size in bytes.
    pub max_upload_bytes: usize,

    /// Upper bound for a whole HTTP request.
    pub request_timeout: Duration,

    /// Upper bound for converting one batch.
    pub conversion_timeout: Duration,

    /// How long shutdown waits for in-flight requests before purging.
    pub drain_timeout: Duration,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let data_dir = std::env::var("IMGPACK_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());
        let static_dir = std::env::var("IMGPACK_STATIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("public"));

        Self {
            bind_address: env_or("IMGPACK_BIND", "127.0.0.1:0"),
            static_dir,
            data_dir,
            log_level: env_or("IMGPACK_LOG", "info"),
            log_json: env_flag("IMGPACK_LOG_JSON", false),
            open_browser: env_flag("IMGPACK_OPEN_BROWSER", true),
            enable_swagger: env_flag("IMGPACK_ENABLE_SWAGGER", true),
            cors_allowed_origins: std::env::var("IMGPACK_CORS_ORIGINS").ok(),
            max_upload_bytes: mib_to_bytes(parse_env("IMGPACK_MAX_UPLOAD_MB", 100)),
            request_timeout: Duration::from_secs(parse_env("IMGPACK_REQUEST_TIMEOUT_SECS", 300)),
            conversion_timeout: Duration::from_secs(parse_env("IMGPACK_CONVERSION_TIMEOUT_SECS", 120)),
            drain_timeout: Duration::from_secs(parse_env("IMGPACK_DRAIN_TIMEOUT_SECS", 10)),
        }
    }

    /// Configuration rooted at `data_dir` with defaults for everything else
    /// and no browser launch.
    #[cfg(test)]
    pub fn for_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        Self {
            bind_address: "127.0.0.1:0".into(),
            static_dir: data_dir.join("public"),
            data_dir,
            log_level: "info".into(),
            log_json: false,
            open_browser: false,
            enable_swagger: false,
            cors_allowed_origins: None,
            max_upload_bytes: 100 * 1024 * 1024,
            request_timeout: Duration::from_secs(300),
            conversion_timeout: Duration::from_secs(120),
            drain_timeout: Duration::from_secs(10),
        }
    }

    pub fn uploads_dir(&self) -> PathBuf {
        self.data_dir.join("uploads")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.data_dir.join("downloads")
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn default_data_dir() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Clamps instead of overflowing on absurd limits.
fn mib_to_bytes(mib: usize) -> usize {
    mib.saturating_mul(1024 * 1024)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
