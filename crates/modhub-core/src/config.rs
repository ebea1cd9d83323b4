//! Runtime configuration, loaded from environment variables at startup.

use std::path::PathBuf;

/// Runtime configuration for modhub.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set. The same value is handed to the
/// store, the ingestor and the HTTP layer; nothing reads the environment
/// after startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://modules.db"`).
    /// The database file is created if it does not exist yet.
    pub database_url: String,

    /// Directory receiving the raw uploaded archives.
    pub upload_dir: PathBuf,

    /// Root of the per-module extraction tree.
    pub modules_dir: PathBuf,

    /// Directory served under `/static`.
    pub static_dir: PathBuf,

    /// Upper bound on a single uploaded archive, in bytes.
    pub max_upload_bytes: usize,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Optional directory for a daily-rolling log file.
    pub log_dir: Option<PathBuf>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_owned(),
            database_url: "sqlite://modules.db".to_owned(),
            upload_dir: PathBuf::from("uploads"),
            modules_dir: PathBuf::from("modules"),
            static_dir: PathBuf::from("static"),
            max_upload_bytes: 100 * 1024 * 1024,
            log_level: "info".to_owned(),
            log_json: false,
            log_dir: None,
            enable_swagger: true,
        }
    }
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_upload_mb: usize = parse_env("MODHUB_MAX_UPLOAD_SIZE_MB", 100);
        Self {
            bind_address: env_or("MODHUB_BIND", &defaults.bind_address),
            database_url: env_or("MODHUB_DATABASE_URL", &defaults.database_url),
            upload_dir: env_path("MODHUB_UPLOAD_DIR", defaults.upload_dir),
            modules_dir: env_path("MODHUB_MODULES_DIR", defaults.modules_dir),
            static_dir: env_path("MODHUB_STATIC_DIR", defaults.static_dir),
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            log_level: env_or("MODHUB_LOG", &defaults.log_level),
            log_json: env_flag("MODHUB_LOG_JSON", false),
            log_dir: std::env::var("MODHUB_LOG_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            enable_swagger: env_flag("MODHUB_ENABLE_SWAGGER", true),
        }
    }

    /// Configuration rooted in `root`, used by tests and local tooling.
    pub fn with_root(root: &std::path::Path) -> Self {
        Self {
            database_url: format!("sqlite://{}", root.join("modules.db").display()),
            upload_dir: root.join("uploads"),
            modules_dir: root.join("modules"),
            static_dir: root.join("static"),
            ..Self::default()
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_path(key: &str, default: PathBuf) -> PathBuf {
    std::env::var(key).map(PathBuf::from).unwrap_or(default)
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_local_directories() {
        let cfg = Config::default();
        assert_eq!(cfg.upload_dir, PathBuf::from("uploads"));
        assert_eq!(cfg.modules_dir, PathBuf::from("modules"));
        assert_eq!(cfg.max_upload_bytes, 100 * 1024 * 1024);
        assert!(cfg.enable_swagger);
    }

    #[test]
    fn with_root_keeps_everything_under_root() {
        let root = std::path::Path::new("/tmp/modhub-root");
        let cfg = Config::with_root(root);
        assert!(cfg.upload_dir.starts_with(root));
        assert!(cfg.modules_dir.starts_with(root));
        assert_eq!(cfg.database_url, "sqlite:///tmp/modhub-root/modules.db");
    }
}
