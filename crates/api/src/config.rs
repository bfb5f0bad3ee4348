use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use certgen_jobs::JobTtl;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`). Synchronous
    /// generation of large batches needs a generous value.
    pub request_timeout_secs: u64,
    /// Maximum accepted request body in bytes (default: 50 MiB).
    pub max_upload_bytes: usize,
    /// Where uploaded templates and data files are stored.
    pub upload_dir: PathBuf,
    /// Parent of the per-job output directories.
    pub output_dir: PathBuf,
    /// Directories searched for `.ttf` files, in priority order.
    pub font_dirs: Vec<PathBuf>,
    /// File name of the font used when none is selected.
    pub default_font: String,
    /// Seconds a finished job is kept for download (`JOB_TTL_SECONDS`).
    pub job_ttl_secs: i64,
    /// Seconds before a silent running job counts as abandoned (`JOB_STALE_SECONDS`).
    pub job_stale_secs: i64,
    /// Seconds between janitor sweeps.
    pub janitor_interval_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                    |
    /// |-------------------------|----------------------------|
    /// | `HOST`                  | `0.0.0.0`                  |
    /// | `PORT`                  | `5000`                     |
    /// | `CORS_ORIGINS`          | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS`  | `300`                      |
    /// | `MAX_UPLOAD_BYTES`      | `52428800`                 |
    /// | `UPLOAD_DIR`            | `app/uploads`              |
    /// | `OUTPUT_DIR`            | `app/outputs`              |
    /// | `FONT_DIRS`             | `app/fonts,fonts`          |
    /// | `DEFAULT_FONT`          | `Product Sans Regular.ttf` |
    /// | `JOB_TTL_SECONDS`       | `600`                      |
    /// | `JOB_STALE_SECONDS`     | `3600`                     |
    /// | `JANITOR_INTERVAL_SECS` | `60`                       |
    ///
    /// Panics on unparsable values so misconfiguration fails at startup.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        Self {
            host,
            port: env_parse("PORT", 5000),
            cors_origins: env_list("CORS_ORIGINS", "http://localhost:5173"),
            request_timeout_secs: env_parse("REQUEST_TIMEOUT_SECS", 300),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES", 50 * 1024 * 1024),
            upload_dir: std::env::var("UPLOAD_DIR")
                .unwrap_or_else(|_| "app/uploads".into())
                .into(),
            output_dir: std::env::var("OUTPUT_DIR")
                .unwrap_or_else(|_| "app/outputs".into())
                .into(),
            font_dirs: env_list("FONT_DIRS", "app/fonts,fonts")
                .into_iter()
                .map(PathBuf::from)
                .collect(),
            default_font: std::env::var("DEFAULT_FONT")
                .unwrap_or_else(|_| "Product Sans Regular.ttf".into()),
            job_ttl_secs: env_parse("JOB_TTL_SECONDS", 600),
            job_stale_secs: env_parse("JOB_STALE_SECONDS", 3600),
            janitor_interval_secs: env_parse("JANITOR_INTERVAL_SECS", 60),
        }
    }

    pub fn job_ttl(&self) -> JobTtl {
        JobTtl::from_secs(self.job_ttl_secs, self.job_stale_secs)
    }

    pub fn janitor_interval(&self) -> Duration {
        Duration::from_secs(self.janitor_interval_secs.max(1))
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be valid: {e}")),
        Err(_) => default,
    }
}

fn env_list(key: &str, default: &str) -> Vec<String> {
    std::env::var(key)
        .unwrap_or_else(|_| default.into())
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
