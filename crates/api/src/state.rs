use std::path::PathBuf;
use std::sync::Arc;

use certgen_core::error::CoreError;
use certgen_core::fonts::FontLibrary;
use certgen_core::naming::is_plain_filename;
use certgen_jobs::JobRegistry;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Registry of asynchronous generation jobs.
    pub jobs: Arc<JobRegistry>,
    /// Font discovery and cache.
    pub fonts: Arc<FontLibrary>,
}

impl AppState {
    /// Build state from configuration. Does not touch the filesystem.
    pub fn new(config: ServerConfig) -> Self {
        let jobs = Arc::new(JobRegistry::new(config.output_dir.clone()));
        let fonts = Arc::new(FontLibrary::new(
            config.font_dirs.clone(),
            config.default_font.clone(),
        ));
        Self {
            config: Arc::new(config),
            jobs,
            fonts,
        }
    }

    /// Resolve a previously uploaded file by name.
    ///
    /// Only plain file names are accepted, so a form field can never reach
    /// outside the upload directory.
    pub fn upload_path(&self, name: &str) -> AppResult<PathBuf> {
        if !is_plain_filename(name) {
            return Err(AppError::BadRequest(format!(
                "Invalid upload reference '{name}'"
            )));
        }
        let path = self.config.upload_dir.join(name);
        if !path.is_file() {
            return Err(AppError::Core(CoreError::NotFound {
                entity: "Upload",
                id: name.to_string(),
            }));
        }
        Ok(path)
    }
}
