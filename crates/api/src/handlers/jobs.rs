//! Progress polling and one-shot archive download for background jobs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use certgen_core::archive::archive_directory;
use certgen_core::error::CoreError;
use certgen_jobs::JobSnapshot;

use crate::error::{AppError, AppResult};
use crate::handlers::blocking;
use crate::handlers::generation::archive_headers;
use crate::state::AppState;

/// GET /progress/{job_id}
pub async fn progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Json<JobSnapshot>> {
    let snapshot = state.jobs.read(&job_id).await?;
    Ok(Json(snapshot))
}

/// GET /download/{job_id}
///
/// Hands out the archive exactly once. The job is removed from the registry
/// before its files are touched; its output directory and uploads are
/// deleted whether or not an archive could be built.
pub async fn download(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> AppResult<Response> {
    let resources = match state.jobs.consume(&job_id).await {
        Ok(resources) => resources,
        Err(CoreError::NotFound { .. }) => {
            return Ok((StatusCode::NOT_FOUND, "Job not found").into_response());
        }
        Err(CoreError::Conflict(_)) => {
            return Ok((StatusCode::CONFLICT, "Job still running").into_response());
        }
        Err(e) => return Err(AppError::Core(e)),
    };

    let archive = blocking(move || {
        let archive = if resources.output_dir.is_dir() {
            archive_directory(&resources.output_dir).map(Some)
        } else {
            Ok(None)
        };
        resources.release();
        archive
    })
    .await?;

    match archive {
        Some(bytes) => {
            tracing::info!(job_id = %job_id, bytes = bytes.len(), "Job archive downloaded");
            Ok((StatusCode::OK, archive_headers(), bytes).into_response())
        }
        None => {
            tracing::warn!(job_id = %job_id, "Job finished without an output directory");
            Ok((StatusCode::NOT_FOUND, "No output available").into_response())
        }
    }
}
