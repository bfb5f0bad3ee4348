//! Batch generation: synchronous archive download and background jobs.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use certgen_core::cleanup;
use certgen_core::fonts::FontResolver;
use certgen_core::generation::{generate_archive, load_template, GenerationSettings};
use certgen_core::table::load_table;
use certgen_core::types::JobId;
use certgen_jobs::runner::{self, JobRequest};
use serde::Serialize;

use crate::error::AppResult;
use crate::form::GenerationForm;
use crate::handlers::blocking;
use crate::state::AppState;

/// Response for `POST /start_generate`.
#[derive(Debug, Serialize)]
pub struct StartGenerateResponse {
    pub job_id: JobId,
    /// Row count of the data file, or 0 if it could not be read.
    pub total: u64,
}

/// Headers for an archive attachment named `certificates.zip`.
pub fn archive_headers() -> [(axum::http::HeaderName, &'static str); 2] {
    [
        (CONTENT_TYPE, "application/zip"),
        (
            CONTENT_DISPOSITION,
            "attachment; filename=\"certificates.zip\"",
        ),
    ]
}

/// POST /generate
///
/// Render every row and return the archive in the response. The first row
/// that fails aborts the request. Uploads are deleted after success.
pub async fn generate(
    State(state): State<AppState>,
    form: GenerationForm,
) -> AppResult<impl IntoResponse> {
    let template_path = form.image_path(&state)?;
    let data_path = form.data_path(&state)?;
    let headers_present = form.headers_present();
    let settings = GenerationSettings {
        plan: form.plan(),
        file_column: form.file_column(),
        font_selector: form.resolve_font(&state.fonts)?,
    };
    let fonts = Arc::clone(&state.fonts);

    tracing::info!(
        template = %template_path.display(),
        data = %data_path.display(),
        columns = settings.plan.len(),
        "Synchronous generation started"
    );

    let archive = blocking(move || {
        let template = load_template(&template_path)?;
        let table = load_table(&data_path, headers_present)?;
        let archive = generate_archive(&template, &table, &settings, fonts.as_ref())?;

        let _ = cleanup::remove_file(&template_path);
        let _ = cleanup::remove_file(&data_path);
        Ok::<_, certgen_core::error::CoreError>(archive)
    })
    .await?;

    tracing::info!(bytes = archive.len(), "Synchronous generation finished");

    Ok((StatusCode::OK, archive_headers(), archive))
}

/// POST /start_generate
///
/// Register a job, start it in the background and return its id at once.
/// Progress is polled via `GET /progress/{job_id}`.
pub async fn start_generate(
    State(state): State<AppState>,
    form: GenerationForm,
) -> AppResult<Json<StartGenerateResponse>> {
    let template_path = form.image_path(&state)?;
    let data_path = form.data_path(&state)?;
    let headers_present = form.headers_present();
    let font_selector = form.resolve_font(&state.fonts)?;

    // The job itself reports an unreadable data file; here it only means
    // no row count is known yet.
    let total = {
        let data_path = data_path.clone();
        blocking(move || load_table(&data_path, headers_present))
            .await
            .map(|table| table.len() as u64)
            .unwrap_or(0)
    };

    let uploads = vec![template_path.clone(), data_path.clone()];
    let job_id = state.jobs.create(total, uploads, font_selector).await;

    let request = JobRequest {
        template_path,
        data_path,
        headers_present,
        plan: form.plan(),
        file_column: form.file_column(),
    };
    let fonts: Arc<dyn FontResolver> = state.fonts.clone();
    runner::spawn(Arc::clone(&state.jobs), fonts, job_id.clone(), request);

    tracing::info!(job_id = %job_id, total, "Generation job queued");

    Ok(Json(StartGenerateResponse { job_id, total }))
}
