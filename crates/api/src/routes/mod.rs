pub mod health;

use axum::routing::{get, post};
use axum::Router;

use crate::handlers;
use crate::state::AppState;

/// Build the certificate route tree.
///
/// Route hierarchy:
///
/// ```text
/// /upload                       store template + data file (POST)
/// /fonts                        available fonts (GET)
///
/// /preview                      render one sample certificate (POST)
/// /generate                     render all rows, return archive (POST)
///
/// /start_generate               queue a background job (POST)
/// /progress/{job_id}            job status (GET)
/// /download/{job_id}            one-shot archive download (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/upload", post(handlers::upload::upload))
        .route("/fonts", get(handlers::fonts::list_fonts))
        .route("/preview", post(handlers::preview::preview))
        .route("/generate", post(handlers::generation::generate))
        .route("/start_generate", post(handlers::generation::start_generate))
        .route("/progress/{job_id}", get(handlers::jobs::progress))
        .route("/download/{job_id}", get(handlers::jobs::download))
}
