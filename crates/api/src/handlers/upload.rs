//! Upload of a template image and a data file.

use std::path::PathBuf;

use axum::extract::{Multipart, State};
use axum::Json;
use certgen_core::cleanup;
use certgen_core::naming::secure_filename;
use certgen_core::table::load_table;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::form::is_truthy;
use crate::handlers::blocking;
use crate::state::AppState;

/// Everything the options form needs to configure a batch.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Stored name of the template image, to be posted back as `image`.
    pub image: String,
    /// Stored name of the data file, to be posted back as `data_file`.
    pub data_file: String,
    pub headers_present: bool,
    /// Column names of the data file.
    pub columns: Vec<String>,
    /// Fonts available for `font_choice`.
    pub fonts: Vec<String>,
}

struct UploadedFile {
    filename: String,
    bytes: Vec<u8>,
}

/// POST /upload
///
/// Accepts multipart fields `image` (file), `data_file` (file, also accepted
/// as `file`) and `headers_present`. Files are stored under a random prefix so
/// concurrent uploads of the same name never collide.
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> AppResult<Json<UploadResponse>> {
    let mut image: Option<UploadedFile> = None;
    let mut data: Option<UploadedFile> = None;
    let mut headers_present = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "image" | "data_file" | "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let file = UploadedFile {
                    filename,
                    bytes: bytes.to_vec(),
                };
                if name == "image" {
                    image = Some(file);
                } else {
                    data = Some(file);
                }
            }
            "headers_present" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                headers_present = is_truthy(&text);
            }
            _ => {} // ignore unknown fields
        }
    }

    let (Some(image), Some(data)) = (image, data) else {
        return Err(AppError::BadRequest(
            "Please upload both a data file and an image".into(),
        ));
    };
    if image.bytes.is_empty() || data.bytes.is_empty() {
        return Err(AppError::BadRequest("Uploaded files must not be empty".into()));
    }

    tokio::fs::create_dir_all(&state.config.upload_dir)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to create upload directory: {e}")))?;

    let image_name = store(&state, &image).await?;
    let data_name = match store(&state, &data).await {
        Ok(name) => name,
        Err(e) => {
            discard(vec![state.config.upload_dir.join(&image_name)]).await;
            return Err(e);
        }
    };

    let stored = vec![
        state.config.upload_dir.join(&image_name),
        state.config.upload_dir.join(&data_name),
    ];
    let data_path = stored[1].clone();
    let columns = match blocking(move || load_table(&data_path, headers_present)).await {
        Ok(table) => table.columns().to_vec(),
        Err(e) => {
            discard(stored).await;
            return Err(e);
        }
    };

    tracing::info!(
        image = %image_name,
        data_file = %data_name,
        columns = columns.len(),
        "Stored uploads"
    );

    Ok(Json(UploadResponse {
        image: image_name,
        data_file: data_name,
        headers_present,
        columns,
        fonts: state.fonts.list_available(),
    }))
}

/// Write an uploaded file as `{prefix}_{sanitized name}` and return that name.
async fn store(state: &AppState, file: &UploadedFile) -> AppResult<String> {
    let safe = secure_filename(&file.filename);
    let safe = if safe.is_empty() { "upload".to_string() } else { safe };
    let prefix = uuid::Uuid::new_v4().simple().to_string();
    let stored = format!("{}_{safe}", &prefix[..8]);

    let path = state.config.upload_dir.join(&stored);
    tokio::fs::write(&path, &file.bytes)
        .await
        .map_err(|e| AppError::InternalError(format!("Failed to store upload: {e}")))?;
    Ok(stored)
}

async fn discard(paths: Vec<PathBuf>) {
    for path in paths {
        let _ = tokio::task::spawn_blocking(move || cleanup::remove_file(&path)).await;
    }
}
