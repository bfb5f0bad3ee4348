use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FontListResponse {
    pub fonts: Vec<String>,
}

/// GET /fonts
///
/// Every `.ttf` file in the configured font directories, default first.
pub async fn list_fonts(State(state): State<AppState>) -> Json<FontListResponse> {
    let fonts = state.fonts.list_available();
    Json(FontListResponse { fonts })
}
