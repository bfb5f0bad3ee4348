use std::sync::Arc;

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use certgen_core::archive::encode_png;
use certgen_core::generation::{load_template, preview_row_index};
use certgen_core::render::render_preview;
use certgen_core::table::load_table;

use crate::error::AppResult;
use crate::form::GenerationForm;
use crate::handlers::blocking;
use crate::state::AppState;

/// POST /preview
///
/// Render one sample certificate as PNG. Uses the second data row when
/// headers are present and there is more than one row, else the first; a
/// column with no value (or no data file at all) shows its own name.
pub async fn preview(
    State(state): State<AppState>,
    form: GenerationForm,
) -> AppResult<impl IntoResponse> {
    let template_path = form.image_path(&state)?;
    let data_path = form.optional_data_path(&state)?;
    let headers_present = form.headers_present();
    let plan = form.plan();
    let font_selector = form.resolve_font(&state.fonts)?;
    let fonts = Arc::clone(&state.fonts);

    let png = blocking(move || {
        let template = load_template(&template_path)?;
        let table = data_path
            .map(|path| load_table(&path, headers_present))
            .transpose()?;
        let row = table.as_ref().and_then(|t| {
            preview_row_index(t, headers_present).and_then(|idx| t.row(idx))
        });

        let image = render_preview(
            &template,
            &plan,
            fonts.as_ref(),
            font_selector.as_deref(),
            row.as_ref(),
        )?;
        encode_png(&image)
    })
    .await?;

    Ok((StatusCode::OK, [(CONTENT_TYPE, "image/png")], png))
}
