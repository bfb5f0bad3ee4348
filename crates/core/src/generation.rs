//! Batch generation shared by the synchronous and background paths.

use std::path::Path;

use image::RgbaImage;

use crate::archive::{encode_png, ArchiveBuilder};
use crate::error::{CoreError, CoreResult};
use crate::fonts::FontResolver;
use crate::naming::OutputNamer;
use crate::placement::PlacementPlan;
use crate::render::render_row;
use crate::table::DataTable;

/// Everything about a batch that is not the template or the data.
#[derive(Debug, Clone, Default)]
pub struct GenerationSettings {
    pub plan: PlacementPlan,
    /// Column whose value names each output file.
    pub file_column: Option<String>,
    /// Font file name chosen by the user.
    pub font_selector: Option<String>,
}

/// Open a template image as RGBA.
pub fn load_template(path: &Path) -> CoreResult<RgbaImage> {
    if !path.is_file() {
        return Err(CoreError::NotFound {
            entity: "Upload",
            id: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        });
    }
    Ok(image::open(path)?.to_rgba8())
}

/// Render row `index` and pick its output name.
pub fn render_named_row(
    template: &RgbaImage,
    table: &DataTable,
    index: usize,
    settings: &GenerationSettings,
    fonts: &dyn FontResolver,
    namer: &mut OutputNamer,
) -> CoreResult<(String, RgbaImage)> {
    let row = table
        .row(index)
        .ok_or_else(|| CoreError::Internal(format!("row {index} out of range")))?;

    let image = render_row(
        template,
        &settings.plan,
        fonts,
        settings.font_selector.as_deref(),
        &row,
    )?;

    let name_value = settings
        .file_column
        .as_deref()
        .filter(|c| table.has_column(c))
        .and_then(|c| row.get(c));

    Ok((namer.name_for(index, name_value), image))
}

/// Render every row into an in-memory archive. The first failing row
/// aborts the whole batch.
pub fn generate_archive(
    template: &RgbaImage,
    table: &DataTable,
    settings: &GenerationSettings,
    fonts: &dyn FontResolver,
) -> CoreResult<Vec<u8>> {
    let mut archive = ArchiveBuilder::new();
    let mut namer = OutputNamer::new();

    for index in 0..table.len() {
        let (name, image) = render_named_row(template, table, index, settings, fonts, &mut namer)?;
        archive.add(&name, &encode_png(&image)?)?;
    }

    tracing::debug!(entries = archive.len(), "Generated certificate archive");
    archive.finish()
}

/// Row shown by the preview: the second row when headers are present and
/// there is more than one row, otherwise the first.
pub fn preview_row_index(table: &DataTable, headers_present: bool) -> Option<usize> {
    match table.len() {
        0 => None,
        n if headers_present && n > 1 => Some(1),
        _ => Some(0),
    }
}
