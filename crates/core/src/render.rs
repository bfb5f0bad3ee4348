//! Row renderer: draws one data row onto a copy of the template.

use image::{Rgba, RgbaImage};
use rusttype::{point, PositionedGlyph, Rect};

use crate::error::CoreResult;
use crate::fonts::{FontResolver, SizedFont};
use crate::placement::{Placement, PlacementPlan};
use crate::table::Row;

/// Text is always opaque black.
const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Render `row` onto a copy of `template`.
///
/// Columns whose value is missing (or that the table does not have) are
/// skipped. The template itself is never modified.
pub fn render_row(
    template: &RgbaImage,
    plan: &PlacementPlan,
    fonts: &dyn FontResolver,
    font_selector: Option<&str>,
    row: &Row<'_>,
) -> CoreResult<RgbaImage> {
    let mut canvas = template.clone();

    for (column, placement) in plan.iter() {
        let Some(value) = row.get(column) else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        let font = fonts.resolve(placement.font_size, font_selector)?;
        draw_centered(&mut canvas, &font, placement, &value.to_string());
    }

    Ok(canvas)
}

/// Render a preview: like [`render_row`], but a missing value (or no row at
/// all) draws the column name as sample text.
pub fn render_preview(
    template: &RgbaImage,
    plan: &PlacementPlan,
    fonts: &dyn FontResolver,
    font_selector: Option<&str>,
    row: Option<&Row<'_>>,
) -> CoreResult<RgbaImage> {
    let mut canvas = template.clone();

    for (column, placement) in plan.iter() {
        let sample = row
            .and_then(|r| r.get(column))
            .filter(|v| !v.is_empty())
            .map(ToString::to_string)
            .unwrap_or_else(|| column.to_string());

        let font = fonts.resolve(placement.font_size, font_selector)?;
        draw_centered(&mut canvas, &font, placement, &sample);
    }

    Ok(canvas)
}

/// Draw `text` so that its rendered pixel box is centered on the placement's
/// anchor point.
fn draw_centered(canvas: &mut RgbaImage, font: &SizedFont, placement: &Placement, text: &str) {
    let Some(bbox) = text_bbox(font, text) else {
        return;
    };

    let text_w = (bbox.max.x - bbox.min.x) as f64;
    let text_h = (bbox.max.y - bbox.min.y) as f64;
    let anchor_x = placement.x * canvas.width() as f64;
    let anchor_y = placement.y * canvas.height() as f64;

    // Offsets are measured from the layout origin, so the box's own origin
    // offset is subtracted before truncating to whole pixels.
    let origin_x = (anchor_x - (text_w / 2.0 + bbox.min.x as f64)) as i32;
    let origin_y = (anchor_y - (text_h / 2.0 + bbox.min.y as f64)) as i32;

    for glyph in layout(font, text, origin_x, origin_y) {
        blend_glyph(canvas, &glyph);
    }
}

fn layout<'f>(font: &'f SizedFont, text: &str, x: i32, y: i32) -> Vec<PositionedGlyph<'f>> {
    font.font
        .layout(text, font.scale, point(x as f32, y as f32))
        .collect()
}

/// Union of the glyph pixel boxes for `text` laid out with its baseline at
/// the origin. `None` if nothing would be drawn (empty or whitespace).
fn text_bbox(font: &SizedFont, text: &str) -> Option<Rect<i32>> {
    layout(font, text, 0, 0)
        .iter()
        .filter_map(PositionedGlyph::pixel_bounding_box)
        .reduce(|a, b| Rect {
            min: point(a.min.x.min(b.min.x), a.min.y.min(b.min.y)),
            max: point(a.max.x.max(b.max.x), a.max.y.max(b.max.y)),
        })
}

fn blend_glyph(canvas: &mut RgbaImage, glyph: &PositionedGlyph<'_>) {
    let Some(bb) = glyph.pixel_bounding_box() else {
        return;
    };
    let (width, height) = (canvas.width() as i32, canvas.height() as i32);

    glyph.draw(|gx, gy, coverage| {
        let px = gx as i32 + bb.min.x;
        let py = gy as i32 + bb.min.y;
        if px < 0 || py < 0 || px >= width || py >= height || coverage <= 0.0 {
            return;
        }
        let dst = canvas.get_pixel_mut(px as u32, py as u32);
        *dst = source_over(*dst, TEXT_COLOR, coverage.min(1.0));
    });
}

/// Porter-Duff "source over" for a color with the given coverage.
fn source_over(dst: Rgba<u8>, color: Rgba<u8>, coverage: f32) -> Rgba<u8> {
    let sa = coverage * (color.0[3] as f32 / 255.0);
    let da = dst.0[3] as f32 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        return Rgba([0, 0, 0, 0]);
    }

    let mut out = [0u8; 4];
    for i in 0..3 {
        let c = (color.0[i] as f32 * sa + dst.0[i] as f32 * da * (1.0 - sa)) / out_a;
        out[i] = c.round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    Rgba(out)
}
