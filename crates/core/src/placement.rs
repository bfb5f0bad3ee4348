//! Text placement resolver.
//!
//! Converts the per-column form fields `pos_{col}_x`, `pos_{col}_y` and
//! `size_{col}` into a [`PlacementPlan`]. Malformed numbers never fail the
//! request; each bad field silently falls back to its default.

use std::collections::{BTreeMap, HashMap};

/// Default normalized x / y anchor.
pub const DEFAULT_POSITION: f64 = 0.5;

/// Default font size in pixels.
pub const DEFAULT_FONT_SIZE: u32 = 40;

const POS_PREFIX: &str = "pos_";
const X_SUFFIX: &str = "_x";

/// Where and how large to draw one column's value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Horizontal anchor, normalized to `[0, 1]`.
    pub x: f64,
    /// Vertical anchor, normalized to `[0, 1]`.
    pub y: f64,
    /// Font size in pixels, at least 1.
    pub font_size: u32,
}

/// Column name -> placement. Columns absent from the plan are not rendered.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlacementPlan {
    columns: BTreeMap<String, Placement>,
}

impl PlacementPlan {
    /// Build a plan from raw form fields.
    ///
    /// Every field named `pos_{col}_x` introduces column `col`; the matching
    /// `pos_{col}_y` and `size_{col}` fields are optional.
    pub fn from_fields(fields: &HashMap<String, String>) -> Self {
        let mut columns = BTreeMap::new();

        for key in fields.keys() {
            let Some(column) = column_from_x_key(key) else {
                continue;
            };

            let x = parse_coordinate(fields.get(key));
            let y = parse_coordinate(fields.get(&format!("{POS_PREFIX}{column}_y")));
            let font_size = parse_font_size(fields.get(&format!("size_{column}")));

            columns.insert(column.to_string(), Placement { x, y, font_size });
        }

        Self { columns }
    }

    pub fn insert(&mut self, column: impl Into<String>, placement: Placement) {
        self.columns.insert(column.into(), placement);
    }

    pub fn get(&self, column: &str) -> Option<&Placement> {
        self.columns.get(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Placement)> {
        self.columns.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Extract `col` from `pos_{col}_x`. The column name may itself contain
/// underscores; only the fixed prefix and suffix are stripped.
fn column_from_x_key(key: &str) -> Option<&str> {
    if key.len() < POS_PREFIX.len() + X_SUFFIX.len() {
        return None;
    }
    key.strip_prefix(POS_PREFIX)?.strip_suffix(X_SUFFIX)
}

fn parse_finite(raw: Option<&String>) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

fn parse_coordinate(raw: Option<&String>) -> f64 {
    parse_finite(raw)
        .unwrap_or(DEFAULT_POSITION)
        .clamp(0.0, 1.0)
}

/// Sizes are accepted as floats and truncated toward zero (`"12.9"` -> 12).
fn parse_font_size(raw: Option<&String>) -> u32 {
    match parse_finite(raw) {
        // `as` saturates, so huge values land on u32::MAX.
        Some(v) => v.trunc().max(1.0) as u32,
        None => DEFAULT_FONT_SIZE,
    }
}
