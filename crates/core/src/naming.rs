//! Output and upload file naming.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use crate::table::Cell;

/// Runs of characters that are not allowed in an archive entry name.
static FORBIDDEN_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/*?:"<>|]+"#).expect("valid regex"));

/// Normalize a spreadsheet value into a file stem.
///
/// - trims surrounding whitespace
/// - whole numbers lose their fraction (`"5.0"` -> `"5"`)
/// - `/` becomes `_`, then each run of `\/*?:"<>|` becomes a single `_`
///
/// Returns `None` when nothing usable remains.
pub fn normalize_filename_value(value: &Cell) -> Option<String> {
    if value.is_empty() {
        return None;
    }

    let raw = value.to_string();
    let mut s = raw.trim().to_string();

    if let Ok(num) = s.parse::<f64>() {
        if num.is_finite() && num.fract() == 0.0 {
            // `+ 0.0` folds `-0` into `0`.
            s = format!("{:.0}", num + 0.0);
        }
    }

    let s = s.replace(std::path::MAIN_SEPARATOR, "_");
    let s = FORBIDDEN_RUN.replace_all(&s, "_").into_owned();

    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

/// Fallback name for a row without a usable filename value.
pub fn fallback_name(row_index: usize) -> String {
    format!("generated_{row_index}.png")
}

/// Hands out one unique `.png` name per row of a batch.
///
/// The first row to claim a stem gets `{stem}.png`; later collisions get
/// `{stem}_{row_index}.png`, with a further `_{n}` counter if that name was
/// itself already handed out.
#[derive(Debug, Default)]
pub struct OutputNamer {
    used: HashSet<String>,
}

impl OutputNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name for `row_index`, given the row's filename column value (if any).
    pub fn name_for(&mut self, row_index: usize, value: Option<&Cell>) -> String {
        let stem = value.and_then(normalize_filename_value);

        let candidate = match &stem {
            Some(stem) => format!("{stem}.png"),
            None => fallback_name(row_index),
        };

        let name = if self.used.contains(&candidate) {
            let base = match &stem {
                Some(stem) => format!("{stem}_{row_index}"),
                None => format!("generated_{row_index}"),
            };
            let mut name = format!("{base}.png");
            let mut n = 1;
            while self.used.contains(&name) {
                name = format!("{base}_{n}.png");
                n += 1;
            }
            name
        } else {
            candidate
        };

        self.used.insert(name.clone());
        name
    }
}

/// Reduce an uploaded file name to a safe, flat ASCII name.
///
/// Path components are dropped, whitespace becomes `_`, and anything outside
/// `[A-Za-z0-9_.-]` is removed. Leading / trailing dots and underscores are
/// stripped so the result can never be `..` or a hidden file.
pub fn secure_filename(name: &str) -> String {
    let flat: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = flat.split_whitespace().collect::<Vec<_>>().join("_");

    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();

    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}

/// `true` if `name` is already a plain, safe file name.
pub fn is_plain_filename(name: &str) -> bool {
    !name.is_empty() && secure_filename(name) == name
}
