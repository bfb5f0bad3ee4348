//! Font discovery and caching.
//!
//! [`FontResolver`] is the seam the renderer depends on; [`FontLibrary`] is
//! the disk-backed implementation used by the server.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use rusttype::{Font, Scale};

use crate::error::{CoreError, CoreResult};
use crate::naming::secure_filename;

/// System fonts tried when neither the selected nor the default font loads.
const SYSTEM_FALLBACKS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// A parsed font paired with the pixel size to draw it at.
#[derive(Clone)]
pub struct SizedFont {
    pub font: Arc<Font<'static>>,
    pub scale: Scale,
}

/// Maps a requested size and optional font selector to a drawable font.
pub trait FontResolver: Send + Sync {
    fn resolve(&self, size: u32, selector: Option<&str>) -> CoreResult<SizedFont>;
}

/// Fonts loaded from a list of directories, with a process-wide cache.
pub struct FontLibrary {
    dirs: Vec<PathBuf>,
    default_font: String,
    cache: Mutex<HashMap<PathBuf, Arc<Font<'static>>>>,
}

impl FontLibrary {
    pub fn new(dirs: Vec<PathBuf>, default_font: impl Into<String>) -> Self {
        Self {
            dirs,
            default_font: default_font.into(),
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Every `.ttf` file across the font directories, de-duplicated and
    /// sorted, with the default font first when present.
    pub fn list_available(&self) -> Vec<String> {
        let mut found = BTreeSet::new();

        for dir in &self.dirs {
            let Ok(entries) = std::fs::read_dir(dir) else {
                continue;
            };
            for entry in entries.flatten() {
                let name = entry.file_name().to_string_lossy().into_owned();
                if name.to_lowercase().ends_with(".ttf") {
                    found.insert(name);
                }
            }
        }

        let mut fonts: Vec<String> = found.into_iter().collect();
        if let Some(pos) = fonts.iter().position(|f| *f == self.default_font) {
            let default = fonts.remove(pos);
            fonts.insert(0, default);
        }
        fonts
    }

    /// Store an uploaded `.ttf` in the first writable font directory.
    ///
    /// Returns the stored (sanitized) file name, usable as a selector.
    pub fn install(&self, filename: &str, bytes: &[u8]) -> CoreResult<String> {
        let name = secure_filename(filename);
        if name.is_empty() || !name.to_lowercase().ends_with(".ttf") {
            return Err(CoreError::Validation(format!(
                "Font upload '{filename}' is not a .ttf file"
            )));
        }
        if Font::try_from_bytes(bytes).is_none() {
            return Err(CoreError::Validation(format!(
                "Font upload '{filename}' could not be parsed"
            )));
        }

        let mut last_err = None;
        for dir in &self.dirs {
            let target = dir.join(&name);
            let written = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&target, bytes));
            match written {
                Ok(()) => {
                    self.evict(&target);
                    tracing::info!(font = %name, dir = %dir.display(), "Installed uploaded font");
                    return Ok(name);
                }
                Err(e) => {
                    tracing::debug!(dir = %dir.display(), error = %e, "Font directory not writable");
                    last_err = Some(e);
                }
            }
        }

        Err(match last_err {
            Some(e) => CoreError::Io(e),
            None => CoreError::Font("No font directories configured".into()),
        })
    }

    /// Candidate paths in resolution order.
    fn candidates(&self, selector: Option<&str>) -> Vec<PathBuf> {
        let mut out = Vec::new();

        if let Some(sel) = selector.filter(|s| !s.is_empty()) {
            let as_path = Path::new(sel);
            if as_path.is_absolute() {
                out.push(as_path.to_path_buf());
            } else {
                let flat = secure_filename(sel);
                if !flat.is_empty() {
                    out.extend(self.dirs.iter().map(|d| d.join(&flat)));
                }
            }
        }

        out.extend(self.dirs.iter().map(|d| d.join(&self.default_font)));
        out.extend(SYSTEM_FALLBACKS.iter().map(PathBuf::from));
        out
    }

    fn load(&self, path: &Path) -> Option<Arc<Font<'static>>> {
        if let Some(font) = self.lock_cache().get(path) {
            return Some(Arc::clone(font));
        }

        let bytes = std::fs::read(path).ok()?;
        let font = match Font::try_from_vec(bytes) {
            Some(font) => Arc::new(font),
            None => {
                tracing::warn!(path = %path.display(), "Skipping unparsable font file");
                return None;
            }
        };

        self.lock_cache()
            .insert(path.to_path_buf(), Arc::clone(&font));
        Some(font)
    }

    fn evict(&self, path: &Path) {
        self.lock_cache().remove(path);
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<Font<'static>>>> {
        // A poisoned cache only means another thread panicked mid-insert;
        // the map itself is still usable.
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl FontResolver for FontLibrary {
    fn resolve(&self, size: u32, selector: Option<&str>) -> CoreResult<SizedFont> {
        for path in self.candidates(selector) {
            if !path.is_file() {
                continue;
            }
            if let Some(font) = self.load(&path) {
                return Ok(SizedFont {
                    font,
                    scale: Scale::uniform(size as f32),
                });
            }
        }

        Err(CoreError::Font(format!(
            "No usable font found (selector: {}, default: {})",
            selector.unwrap_or("none"),
            self.default_font
        )))
    }
}
