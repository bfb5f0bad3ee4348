//! Zip archive construction for generated certificates.
//!
//! Two entry points share one output format (DEFLATE-compressed zip):
//! [`ArchiveBuilder`] for images produced in memory, and
//! [`archive_directory`] for a job directory filled by a background task.

use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;

use image::{ImageFormat, RgbaImage};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::cleanup;
use crate::error::CoreResult;

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default().compression_method(CompressionMethod::Deflated)
}

/// Encode an image as PNG bytes.
pub fn encode_png(image: &RgbaImage) -> CoreResult<Vec<u8>> {
    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Streams named files into an in-memory zip archive.
pub struct ArchiveBuilder {
    writer: ZipWriter<Cursor<Vec<u8>>>,
    entries: usize,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self {
            writer: ZipWriter::new(Cursor::new(Vec::new())),
            entries: 0,
        }
    }

    /// Append one entry. Names must be unique within the archive.
    pub fn add(&mut self, name: &str, bytes: &[u8]) -> CoreResult<()> {
        self.writer.start_file(name, entry_options())?;
        self.writer.write_all(bytes)?;
        self.entries += 1;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }

    /// Finish the central directory and return the archive bytes.
    pub fn finish(self) -> CoreResult<Vec<u8>> {
        Ok(self.writer.finish()?.into_inner())
    }
}

/// Archive every file under `dir` as a top-level entry named by its base
/// name, then remove `dir`.
///
/// The directory is only removed once the archive is complete; on error it
/// is left in place.
pub fn archive_directory(dir: &Path) -> CoreResult<Vec<u8>> {
    let mut builder = ArchiveBuilder::new();
    let mut seen = HashSet::new();

    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| std::io::Error::other(e.to_string()))?
        .into_iter()
        .filter(|e| e.file_type().is_file())
        .collect();
    files.sort_by(|a, b| a.path().cmp(b.path()));

    for entry in files {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !seen.insert(name.clone()) {
            tracing::warn!(file = %entry.path().display(), "Skipping duplicate archive entry");
            continue;
        }
        let bytes = std::fs::read(entry.path())?;
        builder.add(&name, &bytes)?;
    }

    let entries = builder.len();
    let archive = builder.finish()?;

    let _ = cleanup::remove_dir(dir);
    tracing::debug!(dir = %dir.display(), entries, "Archived output directory");

    Ok(archive)
}
