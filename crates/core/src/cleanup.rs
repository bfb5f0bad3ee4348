//! Advisory filesystem cleanup.
//!
//! Deleting uploads and output directories is best-effort: failures are
//! logged and reported as a [`Cleanup`] value that callers are free to
//! discard. Nothing here ever returns an error.

use std::io::ErrorKind;
use std::path::Path;

/// Outcome of a best-effort delete.
#[derive(Debug)]
pub enum Cleanup {
    Removed,
    Missing,
    Failed(std::io::Error),
}

impl Cleanup {
    pub fn is_removed(&self) -> bool {
        matches!(self, Cleanup::Removed)
    }

    fn from_result(path: &Path, result: std::io::Result<()>) -> Self {
        match result {
            Ok(()) => Cleanup::Removed,
            Err(e) if e.kind() == ErrorKind::NotFound => Cleanup::Missing,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Cleanup failed");
                Cleanup::Failed(e)
            }
        }
    }
}

/// Remove a single file.
pub fn remove_file(path: &Path) -> Cleanup {
    Cleanup::from_result(path, std::fs::remove_file(path))
}

/// Remove a directory and everything under it.
pub fn remove_dir(path: &Path) -> Cleanup {
    Cleanup::from_result(path, std::fs::remove_dir_all(path))
}
