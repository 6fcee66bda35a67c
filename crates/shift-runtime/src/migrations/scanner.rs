//! Migration directory scanning.

use std::fs::ReadDir;
use std::path::Path;

use tracing::debug;

use shift_core::error::{Result, ShiftError};

use super::file::MigrationFile;

/// Scan `dir` for migration files.
///
/// The returned iterator is lazy and single-pass. It yields one entry per
/// non-directory child of `dir`, in whatever order the filesystem lists
/// them; nested directories are skipped without being entered.
pub fn scan(dir: &Path) -> Result<MigrationFiles> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        ShiftError::Config(format!(
            "Cannot read migrations directory {}: {}",
            dir.display(),
            e
        ))
    })?;

    Ok(MigrationFiles { entries })
}

/// Iterator returned by [`scan`].
pub struct MigrationFiles {
    entries: ReadDir,
}

impl Iterator for MigrationFiles {
    type Item = Result<MigrationFile>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.entries.next()? {
                Ok(entry) => entry,
                Err(e) => return Some(Err(ShiftError::Io(e))),
            };

            let path = entry.path();
            if path.is_dir() {
                debug!("Skipping directory {}", path.display());
                continue;
            }

            return Some(Ok(MigrationFile::from_path(path)));
        }
    }
}
