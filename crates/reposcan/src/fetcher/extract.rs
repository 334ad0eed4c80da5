//! ZIP extraction into a working directory.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Result, ScanError, StorageError};

/// Extracts `archive` into `dest` and returns the tree root.
///
/// Provider archives wrap the repository in one `owner-repo-sha/` folder;
/// when `dest` ends up holding exactly that one directory, the directory is
/// the root. Entries that would land outside `dest` fail the whole archive.
pub fn extract_archive(archive: &Path, dest: &Path) -> Result<PathBuf> {
    let file = File::open(archive)
        .map_err(|e| ScanError::ArchiveCorrupt(format!("Failed to open archive: {}", e)))?;
    let mut zip = zip::ZipArchive::new(file)
        .map_err(|e| ScanError::ArchiveCorrupt(format!("Failed to read archive: {}", e)))?;

    create_dir(dest)?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| ScanError::ArchiveCorrupt(format!("Bad entry #{}: {}", index, e)))?;

        let Some(relative) = entry.enclosed_name() else {
            return Err(ScanError::ArchiveCorrupt(format!(
                "Entry '{}' escapes the extraction root",
                entry.name()
            )));
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            create_dir(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }
        let mut out = File::create(&target).map_err(|e| StorageError::WriteFile {
            path: target.clone(),
            source: e,
        })?;
        io::copy(&mut entry, &mut out).map_err(|e| {
            ScanError::ArchiveCorrupt(format!("Failed to extract '{}': {}", entry.name(), e))
        })?;
    }

    tree_root(dest)
}

fn create_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| StorageError::CreateDirectory {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(())
}

fn tree_root(dest: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dest)
        .map_err(|e| StorageError::ReadDirectory {
            path: dest.to_path_buf(),
            source: e,
        })?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| StorageError::ReadDirectory {
            path: dest.to_path_buf(),
            source: e,
        })?;

    match entries.as_slice() {
        [only] if only.file_type().map(|t| t.is_dir()).unwrap_or(false) => Ok(only.path()),
        _ => Ok(dest.to_path_buf()),
    }
}
