//! Per-job scratch directories.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use log::{debug, info, warn};

use crate::error::StorageError;
use crate::sanitize::safe_component;

/// Prefix shared by every scratch directory; the sweeper only touches these.
pub const WORKDIR_PREFIX: &str = "repo-";

const ARCHIVE_FILE: &str = "archive.zip";
const TREE_DIR: &str = "tree";

/// Scratch directory owned by exactly one job. Removed when dropped.
#[derive(Debug)]
pub struct WorkingDirectory {
    path: PathBuf,
}

impl WorkingDirectory {
    /// Creates `<root>/repo-<id>-<unix nanos>-<short uuid>`. Creation fails if
    /// the name is somehow taken, so two jobs never share a directory.
    pub fn create(root: &Path, repository_id: &str) -> Result<Self, StorageError> {
        std::fs::create_dir_all(root).map_err(|e| StorageError::CreateDirectory {
            path: root.to_path_buf(),
            source: e,
        })?;

        let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        let name = format!(
            "{}{}-{}-{}",
            WORKDIR_PREFIX,
            safe_component(repository_id),
            nanos,
            &suffix[..8]
        );
        let path = root.join(name);

        std::fs::create_dir(&path).map_err(|e| StorageError::CreateDirectory {
            path: path.clone(),
            source: e,
        })?;
        debug!("Created working directory {}", path.display());

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Where the downloaded archive is written.
    pub fn archive_path(&self) -> PathBuf {
        self.path.join(ARCHIVE_FILE)
    }

    /// Where the archive is extracted.
    pub fn tree_dir(&self) -> PathBuf {
        self.path.join(TREE_DIR)
    }
}

impl Drop for WorkingDirectory {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!("Removed working directory {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove working directory {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Removes `repo-*` directories under `root` last modified at least
/// `max_age` ago. Returns how many were removed. A missing root is empty.
pub fn sweep_stale_workdirs(root: &Path, max_age: Duration) -> Result<usize, StorageError> {
    let entries = match std::fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => {
            return Err(StorageError::ReadDirectory {
                path: root.to_path_buf(),
                source: e,
            })
        }
    };

    let now = SystemTime::now();
    let mut removed = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        if !name.to_string_lossy().starts_with(WORKDIR_PREFIX) {
            continue;
        }
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        if !metadata.is_dir() {
            continue;
        }
        let age = metadata
            .modified()
            .ok()
            .and_then(|modified| now.duration_since(modified).ok())
            .unwrap_or_default();
        if age < max_age {
            continue;
        }

        let path = entry.path();
        match std::fs::remove_dir_all(&path) {
            Ok(()) => {
                info!("Swept stale working directory {}", path.display());
                removed += 1;
            }
            Err(e) => warn!("Failed to sweep {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}
