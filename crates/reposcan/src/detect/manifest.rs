//! Manifest file access shared by the probes.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Why a probe could not read its manifest. Never leaves the detector.
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in '{path}': {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid XML in '{path}': {reason}")]
    Xml { path: PathBuf, reason: String },
}

/// Directories never worth descending into when looking for manifests.
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "bin", "obj", "target", "packages"];

/// Reads `root/name` if it exists. Missing files are `Ok(None)`.
pub fn read_optional(root: &Path, name: &str) -> Result<Option<String>, ManifestError> {
    let path = root.join(name);
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(ManifestError::Read { path, source: e }),
    }
}

/// Parses `root/name` as JSON if it exists.
pub fn read_json(root: &Path, name: &str) -> Result<Option<serde_json::Value>, ManifestError> {
    let Some(content) = read_optional(root, name)? else {
        return Ok(None);
    };
    serde_json::from_str(&content)
        .map(Some)
        .map_err(|e| ManifestError::Json {
            path: root.join(name),
            source: e,
        })
}

/// Finds files ending in `extension` up to `max_depth` levels below `root`,
/// skipping hidden and dependency directories. Sorted for stable output.
pub fn find_by_extension(root: &Path, extension: &str, max_depth: usize) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .max_depth(max_depth)
        .into_iter()
        .filter_entry(|entry| {
            if entry.depth() == 0 || !entry.file_type().is_dir() {
                return true;
            }
            let name = entry.file_name().to_string_lossy();
            !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_ref())
        })
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| entry.file_name().to_string_lossy().ends_with(extension))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Merges string-valued entries of the named JSON objects into one list of
/// (name, version) pairs. Later sections win on duplicate names.
pub fn merged_dependencies(manifest: &serde_json::Value, sections: &[&str]) -> Vec<(String, String)> {
    let mut merged: Vec<(String, String)> = Vec::new();
    for section in sections {
        let Some(deps) = manifest.get(*section).and_then(|v| v.as_object()) else {
            continue;
        };
        for (name, version) in deps {
            let version = version.as_str().unwrap_or_default().to_string();
            match merged.iter_mut().find(|(existing, _)| existing == name) {
                Some(entry) => entry.1 = version,
                None => merged.push((name.clone(), version)),
            }
        }
    }
    merged
}
