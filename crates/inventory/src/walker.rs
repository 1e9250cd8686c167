//! Sync-root scanning.
//!
//! Recursively walks the sync root and produces file entries with relative
//! paths normalized to forward slashes, skipping non-distributable files.

use std::path::Path;

use kiosksync_protocol::TEMP_SUFFIX;
use kiosksync_protocol::paths::normalize_path;

/// A file found under the sync root.
#[derive(Debug, Clone, PartialEq)]
pub struct ScannedFile {
    /// Normalized path relative to the sync root.
    pub path: String,
    /// Size in bytes.
    pub size: i64,
}

/// Scans `root` recursively and returns candidate files for hashing.
///
/// `excludes` holds normalized relative paths (or path prefixes) to skip:
/// the inventory cache file, build artifacts, and so on. In-flight download
/// sidecars (`*.temp`) are always skipped.
pub fn scan_sync_root(root: &Path, excludes: &[String]) -> std::io::Result<Vec<ScannedFile>> {
    let mut files = Vec::new();
    walk_dir(root, root, excludes, &mut files)?;
    Ok(files)
}

fn walk_dir(
    root: &Path,
    current: &Path,
    excludes: &[String],
    files: &mut Vec<ScannedFile>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        let metadata = entry.metadata()?;

        let rel = path
            .strip_prefix(root)
            .map_err(std::io::Error::other)?
            .to_string_lossy()
            .into_owned();
        let rel = normalize_path(&rel);

        if is_excluded(&rel, excludes) {
            continue;
        }

        if metadata.is_dir() {
            walk_dir(root, &path, excludes, files)?;
        } else if metadata.is_file() {
            if rel.ends_with(TEMP_SUFFIX) {
                continue;
            }
            files.push(ScannedFile {
                path: rel,
                size: metadata.len() as i64,
            });
        }
    }

    Ok(())
}

fn is_excluded(rel: &str, excludes: &[String]) -> bool {
    excludes.iter().any(|ex| {
        rel == ex || rel.strip_prefix(ex.as_str()).is_some_and(|r| r.starts_with('/'))
    })
}
