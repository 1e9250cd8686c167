//! Path normalization and validation shared by client and server.

use std::path::{Component, Path};

/// Error for paths that could escape the sync root.
#[derive(Debug, thiserror::Error)]
#[error("invalid path: {0}")]
pub struct InvalidPath(pub String);

/// Normalizes a relative path to the wire form: forward slashes, no
/// leading `./`. Client and server may run on different OSes, so every
/// path is normalized before it enters a message or a map key.
pub fn normalize_path(path: &str) -> String {
    let mut p = path.replace('\\', "/");
    while let Some(rest) = p.strip_prefix("./") {
        p = rest.to_string();
    }
    p
}

/// Validates that a wire path stays inside the sync root.
///
/// Rejects empty paths, absolute paths, parent-directory traversal, and
/// Windows prefix components.
pub fn validate_sync_path(file_path: &str) -> Result<(), InvalidPath> {
    if file_path.is_empty() {
        return Err(InvalidPath("empty path".into()));
    }

    let path = Path::new(file_path);

    if path.is_absolute() {
        return Err(InvalidPath(format!("absolute path not allowed: {file_path}")));
    }

    for component in path.components() {
        match component {
            Component::ParentDir => {
                return Err(InvalidPath(format!(
                    "parent directory traversal not allowed: {file_path}"
                )));
            }
            Component::Prefix(_) => {
                return Err(InvalidPath(format!("path prefix not allowed: {file_path}")));
            }
            Component::RootDir => {
                return Err(InvalidPath(format!("absolute path not allowed: {file_path}")));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_backslashes() {
        assert_eq!(normalize_path("hints\\room1\\h1.txt"), "hints/room1/h1.txt");
    }

    #[test]
    fn normalize_strips_leading_dot_slash() {
        assert_eq!(normalize_path("./audio/a.mp3"), "audio/a.mp3");
        assert_eq!(normalize_path("././b.bin"), "b.bin");
    }

    #[test]
    fn normalize_leaves_plain_paths_alone() {
        assert_eq!(normalize_path("images/map.png"), "images/map.png");
    }

    #[test]
    fn rejects_empty_path() {
        assert!(validate_sync_path("").is_err());
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        assert!(validate_sync_path("../../../etc/passwd").is_err());
        assert!(validate_sync_path("sub/../../../escape").is_err());
        assert!(validate_sync_path("..").is_err());
    }

    #[test]
    fn rejects_absolute_path() {
        assert!(validate_sync_path("/tmp/malicious").is_err());
    }

    #[test]
    fn accepts_normal_paths() {
        assert!(validate_sync_path("hint.txt").is_ok());
        assert!(validate_sync_path("audio/room2/clue.mp3").is_ok());
        assert!(validate_sync_path(".hidden/settings.json").is_ok());
        assert!(validate_sync_path("./video.mp4").is_ok());
    }
}
