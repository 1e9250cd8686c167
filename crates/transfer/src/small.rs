//! Small-file delivery: write-after-full-decode.

use std::path::Path;

use kiosksync_protocol::paths::validate_sync_path;

use crate::{TransferError, hash_bytes};

/// Writes a fully received small-file payload to its final location.
///
/// The content hash is verified against the manifest before anything
/// touches `rel_path`, so a partial or corrupted payload is never visible
/// at the final path.
pub fn write_small_file(
    root: &Path,
    rel_path: &str,
    data: &[u8],
    expected_hash: &str,
) -> Result<(), TransferError> {
    validate_sync_path(rel_path).map_err(|e| TransferError::InvalidPath(e.to_string()))?;

    let actual = hash_bytes(data);
    if actual != expected_hash {
        return Err(TransferError::HashMismatch {
            path: rel_path.to_string(),
            expected: expected_hash.to_string(),
            actual,
        });
    }

    let full_path = root.join(rel_path);
    if let Some(parent) = full_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&full_path, data)?;
    Ok(())
}
