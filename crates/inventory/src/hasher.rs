use std::io::Read;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use sha2::{Digest, Sha256};

use crate::InventoryError;

/// Read size for streaming hashes.
const READ_CHUNK: usize = 64 * 1024;

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Computes SHA-256 of a file in fixed-size reads.
pub fn hash_file_blocking(path: &Path) -> Result<String, InventoryError> {
    let progress = Mutex::new(Instant::now());
    hash_file_tracking(path, &progress)
}

fn hash_file_tracking(path: &Path, progress: &Mutex<Instant>) -> Result<String, InventoryError> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; READ_CHUNK];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        *progress.lock().unwrap() = Instant::now();
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hashes a file on the blocking pool with a progress deadline.
///
/// The blocking worker marks progress after every read; this side waits in
/// `read_timeout` slices and gives up with [`InventoryError::Stalled`] only
/// when no read has completed within a whole slice. A slow file that keeps
/// delivering bytes is never treated as stalled; a read hung on a
/// misbehaving disk is abandoned (the worker thread is left to finish or
/// die on its own) so one file cannot pin the inventory pass.
pub async fn hash_file(path: &Path, read_timeout: Duration) -> Result<String, InventoryError> {
    let path = path.to_path_buf();
    let progress = Arc::new(Mutex::new(Instant::now()));
    let worker_progress = Arc::clone(&progress);
    let mut task =
        tokio::task::spawn_blocking(move || hash_file_tracking(&path, &worker_progress));

    loop {
        match tokio::time::timeout(read_timeout, &mut task).await {
            Ok(joined) => return joined?,
            Err(_) => {
                let idle = progress.lock().unwrap().elapsed();
                if idle >= read_timeout {
                    return Err(InventoryError::Stalled(read_timeout));
                }
            }
        }
    }
}
