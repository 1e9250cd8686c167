//! Large-file delivery: resumable streaming into a `.temp` sidecar.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use kiosksync_protocol::TEMP_SUFFIX;
use kiosksync_protocol::paths::validate_sync_path;

use crate::progress::{StallClock, ThroughputMeter};
use crate::source::FileSource;
use crate::TransferError;

/// Throughput log cadence.
const LOG_INTERVAL: Duration = Duration::from_secs(1);

/// Downloads one large file, resuming from the sidecar if present.
///
/// Bytes append to `<final>.temp`; the resume offset is simply the current
/// sidecar size. After the stream ends the sidecar size must equal
/// `total_size` exactly before it is renamed over the final path; a
/// mismatch leaves the sidecar in place for the next resume attempt.
/// `idle_timeout` bounds the wait for each chunk (data-driven, no total
/// transfer timeout).
pub async fn download_large<S: FileSource>(
    source: &S,
    root: &Path,
    rel_path: &str,
    total_size: i64,
    clock: &StallClock,
    idle_timeout: Duration,
) -> Result<(), TransferError> {
    validate_sync_path(rel_path).map_err(|e| TransferError::InvalidPath(e.to_string()))?;

    let final_path = root.join(rel_path);
    let temp_path = sidecar_path(&final_path);
    if let Some(parent) = final_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut offset = match std::fs::metadata(&temp_path) {
        Ok(meta) => meta.len(),
        Err(_) => 0,
    };

    // A sidecar larger than the target means the admin-side file changed
    // between sessions; start over.
    if offset as i64 > total_size {
        debug!(path = rel_path, offset, total_size, "oversized sidecar, restarting");
        std::fs::remove_file(&temp_path)?;
        offset = 0;
    }

    if (offset as i64) < total_size {
        if offset > 0 {
            info!(path = rel_path, offset, "resuming download");
        }
        let mut stream = source.open_stream(rel_path, offset).await?;
        clock.touch();

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&temp_path)
            .await?;

        let mut meter = ThroughputMeter::new(Duration::from_secs(5));
        let mut downloaded = offset;
        let mut last_log = Instant::now();

        loop {
            let chunk = match tokio::time::timeout(idle_timeout, stream.next()).await {
                Ok(Some(chunk)) => chunk?,
                Ok(None) => break,
                Err(_) => return Err(TransferError::StreamIdle(idle_timeout)),
            };

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            clock.touch();
            meter.record(chunk.len() as u64);

            if last_log.elapsed() >= LOG_INTERVAL {
                info!(
                    path = rel_path,
                    downloaded,
                    total_size,
                    bytes_per_sec = meter.bytes_per_second() as u64,
                    "downloading"
                );
                last_log = Instant::now();
            }
        }

        file.flush().await?;
    }

    let actual = std::fs::metadata(&temp_path)?.len() as i64;
    if actual != total_size {
        return Err(TransferError::SizeMismatch {
            path: rel_path.to_string(),
            expected: total_size,
            actual,
        });
    }

    std::fs::rename(&temp_path, &final_path)?;
    clock.touch();
    info!(path = rel_path, size = total_size, "download complete");
    Ok(())
}

fn sidecar_path(final_path: &Path) -> PathBuf {
    let mut os = final_path.as_os_str().to_os_string();
    os.push(TEMP_SUFFIX);
    PathBuf::from(os)
}
