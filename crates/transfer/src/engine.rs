//! Orchestrates a batch of file downloads against a [`FileSource`].

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use futures_util::StreamExt;
use futures_util::stream::FuturesUnordered;
use tracing::{info, warn};

use kiosksync_protocol::LARGE_FILE_THRESHOLD;

use crate::large::download_large;
use crate::progress::StallClock;
use crate::retry::RetryPolicy;
use crate::small::write_small_file;
use crate::source::FileSource;
use crate::TransferError;

/// Tuning knobs for a transfer batch.
#[derive(Debug, Clone)]
pub struct TransferConfig {
    /// Files at or above this size stream to a sidecar; smaller files
    /// travel inline.
    pub large_file_threshold: i64,
    /// Concurrent large-file downloads. One by default, so kiosks do not
    /// compete for the admin machine's uplink.
    pub concurrency: usize,
    pub retry: RetryPolicy,
    /// Per-chunk idle bound on large-file streams.
    pub stream_idle_timeout: Duration,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            large_file_threshold: LARGE_FILE_THRESHOLD,
            concurrency: 1,
            retry: RetryPolicy::default(),
            stream_idle_timeout: Duration::from_secs(30),
        }
    }
}

/// A file that reached its final path with the expected content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferredFile {
    pub path: String,
    pub hash: String,
}

/// Result of one transfer batch.
#[derive(Debug, Default)]
pub struct TransferOutcome {
    pub transferred: Vec<TransferredFile>,
    /// Path and reason for every file that failed all attempts.
    pub failed: Vec<(String, String)>,
}

/// Pulls a set of files from a [`FileSource`] into a local root.
///
/// Small and large files take different paths (inline batch vs resumable
/// stream); failed files are retried as a group between rounds, up to the
/// configured attempt count. Every successfully landed file is reported to
/// the caller's callback immediately so inventory updates survive a crash
/// mid-batch.
pub struct TransferEngine<S: FileSource> {
    source: S,
    root: PathBuf,
    config: TransferConfig,
    clock: StallClock,
}

impl<S: FileSource> TransferEngine<S> {
    pub fn new(source: S, root: PathBuf, config: TransferConfig, clock: StallClock) -> Self {
        Self {
            source,
            root,
            config,
            clock,
        }
    }

    /// Transfers `wanted` files, each a `(relative path, expected hash)`
    /// pair, calling `on_file` after each one lands.
    pub async fn transfer<F>(
        &self,
        wanted: &[(String, String)],
        mut on_file: F,
    ) -> TransferOutcome
    where
        F: FnMut(&TransferredFile),
    {
        let mut outcome = TransferOutcome::default();
        if wanted.is_empty() {
            return outcome;
        }

        let hashes: HashMap<String, String> = wanted.iter().cloned().collect();
        let paths: Vec<String> = wanted.iter().map(|(p, _)| p.clone()).collect();

        let sizes = match self.source.file_infos(&paths).await {
            Ok(sizes) => {
                self.clock.touch();
                sizes
            }
            Err(e) => {
                let reason = e.to_string();
                outcome.failed = paths.into_iter().map(|p| (p, reason.clone())).collect();
                return outcome;
            }
        };

        let mut pending: Vec<String> = Vec::new();
        for path in paths {
            if sizes.contains_key(&path) {
                pending.push(path);
            } else {
                outcome.failed.push((path, "no metadata from server".into()));
            }
        }

        for attempt in 1..=self.config.retry.max_attempts {
            if pending.is_empty() {
                break;
            }
            if attempt > 1 {
                info!(attempt, remaining = pending.len(), "retrying failed files");
                self.config.retry.wait().await;
            }

            let mut failures: Vec<(String, String)> = Vec::new();
            let (small, large): (Vec<String>, Vec<String>) = pending
                .drain(..)
                .partition(|p| sizes[p] < self.config.large_file_threshold);

            if !small.is_empty() {
                self.transfer_small(&small, &hashes, &mut on_file, &mut outcome, &mut failures)
                    .await;
            }
            if !large.is_empty() {
                self.transfer_large(&large, &sizes, &hashes, &mut on_file, &mut outcome, &mut failures)
                    .await;
            }

            if self.config.retry.is_last(attempt) {
                outcome.failed.extend(failures);
            } else {
                pending = failures.into_iter().map(|(p, _)| p).collect();
            }
        }

        outcome
    }

    async fn transfer_small<F>(
        &self,
        paths: &[String],
        hashes: &HashMap<String, String>,
        on_file: &mut F,
        outcome: &mut TransferOutcome,
        failures: &mut Vec<(String, String)>,
    ) where
        F: FnMut(&TransferredFile),
    {
        let contents = match self.source.fetch_small(paths).await {
            Ok(contents) => {
                self.clock.touch();
                contents
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(error = %reason, count = paths.len(), "inline batch failed");
                failures.extend(paths.iter().map(|p| (p.clone(), reason.clone())));
                return;
            }
        };

        for path in paths {
            let Some(data) = contents.get(path) else {
                failures.push((path.clone(), "not returned by server".into()));
                continue;
            };
            let expected = &hashes[path];
            match write_small_file(&self.root, path, data, expected) {
                Ok(()) => {
                    self.clock.touch();
                    let file = TransferredFile {
                        path: path.clone(),
                        hash: expected.clone(),
                    };
                    on_file(&file);
                    outcome.transferred.push(file);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "small file rejected");
                    failures.push((path.clone(), e.to_string()));
                }
            }
        }
    }

    async fn transfer_large<F>(
        &self,
        paths: &[String],
        sizes: &HashMap<String, i64>,
        hashes: &HashMap<String, String>,
        on_file: &mut F,
        outcome: &mut TransferOutcome,
        failures: &mut Vec<(String, String)>,
    ) where
        F: FnMut(&TransferredFile),
    {
        let concurrency = self.config.concurrency.max(1);
        let mut downloads = FuturesUnordered::new();
        let mut queue = paths.iter();

        loop {
            while downloads.len() < concurrency {
                let Some(path) = queue.next() else { break };
                let total_size = sizes[path];
                downloads.push(async move {
                    let result = download_large(
                        &self.source,
                        &self.root,
                        path,
                        total_size,
                        &self.clock,
                        self.config.stream_idle_timeout,
                    )
                    .await;
                    (path, result)
                });
            }

            let Some((path, result)) = downloads.next().await else {
                break;
            };
            match result {
                Ok(()) => {
                    let file = TransferredFile {
                        path: path.clone(),
                        hash: hashes[path].clone(),
                    };
                    on_file(&file);
                    outcome.transferred.push(file);
                }
                Err(e) => {
                    warn!(path = %path, error = %e, "large file download failed");
                    failures.push((path.clone(), e.to_string()));
                }
            }
        }
    }
}
