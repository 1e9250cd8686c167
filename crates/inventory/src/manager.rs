//! Inventory manager: full hashing passes over the sync root.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::cache::InventoryCache;
use crate::hasher::hash_file;
use crate::walker::scan_sync_root;
use crate::{Inventory, InventoryError};

/// Tuning knobs for inventory passes.
#[derive(Debug, Clone)]
pub struct InventoryConfig {
    /// Relative paths (or directory prefixes) excluded from the walk.
    pub excludes: Vec<String>,
    /// Per-file hash progress timeout; a file that stalls longer is skipped.
    pub read_timeout: Duration,
    /// Bounded worker pool size for hashing.
    pub workers: usize,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            excludes: Vec::new(),
            read_timeout: Duration::from_secs(10),
            workers: 4,
        }
    }
}

/// Owns the sync root's inventory: one full-pass hasher plus the cache.
pub struct InventoryManager {
    root: PathBuf,
    cache: InventoryCache,
    config: InventoryConfig,
}

impl InventoryManager {
    pub fn new(root: impl Into<PathBuf>, cache_path: impl Into<PathBuf>, config: InventoryConfig) -> Self {
        Self {
            root: root.into(),
            cache: InventoryCache::new(cache_path),
            config,
        }
    }

    /// Returns the persisted inventory without touching any file contents.
    pub fn cached(&self) -> Inventory {
        self.cache.load()
    }

    /// Updates one entry after a successful file write.
    pub fn record(&self, path: &str, hash: &str) -> Result<(), InventoryError> {
        self.cache.record(path, hash)
    }

    /// Runs a full hashing pass over the sync root.
    pub async fn full_inventory(&self) -> Result<Inventory, InventoryError> {
        self.full_inventory_with_progress(|| {}).await
    }

    /// Full pass with a progress callback, invoked once per hashed file.
    ///
    /// Files are hashed smallest-first in adaptively sized batches through a
    /// bounded worker pool. After every batch the fresh hashes are persisted
    /// merged over the previous inventory, so a crash mid-pass loses at most
    /// one batch of work and never the last-known-good entries. If fewer
    /// than half the discovered files hash successfully the previous
    /// inventory is restored and returned instead of a mostly-empty result.
    pub async fn full_inventory_with_progress(
        &self,
        on_progress: impl Fn() + Send + Sync,
    ) -> Result<Inventory, InventoryError> {
        let mut files = scan_sync_root(&self.root, &self.config.excludes)?;
        files.sort_by_key(|f| f.size);

        let total = files.len();
        if total == 0 {
            let empty = Inventory::new();
            self.cache.save(&empty)?;
            return Ok(empty);
        }

        let batch_size = adaptive_batch_size(total);
        debug!(total, batch_size, "starting full inventory pass");

        let previous = self.cache.load();
        let semaphore = Arc::new(Semaphore::new(self.config.workers.max(1)));
        let mut inventory = Inventory::new();
        let mut hashed_ok = 0usize;

        for batch in files.chunks(batch_size) {
            let mut set = JoinSet::new();
            for file in batch {
                let sem = Arc::clone(&semaphore);
                let abs = self.root.join(&file.path);
                let rel = file.path.clone();
                let timeout = self.config.read_timeout;
                set.spawn(async move {
                    // Closing the semaphore is never done, so acquire cannot fail.
                    let _permit = sem.acquire_owned().await.ok();
                    let result = hash_file(&abs, timeout).await;
                    (rel, result)
                });
            }

            while let Some(joined) = set.join_next().await {
                let (rel, result) = joined?;
                match result {
                    Ok(hash) => {
                        inventory.insert(rel, hash);
                        hashed_ok += 1;
                        on_progress();
                    }
                    Err(e) => {
                        // Skip, don't fail: the path stays out of the
                        // inventory and gets retried on the next attempt.
                        warn!(path = %rel, "hashing skipped: {e}");
                    }
                }
            }

            // Checkpoint merged over the previous inventory; the pure fresh
            // result replaces it only once the pass is known to be sound.
            let mut checkpoint = previous.clone();
            checkpoint.extend(inventory.iter().map(|(k, v)| (k.clone(), v.clone())));
            self.cache.save(&checkpoint)?;
        }

        if hashed_ok * 2 < total {
            warn!(
                hashed_ok,
                total, "under half the files hashed; keeping last-known-good inventory"
            );
            self.cache.save(&previous)?;
            return Ok(previous);
        }

        info!(files = hashed_ok, "inventory pass complete");
        self.cache.save(&inventory)?;
        Ok(inventory)
    }
}

/// Batch size scales with the file count: small trees persist per handful
/// of files, large trees amortize the cache writes.
fn adaptive_batch_size(total: usize) -> usize {
    (total / 8).clamp(4, 64)
}
