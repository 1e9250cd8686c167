//! Admin-side content manifest.
//!
//! Serves the authoritative path to hash map for the content root. Hashes
//! are cached keyed on size and mtime, so repeated `/sync_info` polls only
//! re-hash files that actually changed.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use tokio::sync::RwLock;
use tracing::{debug, warn};

use kiosksync_inventory::{Inventory, hash_file, scan_sync_root};

use crate::ServerError;

/// Per-read stall bound for hashing, mirroring the kiosk side.
const HASH_READ_TIMEOUT: Duration = Duration::from_secs(10);

struct CachedHash {
    size: i64,
    mtime: SystemTime,
    hash: String,
}

/// Hash cache over the content root.
pub struct ManifestStore {
    root: PathBuf,
    cache: RwLock<HashMap<String, CachedHash>>,
}

impl ManifestStore {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Scans the content root and returns the current manifest.
    ///
    /// Files that fail to stat or hash are logged and left out rather than
    /// failing the whole manifest; kiosks then simply do not request them.
    pub async fn manifest(&self) -> Result<Inventory, ServerError> {
        let scanned = {
            let root = self.root.clone();
            tokio::task::spawn_blocking(move || scan_sync_root(&root, &[]))
                .await
                .map_err(|e| ServerError::Io(std::io::Error::other(e)))??
        };

        let mut manifest = Inventory::new();
        let mut fresh: Vec<(String, CachedHash)> = Vec::new();

        {
            let cache = self.cache.read().await;
            for file in &scanned {
                let full = self.root.join(&file.path);
                let mtime = match std::fs::metadata(&full).and_then(|m| m.modified()) {
                    Ok(mtime) => mtime,
                    Err(e) => {
                        warn!(path = %file.path, error = %e, "cannot stat file, skipping");
                        continue;
                    }
                };

                if let Some(cached) = cache.get(&file.path) {
                    if cached.size == file.size && cached.mtime == mtime {
                        manifest.insert(file.path.clone(), cached.hash.clone());
                        continue;
                    }
                }

                match hash_file(&full, HASH_READ_TIMEOUT).await {
                    Ok(hash) => {
                        debug!(path = %file.path, "hashed content file");
                        manifest.insert(file.path.clone(), hash.clone());
                        fresh.push((
                            file.path.clone(),
                            CachedHash {
                                size: file.size,
                                mtime,
                                hash,
                            },
                        ));
                    }
                    Err(e) => {
                        warn!(path = %file.path, error = %e, "cannot hash file, skipping");
                    }
                }
            }
        }

        if !fresh.is_empty() {
            let mut cache = self.cache.write().await;
            // Drop cache entries for files no longer on disk.
            cache.retain(|path, _| scanned.iter().any(|f| &f.path == path));
            for (path, entry) in fresh {
                cache.insert(path, entry);
            }
        }

        Ok(manifest)
    }
}
