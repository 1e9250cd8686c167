//! Kiosk-side hash inventory.
//!
//! Walks the sync root, computes streaming SHA-256 hashes through a bounded
//! worker pool, and persists the resulting path → hash map to a local JSON
//! cache. The cache is a hint, not ground truth: it may be stale after a
//! partial failure and is corrected the next time a full pass runs.

mod cache;
mod hasher;
mod manager;
mod walker;

pub use cache::InventoryCache;
pub use hasher::{hash_bytes, hash_file, hash_file_blocking};
pub use manager::{InventoryConfig, InventoryManager};
pub use walker::{ScannedFile, scan_sync_root};

/// A kiosk's local path → hash map.
pub type Inventory = std::collections::HashMap<String, String>;

/// Errors produced by the inventory crate.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Cache(#[from] serde_json::Error),

    #[error("no read progress within {0:?}")]
    Stalled(std::time::Duration),

    #[error("hash task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
