//! Persistent inventory cache.
//!
//! A single JSON file mapping normalized path → hash. Loads are forgiving
//! (a missing or corrupt cache just means an empty inventory); saves are
//! atomic via a sibling temp file and rename.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::{Inventory, InventoryError};

/// Handle to the on-disk inventory cache file.
#[derive(Debug, Clone)]
pub struct InventoryCache {
    path: PathBuf,
}

impl InventoryCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cache file location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached inventory. Missing or unreadable caches yield an
    /// empty map; the cache is a hint, so this is not an error.
    pub fn load(&self) -> Inventory {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(map) => map,
                Err(e) => {
                    warn!(path = %self.path.display(), "inventory cache corrupt, starting empty: {e}");
                    Inventory::new()
                }
            },
            Err(_) => Inventory::new(),
        }
    }

    /// Atomically replaces the cache contents.
    pub fn save(&self, inventory: &Inventory) -> Result<(), InventoryError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let data = serde_json::to_vec_pretty(inventory)?;
        std::fs::write(&tmp, data)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Updates a single entry and persists.
    pub fn record(&self, path: &str, hash: &str) -> Result<(), InventoryError> {
        let mut inventory = self.load();
        inventory.insert(path.to_string(), hash.to_string());
        self.save(&inventory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn load_missing_cache_is_empty() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::new(dir.path().join("inv.json"));
        assert!(cache.load().is_empty());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::new(dir.path().join("inv.json"));

        let mut inv = Inventory::new();
        inv.insert("a.txt".into(), "h1".into());
        inv.insert("audio/b.mp3".into(), "h2".into());
        cache.save(&inv).unwrap();

        assert_eq!(cache.load(), inv);
    }

    #[test]
    fn corrupt_cache_is_empty_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("inv.json");
        std::fs::write(&path, b"{not json").unwrap();

        let cache = InventoryCache::new(&path);
        assert!(cache.load().is_empty());
    }

    #[test]
    fn record_updates_single_entry() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::new(dir.path().join("inv.json"));

        cache.record("a.txt", "h1").unwrap();
        cache.record("b.txt", "h2").unwrap();
        cache.record("a.txt", "h3").unwrap();

        let inv = cache.load();
        assert_eq!(inv.get("a.txt").unwrap(), "h3");
        assert_eq!(inv.get("b.txt").unwrap(), "h2");
    }

    #[test]
    fn save_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let cache = InventoryCache::new(dir.path().join("inv.json"));
        cache.save(&Inventory::new()).unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["inv.json".to_string()]);
    }
}
