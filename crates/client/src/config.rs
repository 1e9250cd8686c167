use std::path::PathBuf;
use std::time::Duration;

use kiosksync_transfer::{RetryPolicy, TransferConfig};

/// Local inventory cache file name, always excluded from hashing.
pub const DEFAULT_CACHE_FILE: &str = ".sync_inventory.json";

/// Kiosk sync configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Admin server base URL, e.g. `http://10.0.0.5:8750`.
    pub server_url: String,
    /// Stable identity of this kiosk across sessions.
    pub kiosk_id: String,
    /// Directory kept content-identical to the admin's copy.
    pub sync_root: PathBuf,
    /// Inventory cache file name, relative to the sync root.
    pub cache_file: String,
    /// Walk exclusions in addition to the cache file.
    pub excludes: Vec<String>,
    /// Driver tick cadence.
    pub tick_interval: Duration,
    /// Queue poll cadence while waiting for a turn.
    pub poll_interval: Duration,
    /// Watchdog threshold: a session with no progress this long is reset.
    pub stall_timeout: Duration,
    pub retry: RetryPolicy,
    pub transfer: TransferConfig,
}

impl SyncConfig {
    pub fn new(server_url: impl Into<String>, kiosk_id: impl Into<String>, sync_root: impl Into<PathBuf>) -> Self {
        Self {
            server_url: server_url.into(),
            kiosk_id: kiosk_id.into(),
            sync_root: sync_root.into(),
            cache_file: DEFAULT_CACHE_FILE.to_string(),
            excludes: Vec::new(),
            tick_interval: Duration::from_secs(1),
            poll_interval: Duration::from_secs(2),
            stall_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            transfer: TransferConfig::default(),
        }
    }

    /// Walk exclusions including the cache file itself.
    pub fn all_excludes(&self) -> Vec<String> {
        let mut excludes = self.excludes.clone();
        excludes.push(self.cache_file.clone());
        excludes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_file_is_always_excluded() {
        let mut config = SyncConfig::new("http://host:8750", "kiosk-1", "/tmp/sync");
        config.excludes.push("build".to_string());

        let all = config.all_excludes();
        assert!(all.contains(&"build".to_string()));
        assert!(all.contains(&DEFAULT_CACHE_FILE.to_string()));
    }
}
