use serde::{Deserialize, Serialize};

/// Where a kiosk's sync request stands relative to the single-slot queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Holds the sync slot for the current generation.
    Active,
    /// Waiting behind the active holder.
    Queued,
    /// Unknown to the server, or the session's generation has passed.
    NotQueued,
}

/// One distributable file, identified by its relative path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    /// POSIX-style path relative to the sync root, forward slashes only.
    pub path: String,
    /// SHA-256 hex digest of the file contents.
    pub hash: String,
    /// Size in bytes.
    pub size: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&SyncStatus::Active).unwrap(),
            "\"active\""
        );
        assert_eq!(
            serde_json::to_string(&SyncStatus::Queued).unwrap(),
            "\"queued\""
        );
        assert_eq!(
            serde_json::to_string(&SyncStatus::NotQueued).unwrap(),
            "\"not_queued\""
        );
    }

    #[test]
    fn sync_status_roundtrip() {
        for status in [SyncStatus::Active, SyncStatus::Queued, SyncStatus::NotQueued] {
            let json = serde_json::to_string(&status).unwrap();
            let parsed: SyncStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(status, parsed);
        }
    }

    #[test]
    fn file_record_roundtrip() {
        let rec = FileRecord {
            path: "hints/room1/hint01.txt".into(),
            hash: "ab".repeat(32),
            size: 420,
        };
        let json = serde_json::to_string(&rec).unwrap();
        let parsed: FileRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(rec, parsed);
    }
}
