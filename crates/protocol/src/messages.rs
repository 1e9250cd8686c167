use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::SyncStatus;

// ---------------------------------------------------------------------------
// Sync queue endpoints
// ---------------------------------------------------------------------------

/// `POST /request_sync`: asks for a turn on the single sync slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestSyncRequest {
    pub kiosk_id: String,
}

/// `GET /sync_status` query parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatusQuery {
    pub kiosk_id: String,
}

/// Response to both `/request_sync` and `/sync_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncTurnResponse {
    pub status: SyncStatus,
    /// The server's current generation counter.
    pub generation: u64,
    /// Queue position when `status` is `queued`. Informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<usize>,
}

/// `POST /finish_sync`: releases the slot, success or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishSyncRequest {
    pub kiosk_id: String,
}

/// Response to `/finish_sync`: the advanced generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinishSyncResponse {
    pub generation: u64,
}

// ---------------------------------------------------------------------------
// File delivery endpoints
// ---------------------------------------------------------------------------

/// `POST /request_files`: metadata (`info_only`) or inline content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFilesRequest {
    pub kiosk_id: String,
    pub files: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub info_only: bool,
}

/// Per-path entry in a `/request_files` response.
///
/// Info calls carry `size` and `compressed`; data calls carry `data`
/// (base64-encoded, zlib-compressed when `compressed` was reported).
/// A per-path failure sets `error` without failing the whole batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntryPayload {
    #[serde(default, skip_serializing_if = "is_zero_i64")]
    pub size: i64,
    #[serde(default, skip_serializing_if = "is_false")]
    pub compressed: bool,
    #[serde(default, with = "base64_opt", skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

/// Response to `/request_files`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFilesResponse {
    pub files: HashMap<String, FileEntryPayload>,
}

/// `POST /download_file`: body for the streamed large-file path.
/// Resume offsets travel in a standard `Range: bytes=N-` header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadFileRequest {
    pub file_path: String,
    pub kiosk_id: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// JSON error body returned with non-2xx statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn is_zero_i64(v: &i64) -> bool {
    *v == 0
}

fn is_false(v: &bool) -> bool {
    !v
}

/// Base64 serde for optional byte payloads inside JSON envelopes.
mod base64_opt {
    use base64::{Engine, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => STANDARD.encode(bytes).serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            Some(s) => STANDARD
                .decode(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
