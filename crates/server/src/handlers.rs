//! Request handlers for the admin server.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use axum::Json;
use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::io::{AsyncSeekExt, SeekFrom};
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use kiosksync_coordinator::Turn;
use kiosksync_protocol::MAX_FILES_PER_REQUEST;
use kiosksync_protocol::messages::{
    DownloadFileRequest, ErrorResponse, FileEntryPayload, FinishSyncRequest, FinishSyncResponse,
    RequestFilesRequest, RequestFilesResponse, RequestSyncRequest, SyncStatusQuery,
    SyncTurnResponse,
};
use kiosksync_protocol::paths::{normalize_path, validate_sync_path};

use crate::AppState;

/// Extensions already compressed at rest; zlib would only waste CPU.
const INCOMPRESSIBLE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "mp3", "m4a", "ogg", "mp4", "mkv", "webm", "mov", "avi",
    "zip", "gz", "bz2", "xz", "zst", "7z", "rar",
];

/// Error body with HTTP status; converts into a JSON [`ErrorResponse`].
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn bad_request(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            code: "not_found",
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: message.into(),
        }
    }

    fn range_not_satisfiable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::RANGE_NOT_SATISFIABLE,
            code: "range_not_satisfiable",
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            code: self.code.to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

fn turn_response(turn: Turn) -> SyncTurnResponse {
    SyncTurnResponse {
        status: turn.status,
        generation: turn.generation,
        position: turn.position,
    }
}

pub async fn request_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RequestSyncRequest>,
) -> Json<SyncTurnResponse> {
    Json(turn_response(state.queue.request_sync(&req.kiosk_id)))
}

pub async fn sync_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SyncStatusQuery>,
) -> Json<SyncTurnResponse> {
    Json(turn_response(state.queue.sync_status(&query.kiosk_id)))
}

pub async fn finish_sync(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FinishSyncRequest>,
) -> Json<FinishSyncResponse> {
    let generation = state.queue.finish_sync(&req.kiosk_id);
    Json(FinishSyncResponse { generation })
}

pub async fn sync_info(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HashMap<String, String>>, ApiError> {
    let manifest = state
        .manifest
        .manifest()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;
    Ok(Json(manifest))
}

pub async fn request_files(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RequestFilesRequest>,
) -> Result<Json<RequestFilesResponse>, ApiError> {
    if req.files.len() > MAX_FILES_PER_REQUEST {
        return Err(ApiError::bad_request(
            "too_many_files",
            format!(
                "at most {MAX_FILES_PER_REQUEST} files per request, got {}",
                req.files.len()
            ),
        ));
    }

    info!(
        kiosk = %req.kiosk_id,
        count = req.files.len(),
        info_only = req.info_only,
        "files requested"
    );

    let mut files = HashMap::new();
    for raw_path in &req.files {
        let path = normalize_path(raw_path);
        let entry = match file_entry(&state, &path, req.info_only).await {
            Ok(entry) => entry,
            Err(reason) => {
                warn!(kiosk = %req.kiosk_id, path = %path, error = %reason, "cannot serve file");
                FileEntryPayload {
                    size: 0,
                    compressed: false,
                    data: None,
                    error: reason,
                }
            }
        };
        files.insert(path, entry);
    }

    Ok(Json(RequestFilesResponse { files }))
}

async fn file_entry(
    state: &AppState,
    path: &str,
    info_only: bool,
) -> Result<FileEntryPayload, String> {
    validate_sync_path(path).map_err(|e| e.to_string())?;

    let full = state.content_root.join(path);
    let metadata = std::fs::metadata(&full).map_err(|e| format!("not accessible: {e}"))?;
    if !metadata.is_file() {
        return Err("not a regular file".to_string());
    }

    let compress = should_compress(path);
    if info_only {
        return Ok(FileEntryPayload {
            size: metadata.len() as i64,
            compressed: compress,
            data: None,
            error: String::new(),
        });
    }

    let raw = tokio::fs::read(&full).await.map_err(|e| e.to_string())?;
    let data = if compress {
        deflate(&raw).map_err(|e| e.to_string())?
    } else {
        raw
    };

    Ok(FileEntryPayload {
        size: metadata.len() as i64,
        compressed: compress,
        data: Some(data),
        error: String::new(),
    })
}

pub async fn download_file(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<DownloadFileRequest>,
) -> Result<Response, ApiError> {
    let path = normalize_path(&req.file_path);
    validate_sync_path(&path).map_err(|e| ApiError::bad_request("invalid_path", e.to_string()))?;

    let full = state.content_root.join(&path);
    let mut file = tokio::fs::File::open(&full)
        .await
        .map_err(|e| ApiError::not_found(format!("{path}: {e}")))?;
    let total = file
        .metadata()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .len();

    let offset = parse_range_start(&headers)
        .map_err(|e| ApiError::bad_request("invalid_range", e))?
        .unwrap_or(0);
    if offset > total {
        return Err(ApiError::range_not_satisfiable(format!(
            "offset {offset} beyond file size {total}"
        )));
    }
    if offset > 0 {
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))?;
    }

    info!(kiosk = %req.kiosk_id, path = %path, offset, total, "streaming file");

    let body = Body::from_stream(ReaderStream::new(file));
    let mut response = Response::new(body);
    if let Ok(len) = header::HeaderValue::from_str(&(total - offset).to_string()) {
        response.headers_mut().insert(header::CONTENT_LENGTH, len);
    }
    if offset > 0 {
        *response.status_mut() = StatusCode::PARTIAL_CONTENT;
        let range = format!("bytes {}-{}/{}", offset, total.saturating_sub(1), total);
        if let Ok(range) = header::HeaderValue::from_str(&range) {
            response.headers_mut().insert(header::CONTENT_RANGE, range);
        }
    }
    Ok(response)
}

/// Parses a `Range: bytes=N-` header into the start offset.
///
/// Only the open-ended single-range form is supported; kiosks always resume
/// to end of file.
fn parse_range_start(headers: &HeaderMap) -> Result<Option<u64>, String> {
    let Some(value) = headers.get(header::RANGE) else {
        return Ok(None);
    };
    let value = value.to_str().map_err(|_| "non-ASCII Range header")?;
    let range = value
        .strip_prefix("bytes=")
        .ok_or_else(|| format!("unsupported Range unit: {value}"))?;
    let start = range
        .strip_suffix('-')
        .ok_or_else(|| format!("unsupported Range form: {value}"))?;
    start
        .parse::<u64>()
        .map(Some)
        .map_err(|_| format!("invalid Range offset: {value}"))
}

/// Whether inline payloads for `path` get zlib compression.
fn should_compress(path: &str) -> bool {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
    match ext {
        Some(ext) => !INCOMPRESSIBLE_EXTENSIONS.contains(&ext.as_str()),
        None => true,
    }
}

fn deflate(data: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn range_headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::RANGE, value.parse().unwrap());
        headers
    }

    #[test]
    fn no_range_header_means_whole_file() {
        assert_eq!(parse_range_start(&HeaderMap::new()).unwrap(), None);
    }

    #[test]
    fn open_ended_range_parses() {
        assert_eq!(
            parse_range_start(&range_headers("bytes=31457280-")).unwrap(),
            Some(31_457_280)
        );
        assert_eq!(parse_range_start(&range_headers("bytes=0-")).unwrap(), Some(0));
    }

    #[test]
    fn bounded_and_malformed_ranges_rejected() {
        assert!(parse_range_start(&range_headers("bytes=0-499")).is_err());
        assert!(parse_range_start(&range_headers("items=5-")).is_err());
        assert!(parse_range_start(&range_headers("bytes=abc-")).is_err());
    }

    #[test]
    fn compression_skips_media_extensions() {
        assert!(should_compress("hints/h1.txt"));
        assert!(should_compress("settings.json"));
        assert!(should_compress("README"));
        assert!(!should_compress("audio/intro.MP3"));
        assert!(!should_compress("video/finale.mp4"));
        assert!(!should_compress("images/map.png"));
        assert!(!should_compress("bundle.zip"));
    }

    #[test]
    fn deflate_roundtrip() {
        let original = b"the combination is 4-7-1";
        let compressed = deflate(original).unwrap();

        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, original);
    }

    #[tokio::test]
    async fn file_entry_info_reports_size_and_flag() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("hint.txt"), b"12345").unwrap();
        let state = AppState::new(dir.path().to_path_buf());

        let entry = file_entry(&state, "hint.txt", true).await.unwrap();
        assert_eq!(entry.size, 5);
        assert!(entry.compressed);
        assert!(entry.data.is_none());
    }

    #[tokio::test]
    async fn file_entry_data_compressed_for_text() {
        let dir = tempfile::TempDir::new().unwrap();
        let content = b"repeat repeat repeat repeat repeat".to_vec();
        std::fs::write(dir.path().join("hint.txt"), &content).unwrap();
        let state = AppState::new(dir.path().to_path_buf());

        let entry = file_entry(&state, "hint.txt", false).await.unwrap();
        assert!(entry.compressed);

        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(entry.data.unwrap().as_slice())
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, content);
    }

    #[tokio::test]
    async fn file_entry_data_raw_for_media() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp3"), b"MP3BYTES").unwrap();
        let state = AppState::new(dir.path().to_path_buf());

        let entry = file_entry(&state, "a.mp3", false).await.unwrap();
        assert!(!entry.compressed);
        assert_eq!(entry.data.unwrap(), b"MP3BYTES");
    }

    #[tokio::test]
    async fn file_entry_rejects_traversal() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(dir.path().to_path_buf());
        assert!(file_entry(&state, "../etc/passwd", true).await.is_err());
    }

    #[tokio::test]
    async fn file_entry_missing_file_is_per_path_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let state = AppState::new(dir.path().to_path_buf());
        assert!(file_entry(&state, "ghost.txt", true).await.is_err());
    }
}
