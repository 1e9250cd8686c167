//! HTTP implementation of [`FileSource`] against the admin server.

use std::collections::HashMap;
use std::io::Read;
use std::time::Duration;

use futures_util::{StreamExt, TryStreamExt};
use reqwest::header::RANGE;
use tracing::warn;

use kiosksync_protocol::FILE_INFO_BATCH_SIZE;
use kiosksync_protocol::messages::{
    DownloadFileRequest, FileEntryPayload, RequestFilesRequest, RequestFilesResponse,
};

use crate::source::{ByteStream, FileSource};
use crate::TransferError;

/// Default timeout for JSON round-trips to the admin server.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connect timeout for the streaming client, which carries no total
/// timeout; large downloads are bounded by data-driven stall detection
/// instead.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Talks to the admin server's file-delivery endpoints.
pub struct HttpFileSource {
    json: reqwest::Client,
    stream: reqwest::Client,
    base_url: String,
    kiosk_id: String,
    batch_size: usize,
}

impl HttpFileSource {
    pub fn new(base_url: &str, kiosk_id: &str) -> Result<Self, TransferError> {
        let json = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let stream = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self {
            json,
            stream,
            base_url: base_url.trim_end_matches('/').to_string(),
            kiosk_id: kiosk_id.to_string(),
            batch_size: FILE_INFO_BATCH_SIZE,
        })
    }

    async fn request_files(
        &self,
        files: &[String],
        info_only: bool,
    ) -> Result<RequestFilesResponse, TransferError> {
        let req = RequestFilesRequest {
            kiosk_id: self.kiosk_id.clone(),
            files: files.to_vec(),
            info_only,
        };
        let resp = self
            .json
            .post(format!("{}/request_files", self.base_url))
            .json(&req)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransferError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }
}

impl FileSource for HttpFileSource {
    async fn file_infos(&self, paths: &[String]) -> Result<HashMap<String, i64>, TransferError> {
        let mut infos = HashMap::new();
        for batch in paths.chunks(self.batch_size) {
            let resp = self.request_files(batch, true).await?;
            for (path, entry) in resp.files {
                if entry.error.is_empty() {
                    infos.insert(path, entry.size);
                } else {
                    warn!(path = %path, error = %entry.error, "server cannot serve file");
                }
            }
        }
        Ok(infos)
    }

    async fn fetch_small(&self, paths: &[String]) -> Result<HashMap<String, Vec<u8>>, TransferError> {
        let mut contents = HashMap::new();
        for batch in paths.chunks(self.batch_size) {
            let resp = self.request_files(batch, false).await?;
            for (path, entry) in resp.files {
                if let Some(data) = decode_entry(&path, entry) {
                    contents.insert(path, data);
                }
            }
        }
        Ok(contents)
    }

    async fn open_stream(&self, path: &str, offset: u64) -> Result<ByteStream, TransferError> {
        let req = DownloadFileRequest {
            file_path: path.to_string(),
            kiosk_id: self.kiosk_id.clone(),
        };
        let mut builder = self
            .stream
            .post(format!("{}/download_file", self.base_url))
            .json(&req);
        if offset > 0 {
            builder = builder.header(RANGE, format!("bytes={offset}-"));
        }

        let resp = builder.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransferError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let stream = resp
            .bytes_stream()
            .map_err(TransferError::from)
            .map(|chunk| chunk.map(|b| b.to_vec()));
        Ok(Box::pin(stream))
    }
}

/// Decodes one inline entry, or returns `None` for anything unusable.
///
/// A bad entry never sinks the rest of the batch: the path just stays out
/// of the result map and the engine's per-file retry picks it up.
fn decode_entry(path: &str, entry: FileEntryPayload) -> Option<Vec<u8>> {
    if !entry.error.is_empty() {
        warn!(path = %path, error = %entry.error, "inline fetch failed server-side");
        return None;
    }
    let Some(data) = entry.data else {
        warn!(path = %path, "inline entry carried no payload");
        return None;
    };
    if !entry.compressed {
        return Some(data);
    }
    match inflate(path, &data) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!(path = %path, "discarding inline payload: {e}");
            None
        }
    }
}

/// Decompresses a zlib payload.
fn inflate(path: &str, data: &[u8]) -> Result<Vec<u8>, TransferError> {
    let mut out = Vec::new();
    flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| TransferError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
    Ok(out)
}
