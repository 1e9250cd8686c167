//! Kiosk-side file transfer.
//!
//! Two delivery paths, selected by file size: small files travel inline as
//! base64 (optionally zlib-compressed) JSON payloads in batches; large
//! files stream to a `.temp` sidecar and resume from its current size via
//! a Range request. Downloads are deliberately serialized (worker pool of
//! one by default) so two kiosks in one batch cannot compete for the admin
//! machine's single uplink.

mod engine;
mod http;
mod large;
mod progress;
mod retry;
mod small;
mod source;

pub use engine::{TransferConfig, TransferEngine, TransferOutcome, TransferredFile};
pub use http::HttpFileSource;
pub use large::download_large;
pub use progress::{StallClock, ThroughputMeter};
pub use retry::RetryPolicy;
pub use small::write_small_file;
pub use source::{ByteStream, FileSource};

use sha2::{Digest, Sha256};

/// Computes SHA-256 of `data` and returns the hex-encoded digest.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server error {status}: {body}")]
    Server { status: u16, body: String },

    #[error("hash mismatch for {path}: expected {expected}, got {actual}")]
    HashMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("size mismatch for {path}: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        path: String,
        expected: i64,
        actual: i64,
    },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("no payload returned for {0}")]
    MissingPayload(String),

    #[error("decode error for {path}: {reason}")]
    Decode { path: String, reason: String },

    #[error("stream idle for {0:?}")]
    StreamIdle(std::time::Duration),
}
