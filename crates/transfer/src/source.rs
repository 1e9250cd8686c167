use std::collections::HashMap;
use std::pin::Pin;

use futures_util::Stream;

use crate::TransferError;

/// Stream of raw byte chunks from the server.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, TransferError>> + Send>>;

/// Server seam for the transfer engine.
///
/// The production implementation ([`HttpFileSource`](crate::HttpFileSource))
/// speaks HTTP/JSON to the admin server; tests substitute in-memory sources.
/// Compression and base64 are wire details hidden behind this trait:
/// `fetch_small` always returns fully decoded file bytes.
pub trait FileSource: Send + Sync {
    /// Returns the size in bytes for each requested path. Paths the server
    /// cannot serve are absent from the result.
    fn file_infos(
        &self,
        paths: &[String],
    ) -> impl Future<Output = Result<HashMap<String, i64>, TransferError>> + Send;

    /// Fetches small-file contents inline, fully decoded. Paths the server
    /// failed on are absent from the result.
    fn fetch_small(
        &self,
        paths: &[String],
    ) -> impl Future<Output = Result<HashMap<String, Vec<u8>>, TransferError>> + Send;

    /// Opens a byte stream for `path` starting at `offset` (0 = whole file).
    fn open_stream(
        &self,
        path: &str,
        offset: u64,
    ) -> impl Future<Output = Result<ByteStream, TransferError>> + Send;
}
