//! Abstract blob store trait.
//!
//! Every storage backend must implement [`BlobStore`].  The trait works
//! in terms of streaming readers and sinks so callers never hold a whole
//! blob in memory; a request's resident bytes stay proportional to the
//! chunk size regardless of blob size.

use bytes::Bytes;
use std::future::Future;
use std::io;
use std::pin::Pin;
use thiserror::Error;
use tokio::io::AsyncRead;

/// Streaming handle for reading blob bytes.
pub type BlobReader = Box<dyn AsyncRead + Send + Unpin>;

/// Errors raised by blob store operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No blob exists at the given storage key.
    #[error("blob not found at storage key: {0}")]
    NotFound(String),

    /// The requested byte range does not fit the blob.
    #[error("invalid byte range {start}-{end} for blob of {size} bytes")]
    RangeInvalid { start: u64, end: u64, size: u64 },

    /// Underlying I/O failure.
    #[error("storage i/o: {0}")]
    Io(#[from] io::Error),

    /// Backend-specific failure (e.g. an S3 service error).
    #[error("storage backend: {0}")]
    Backend(String),
}

/// A streaming write in progress.
///
/// The sink writes to a sibling temp path (`<key>.tmp`); `commit`
/// publishes it atomically at the final key, `abort` discards it.
/// Dropping an uncommitted sink leaves the temp file behind for the
/// startup sweep to reclaim.
pub trait BlobSink: Send {
    /// Append a chunk to the in-flight blob.
    fn write(
        &mut self,
        chunk: Bytes,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>>;

    /// Flush, sync, and atomically publish the blob at its final key.
    fn commit(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send>>;

    /// Discard the in-flight blob.
    fn abort(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send>>;
}

/// Async blob storage contract.
pub trait BlobStore: Send + Sync + 'static {
    /// Open a streaming write for `key`.
    fn open_write(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<Box<dyn BlobSink>, StorageError>> + Send + '_>>;

    /// Open the full blob at `key` for reading.
    fn read(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<BlobReader, StorageError>> + Send + '_>>;

    /// Open bytes `[start, end]` (inclusive both ends) of the blob at `key`.
    fn read_range(
        &self,
        key: &str,
        start: u64,
        end: u64,
    ) -> Pin<Box<dyn Future<Output = Result<BlobReader, StorageError>> + Send + '_>>;

    /// Return the blob's size in bytes.
    fn stat(&self, key: &str)
        -> Pin<Box<dyn Future<Output = Result<u64, StorageError>> + Send + '_>>;

    /// Delete the blob at `key`.  Absence is not an error.
    fn delete(
        &self,
        key: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>>;

    /// Move a blob from `src` to `dst`.
    fn rename(
        &self,
        src: &str,
        dst: &str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StorageError>> + Send + '_>>;
}

/// Validate that `(start, end)` addresses bytes inside a blob of `size`.
pub fn check_range(start: u64, end: u64, size: u64) -> Result<(), StorageError> {
    if start > end || end >= size {
        return Err(StorageError::RangeInvalid { start, end, size });
    }
    Ok(())
}
