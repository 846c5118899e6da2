//! Upload staging.
//!
//! An [`UploadSink`] funnels payload chunks into a blob-store sink while
//! hashing and counting them, enforcing the size cap as bytes arrive.
//! Committing yields a [`StagedFile`]; the metadata insert happens
//! afterwards, with the staged blob deleted if that insert fails.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use super::DropEngine;
use crate::errors::DropError;
use crate::storage::backend::BlobSink;
use crate::storage::derive_storage_key;

/// A blob that has been fully streamed and committed to storage.
#[derive(Debug, Clone)]
pub struct StagedFile {
    /// Allocated file id (the storage key derives from it).
    pub file_id: Uuid,
    /// Storage key of the committed blob.
    pub storage_key: String,
    /// Exact byte count observed while streaming.
    pub size: u64,
    /// SHA-256 of the streamed bytes, lowercase hex.
    pub content_hash: String,
}

/// In-flight upload: blob sink + running hash + byte counter + cap.
pub struct UploadSink {
    sink: Box<dyn BlobSink>,
    hasher: Sha256,
    received: u64,
    max_size: u64,
    file_id: Uuid,
    storage_key: String,
}

impl DropEngine {
    /// Allocate a file id and open a streaming blob write for it.
    pub async fn begin_upload(&self) -> Result<UploadSink, DropError> {
        let file_id = Uuid::new_v4();
        let storage_key = derive_storage_key(file_id);
        let sink = self
            .blobs
            .open_write(&storage_key)
            .await
            .map_err(DropError::Storage)?;
        Ok(UploadSink {
            sink,
            hasher: Sha256::new(),
            received: 0,
            max_size: self.limits.max_upload_size,
            file_id,
            storage_key,
        })
    }
}

impl UploadSink {
    /// Feed one payload chunk through the hash, the counter, and the sink.
    ///
    /// On error the sink is no longer usable; the caller must invoke
    /// [`UploadSink::abort`].
    pub async fn push(&mut self, chunk: Bytes) -> Result<(), DropError> {
        self.received += chunk.len() as u64;
        if self.max_size > 0 && self.received > self.max_size {
            return Err(DropError::SizeLimitExceeded {
                limit: self.max_size,
            });
        }
        self.hasher.update(&chunk);
        self.sink.write(chunk).await.map_err(DropError::Storage)?;
        Ok(())
    }

    /// Bytes received so far.
    pub fn received(&self) -> u64 {
        self.received
    }

    /// Commit the blob and return its identity.
    pub async fn finish(self) -> Result<StagedFile, DropError> {
        self.sink.commit().await.map_err(DropError::Storage)?;
        Ok(StagedFile {
            file_id: self.file_id,
            storage_key: self.storage_key,
            size: self.received,
            content_hash: hex::encode(self.hasher.finalize()),
        })
    }

    /// Discard the in-flight blob.  Failures are logged, not surfaced:
    /// the leftover temp file is the startup sweep's problem.
    pub async fn abort(self) {
        if let Err(e) = self.sink.abort().await {
            tracing::warn!(
                storage_key = %self.storage_key,
                error = %e,
                "failed to discard in-flight upload"
            );
        }
    }
}
