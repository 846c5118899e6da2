//! Drop lifecycle coordinator.
//!
//! [`DropEngine`] implements every drop operation as a two-phase
//! sequence over the metadata store and the blob store, with
//! compensation on failure.  Handlers own HTTP concerns; the engine owns
//! validation, access decisions, slug allocation, and the DB/storage
//! consistency protocol.
//!
//! Consistency protocol, in short: uploads stream into a committed blob
//! first and insert metadata second (failure ⇒ compensating blob
//! delete); deletes commit the metadata removal first and delete the
//! blob second (failure ⇒ orphan blob, which is invisible and bounded).
//! Either order of crash leaves the database authoritative.

mod create;
mod delete;
mod mutate;
mod read;
mod upload;

pub use create::{CreateDrop, UploadMeta};
pub use mutate::DetailPatch;
pub use read::{DownloadTicket, DropPage};
pub use upload::{StagedFile, UploadSink};

use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

use crate::config::{LimitsConfig, SlugConfig};
use crate::errors::DropError;
use crate::metadata::sqlite::SqliteStore;
use crate::metadata::store::{format_ts, DropRecord};
use crate::passphrase::PassphraseHasher;
use crate::storage::backend::BlobStore;

/// Maximum title length in characters.
pub const MAX_TITLE_LENGTH: usize = 200;
/// Maximum description length in characters.
pub const MAX_DESCRIPTION_LENGTH: usize = 4096;
/// Maximum passphrase length in bytes.
pub const MAX_PASSPHRASE_LENGTH: usize = 1024;

/// Coordinates drop operations across the metadata and blob stores.
///
/// All collaborators are injected; the engine keeps no process-wide
/// state of its own.
pub struct DropEngine {
    meta: Arc<SqliteStore>,
    blobs: Arc<dyn BlobStore>,
    hasher: Arc<PassphraseHasher>,
    limits: LimitsConfig,
    slugs: SlugConfig,
}

impl DropEngine {
    pub fn new(
        meta: Arc<SqliteStore>,
        blobs: Arc<dyn BlobStore>,
        hasher: Arc<PassphraseHasher>,
        limits: LimitsConfig,
        slugs: SlugConfig,
    ) -> Self {
        Self {
            meta,
            blobs,
            hasher,
            limits,
            slugs,
        }
    }

    /// Chunk size for streaming reads and writes.
    pub fn chunk_size(&self) -> usize {
        self.limits.chunk_size
    }

    /// Optional per-upload deadline.
    pub fn operation_deadline(&self) -> Option<std::time::Duration> {
        (self.limits.operation_deadline > 0)
            .then(|| std::time::Duration::from_secs(self.limits.operation_deadline))
    }

    /// Best-effort blob removal after a failed or undone operation.
    ///
    /// The metadata store is already correct at this point; a failure
    /// here only leaves an unreferenced blob behind.
    pub(crate) async fn discard_blob(&self, storage_key: &str) {
        if let Err(e) = self.blobs.delete(storage_key).await {
            tracing::warn!(
                storage_key,
                error = %e,
                "compensating blob delete failed; blob is orphaned"
            );
        }
    }
}

/// Public projection of a drop.
///
/// Never carries the passphrase verifier or the raw storage key.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DropSnapshot {
    pub slug: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub private: bool,
    pub favorite: bool,
    pub has_passphrase: bool,
    pub created_at: String,
    pub updated_at: String,
    pub file_name: String,
    pub file_size: u64,
    pub file_type: String,
    pub content_hash: String,
}

impl From<&DropRecord> for DropSnapshot {
    fn from(record: &DropRecord) -> Self {
        DropSnapshot {
            slug: record.slug.clone(),
            title: record.title.clone(),
            description: record.description.clone(),
            private: record.private,
            favorite: record.favorite,
            has_passphrase: record.has_passphrase(),
            created_at: format_ts(record.created_at),
            updated_at: format_ts(record.updated_at),
            file_name: record.file.name.clone(),
            file_size: record.file.size,
            file_type: record.file.media_type.clone(),
            content_hash: record.file.content_hash.clone(),
        }
    }
}

// -- Input validation ---------------------------------------------------------

pub(crate) fn validate_title(title: &str) -> Result<(), DropError> {
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(DropError::validation(format!(
            "title exceeds maximum length ({MAX_TITLE_LENGTH})"
        )));
    }
    Ok(())
}

pub(crate) fn validate_description(description: &str) -> Result<(), DropError> {
    if description.chars().count() > MAX_DESCRIPTION_LENGTH {
        return Err(DropError::validation(format!(
            "description exceeds maximum length ({MAX_DESCRIPTION_LENGTH})"
        )));
    }
    Ok(())
}

pub(crate) fn validate_passphrase(passphrase: &str) -> Result<(), DropError> {
    if passphrase.is_empty() || passphrase.len() > MAX_PASSPHRASE_LENGTH {
        return Err(DropError::validation(format!(
            "passphrase must be 1-{MAX_PASSPHRASE_LENGTH} bytes"
        )));
    }
    Ok(())
}

/// Check a declared media type matches `type/subtype`.  Empty is allowed
/// and falls back to `application/octet-stream` later.
pub(crate) fn validate_media_type(media_type: &str) -> Result<(), DropError> {
    if media_type.is_empty() {
        return Ok(());
    }
    let valid = match media_type.split_once('/') {
        Some((kind, subtype)) => is_mime_token(kind) && is_mime_token(subtype),
        None => false,
    };
    if !valid {
        return Err(DropError::validation(format!(
            "invalid media type: {media_type:?}"
        )));
    }
    Ok(())
}

fn is_mime_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars().all(|c| {
            c.is_ascii_alphanumeric()
                || matches!(
                    c,
                    '!' | '#' | '$' | '&' | '-' | '^' | '_' | '.' | '+' | '*'
                )
        })
}

/// Reduce an uploader-supplied filename to a safe display name.
///
/// Keeps only the final path component and strips control characters;
/// the result is used for Content-Disposition only, never as a path.
pub(crate) fn sanitize_filename(name: &str) -> String {
    let last = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);
    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::config::Argon2Config;
    use crate::storage::local::LocalBlobStore;

    /// Engine over a tempdir blob store and an in-memory metadata store.
    pub fn test_engine(max_upload_size: u64) -> (tempfile::TempDir, DropEngine) {
        let dir = tempfile::tempdir().unwrap();
        let meta = Arc::new(SqliteStore::new(":memory:").unwrap());
        let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(dir.path()).unwrap());
        let hasher = Arc::new(
            PassphraseHasher::new(&Argon2Config {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            })
            .unwrap(),
        );
        let engine = DropEngine::new(
            meta,
            blobs,
            hasher,
            LimitsConfig {
                max_upload_size,
                chunk_size: 1024,
                operation_deadline: 0,
            },
            SlugConfig {
                reserved: vec!["api".to_string(), "keycheck".to_string()],
                ..Default::default()
            },
        );
        (dir, engine)
    }

    /// Count regular files under a directory (for orphan-blob checks).
    pub fn count_files(dir: &std::path::Path) -> usize {
        let mut count = 0;
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            for entry in std::fs::read_dir(&current).unwrap() {
                let entry = entry.unwrap();
                if entry.file_type().unwrap().is_dir() {
                    stack.push(entry.path());
                } else {
                    count += 1;
                }
            }
        }
        count
    }
}
