//! Drop creation.
//!
//! The payload is staged into a committed blob first (see
//! [`super::upload`]); this module validates the metadata, resolves the
//! slug, and inserts the drop and file rows in one transaction.  Any
//! failure after staging triggers a compensating blob delete, so a
//! rejected create never leaves bytes in storage.

use tracing::info;
use uuid::Uuid;

use super::upload::StagedFile;
use super::{
    sanitize_filename, validate_description, validate_media_type, validate_passphrase,
    validate_title, DropEngine, DropSnapshot,
};
use crate::errors::DropError;
use crate::metadata::store::{now_utc, DropRecord, FileRecord, MetaError};
use crate::slug;

/// Auto-generated slug attempts before giving up.
const SLUG_RETRIES: usize = 8;

/// Validated inputs for a create, minus the payload.
#[derive(Debug, Clone, Default)]
pub struct CreateDrop {
    pub slug: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    /// Clear-text passphrase; hashed before anything is stored.
    pub passphrase: Option<String>,
    pub private: bool,
    pub favorite: bool,
    /// Resolved creator identity or the anonymous sentinel.
    pub owner_id: String,
}

/// Descriptive metadata of the uploaded payload.
#[derive(Debug, Clone)]
pub struct UploadMeta {
    /// Filename as sent by the uploader (sanitized before storage).
    pub filename: String,
    /// Declared MIME type, if any.
    pub media_type: Option<String>,
    /// Byte length declared by the client, if it sent one.
    pub declared_size: Option<u64>,
}

impl DropEngine {
    /// Check the create preconditions that need no I/O.
    ///
    /// The HTTP layer calls this before streaming the payload so obvious
    /// garbage is rejected cheaply; [`DropEngine::create`] re-checks
    /// under the compensation umbrella because multipart field order is
    /// the client's choice.
    pub fn validate_create(&self, input: &CreateDrop) -> Result<(), DropError> {
        if let Some(ref s) = input.slug {
            slug::validate(s, &self.slugs.reserved)
                .map_err(|reason| DropError::SlugInvalid { reason })?;
        }
        if let Some(ref title) = input.title {
            validate_title(title)?;
        }
        if let Some(ref description) = input.description {
            validate_description(description)?;
        }
        if let Some(ref passphrase) = input.passphrase {
            validate_passphrase(passphrase)?;
        }
        Ok(())
    }

    /// Finish a create: validate, resolve the slug, insert drop + file.
    ///
    /// `staged` must be a committed blob from [`DropEngine::begin_upload`];
    /// on any failure it is deleted before the error propagates.
    pub async fn create(
        &self,
        input: CreateDrop,
        meta: UploadMeta,
        staged: StagedFile,
    ) -> Result<DropSnapshot, DropError> {
        match self.try_create(&input, &meta, &staged) {
            Ok(snapshot) => Ok(snapshot),
            Err(e) => {
                self.discard_blob(&staged.storage_key).await;
                Err(e)
            }
        }
    }

    fn try_create(
        &self,
        input: &CreateDrop,
        meta: &UploadMeta,
        staged: &StagedFile,
    ) -> Result<DropSnapshot, DropError> {
        self.validate_create(input)?;
        if let Some(ref media_type) = meta.media_type {
            validate_media_type(media_type)?;
        }

        if let Some(declared) = meta.declared_size {
            if declared != staged.size {
                return Err(DropError::validation(format!(
                    "declared size ({declared} bytes) does not match received size ({} bytes)",
                    staged.size
                )));
            }
        }

        let media_type = match meta.media_type.as_deref() {
            Some(mt) if !mt.is_empty() => mt.to_string(),
            _ => "application/octet-stream".to_string(),
        };

        let passphrase_hash = input
            .passphrase
            .as_deref()
            .map(|p| self.hasher.hash(p))
            .transpose()?;

        let now = now_utc();
        let mut record = DropRecord {
            id: Uuid::new_v4(),
            slug: String::new(),
            title: input.title.clone().filter(|t| !t.is_empty()),
            description: input.description.clone().filter(|d| !d.is_empty()),
            passphrase_hash,
            private: input.private,
            favorite: input.favorite,
            owner_id: input.owner_id.clone(),
            created_at: now,
            updated_at: now,
            file: FileRecord {
                id: staged.file_id,
                name: sanitize_filename(&meta.filename),
                media_type,
                size: staged.size,
                content_hash: staged.content_hash.clone(),
                storage_key: staged.storage_key.clone(),
                created_at: now,
            },
        };

        match input.slug {
            // User-supplied slug: one shot, conflicts surface as SlugTaken.
            Some(ref wanted) => {
                record.slug = wanted.clone();
                self.meta.insert_drop_with_file(&record)?;
            }
            // Auto-generated slug: retry on conflict.
            None => {
                let mut attempts = 0;
                loop {
                    attempts += 1;
                    record.slug = slug::generate(&self.slugs.alphabet, self.slugs.length);
                    match self.meta.insert_drop_with_file(&record) {
                        Ok(()) => break,
                        Err(MetaError::SlugConflict(_)) if attempts < SLUG_RETRIES => continue,
                        Err(MetaError::SlugConflict(_)) => return Err(DropError::SlugExhausted),
                        Err(e) => return Err(e.into()),
                    }
                }
            }
        }

        info!(
            slug = %record.slug,
            size = record.file.size,
            owner = %record.owner_id,
            "drop created"
        );
        Ok(DropSnapshot::from(&record))
    }
}
