//! Read operations: preview, listing, keycheck, and download tickets.

use serde::Serialize;
use utoipa::ToSchema;

use super::{DropEngine, DropSnapshot};
use crate::access::{evaluate, evaluate_mutation};
use crate::auth::Caller;
use crate::errors::DropError;
use crate::metadata::store::ListParams;

/// One page of drops plus paging metadata.
#[derive(Debug, Serialize, ToSchema)]
pub struct DropPage {
    pub contents: Vec<DropSnapshot>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
}

/// Everything the stream gateway needs to serve a blob, access-checked.
#[derive(Debug, Clone)]
pub struct DownloadTicket {
    pub file_name: String,
    pub media_type: String,
    pub size: u64,
    pub content_hash: String,
    pub storage_key: String,
}

impl DropEngine {
    /// Load a drop by slug and return its public projection.
    pub async fn preview(
        &self,
        caller: &Caller,
        slug: &str,
        passphrase: Option<&str>,
    ) -> Result<DropSnapshot, DropError> {
        let record = self.meta.get_by_slug(slug)?;
        evaluate(record.as_ref(), caller, passphrase, &self.hasher).into_result()?;
        // evaluate returned Allow, so the record exists.
        Ok(DropSnapshot::from(&record.unwrap()))
    }

    /// Owner-only listing with sort, order, page, and favorite filter.
    pub async fn list(&self, caller: &Caller, params: ListParams) -> Result<DropPage, DropError> {
        match caller {
            Caller::Owner => {}
            Caller::Other => return Err(DropError::Forbidden),
            Caller::Anonymous => return Err(DropError::AuthRequired),
        }

        let result = self.meta.list(&params)?;
        Ok(DropPage {
            contents: result.drops.iter().map(DropSnapshot::from).collect(),
            total: result.total,
            page: params.page,
            page_size: params.page_size,
        })
    }

    /// Whether a candidate slug is already taken (or reserved).
    ///
    /// Advisory only: the create transaction re-checks under the unique
    /// constraint.
    pub async fn slug_available(&self, candidate: &str) -> Result<bool, DropError> {
        if self.slugs.reserved.iter().any(|r| r == candidate) {
            return Ok(false);
        }
        Ok(!self.meta.slug_exists(candidate)?)
    }

    /// Access-check a download and hand back the blob coordinates.
    pub async fn open_download(
        &self,
        caller: &Caller,
        slug: &str,
        passphrase: Option<&str>,
    ) -> Result<DownloadTicket, DropError> {
        let record = self.meta.get_by_slug(slug)?;
        evaluate(record.as_ref(), caller, passphrase, &self.hasher).into_result()?;
        let record = record.unwrap();
        Ok(DownloadTicket {
            file_name: record.file.name,
            media_type: record.file.media_type,
            size: record.file.size,
            content_hash: record.file.content_hash,
            storage_key: record.file.storage_key,
        })
    }

    /// Shared owner-only gate for the mutation ops.
    pub(crate) fn require_owner(&self, caller: &Caller, slug: &str) -> Result<(), DropError> {
        let exists = self.meta.slug_exists(slug)?;
        evaluate_mutation(exists, caller).into_result()
    }
}
