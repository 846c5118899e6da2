//! Drop deletion.
//!
//! The metadata transaction commits first; the blob delete runs after.
//! A crash in between leaves an orphan blob (invisible, bounded), never
//! a live row pointing at missing bytes.

use tracing::info;

use super::DropEngine;
use crate::auth::Caller;
use crate::errors::DropError;
use crate::metadata::store::MetaError;

impl DropEngine {
    /// Delete a drop, its file row, and its blob.
    ///
    /// Repeating the call returns `NotFound`; the slug becomes free for
    /// reuse as soon as the transaction commits.
    pub async fn delete(&self, caller: &Caller, slug: &str) -> Result<(), DropError> {
        self.require_owner(caller, slug)?;

        let storage_key = match self.meta.delete_by_slug(slug) {
            Ok(key) => key,
            // Lost a race with a concurrent delete.
            Err(MetaError::NotFound) => return Err(DropError::NotFound),
            Err(e) => return Err(e.into()),
        };

        self.discard_blob(&storage_key).await;
        info!(slug, "drop deleted");
        Ok(())
    }
}
