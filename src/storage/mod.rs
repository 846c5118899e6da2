//! Blob storage: contract, backends, and the startup sweep.

pub mod backend;
pub mod local;
pub mod s3;
pub mod sweep;

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Derive the storage key for a file id.
///
/// The key is `hh/hh/rest` over `hex(sha256(file_id))`: a two-level
/// fan-out that caps per-directory entries.  The key is not derivable
/// from the drop slug.
pub fn derive_storage_key(file_id: Uuid) -> String {
    let digest = hex::encode(Sha256::digest(file_id.as_bytes()));
    format!("{}/{}/{}", &digest[0..2], &digest[2..4], &digest[4..])
}
