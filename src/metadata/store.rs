//! Metadata record types shared by the store and the engine.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Sentinel `owner_id` for drops created without credentials.
pub const ANONYMOUS_OWNER: &str = "anonymous";

/// Errors raised by the metadata store.
#[derive(Debug, Error)]
pub enum MetaError {
    /// The unique-slug insert was rejected.
    #[error("slug already exists: {0}")]
    SlugConflict(String),

    /// No drop with the given slug.
    #[error("drop not found")]
    NotFound,

    /// Underlying database failure.
    #[error(transparent)]
    Db(#[from] rusqlite::Error),
}

/// Metadata record for a drop.  Always carries its file (1:1).
#[derive(Debug, Clone)]
pub struct DropRecord {
    /// Stable identifier, assigned at creation.
    pub id: Uuid,
    /// Short URL-safe identifier, unique among live drops.
    pub slug: String,
    /// Optional display title.
    pub title: Option<String>,
    /// Optional free-form description (may be multi-line).
    pub description: Option<String>,
    /// Argon2 verifier string; present iff the drop is passphrase-protected.
    pub passphrase_hash: Option<String>,
    /// Only the owner may read when true.
    pub private: bool,
    /// UI flag with no access-control effect.
    pub favorite: bool,
    /// Identity that created the drop, or [`ANONYMOUS_OWNER`].
    pub owner_id: String,
    /// UTC creation timestamp (second resolution).
    pub created_at: DateTime<Utc>,
    /// UTC timestamp of the last content mutation.
    pub updated_at: DateTime<Utc>,
    /// The single associated file.
    pub file: FileRecord,
}

impl DropRecord {
    /// Whether a passphrase verifier is set.
    pub fn has_passphrase(&self) -> bool {
        self.passphrase_hash.is_some()
    }
}

/// Metadata record for the stored bytes of a drop.
#[derive(Debug, Clone)]
pub struct FileRecord {
    /// Internal identifier; the storage key is derived from it.
    pub id: Uuid,
    /// Original filename as supplied by the uploader.  Used only for the
    /// Content-Disposition filename, never as a path.
    pub name: String,
    /// MIME type (`application/octet-stream` when the uploader gave none).
    pub media_type: String,
    /// Exact byte length of the stored blob.
    pub size: u64,
    /// SHA-256 of the blob, lowercase hex.
    pub content_hash: String,
    /// Opaque key handed to the blob store.
    pub storage_key: String,
    /// UTC creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Sort key for drop listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    CreatedAt,
    Title,
    Size,
}

impl SortKey {
    /// Parse the query-string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "created_at" => Some(SortKey::CreatedAt),
            "title" => Some(SortKey::Title),
            "size" => Some(SortKey::Size),
            _ => None,
        }
    }
}

/// Sort direction for drop listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    /// Parse the query-string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" => Some(SortOrder::Asc),
            "desc" => Some(SortOrder::Desc),
            _ => None,
        }
    }
}

/// Parameters for a drop listing.
#[derive(Debug, Clone)]
pub struct ListParams {
    pub sort: SortKey,
    pub order: SortOrder,
    /// 1-based page number.
    pub page: u32,
    pub page_size: u32,
    /// Restrict to favorites (or non-favorites) when set.
    pub favorite: Option<bool>,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            sort: SortKey::default(),
            order: SortOrder::default(),
            page: 1,
            page_size: 10,
            favorite: None,
        }
    }
}

/// One page of drops plus the unpaged total.
#[derive(Debug)]
pub struct ListResult {
    pub drops: Vec<DropRecord>,
    pub total: u64,
}

// -- Timestamp helpers --------------------------------------------------------

/// Current UTC time truncated to whole seconds.
pub fn now_utc() -> DateTime<Utc> {
    let now = Utc::now();
    Utc.timestamp_opt(now.timestamp(), 0).single().unwrap_or(now)
}

/// Format a timestamp the way the store persists it (RFC 3339, seconds).
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a persisted timestamp.
pub fn parse_ts(s: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                0,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}
