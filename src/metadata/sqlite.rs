//! SQLite-backed metadata store.
//!
//! Uses `rusqlite` with the `bundled` feature so no system SQLite
//! library is required.  All methods are synchronous rusqlite calls
//! executed under a `Mutex`; callers hold the lock only for the duration
//! of one transaction, never across blob I/O.

use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use super::store::{
    format_ts, parse_ts, DropRecord, FileRecord, ListParams, ListResult, MetaError, SortKey,
    SortOrder,
};
use chrono::{DateTime, Utc};

/// Current schema version. Bumped when migrations are added.
const SCHEMA_VERSION: i64 = 1;

/// Joined column list shared by every drop query.
const DROP_COLUMNS: &str = "
    d.id, d.slug, d.title, d.description, d.passphrase_hash,
    d.private, d.favorite, d.owner_id, d.created_at, d.updated_at,
    f.id, f.name, f.media_type, f.size, f.content_hash, f.storage_key, f.created_at";

/// Metadata store backed by a single SQLite database file.
pub struct SqliteStore {
    /// The database connection, guarded by a mutex for Send + Sync.
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and initialize the schema.
    ///
    /// Passing `":memory:"` creates an in-memory database (useful for tests).
    pub fn new(path: &str) -> Result<Self, MetaError> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.apply_pragmas()?;
        store.init_db()?;
        Ok(store)
    }

    /// Apply recommended SQLite pragmas for performance and safety.
    fn apply_pragmas(&self) -> Result<(), MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;
        Ok(())
    }

    /// Create the required tables and indexes if they do not already exist.
    /// Idempotent -- safe to call on every startup.
    fn init_db(&self) -> Result<(), MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        conn.execute_batch(
            "
            -- Schema version tracking
            CREATE TABLE IF NOT EXISTS schema_version (
                version    INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );

            -- Drops
            CREATE TABLE IF NOT EXISTS drops (
                id              TEXT PRIMARY KEY,
                slug            TEXT NOT NULL UNIQUE,
                title           TEXT,
                description     TEXT,
                passphrase_hash TEXT,
                private         INTEGER NOT NULL DEFAULT 0,
                favorite        INTEGER NOT NULL DEFAULT 0,
                owner_id        TEXT NOT NULL,
                created_at      TEXT NOT NULL,
                updated_at      TEXT NOT NULL
            );

            -- Files (exactly one per drop)
            CREATE TABLE IF NOT EXISTS files (
                id           TEXT PRIMARY KEY,
                drop_id      TEXT NOT NULL UNIQUE REFERENCES drops(id) ON DELETE CASCADE,
                name         TEXT NOT NULL,
                media_type   TEXT NOT NULL DEFAULT 'application/octet-stream',
                size         INTEGER NOT NULL,
                content_hash TEXT NOT NULL,
                storage_key  TEXT NOT NULL,
                created_at   TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_drops_created_at
                ON drops(created_at);
            ",
        )?;

        // Record schema version if not already present.
        let existing: Option<i64> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| {
                row.get(0)
            })
            .optional()?
            .flatten();

        if existing.is_none() || existing.unwrap() < SCHEMA_VERSION {
            let now = format_ts(super::store::now_utc());
            conn.execute(
                "INSERT OR REPLACE INTO schema_version (version, applied_at) VALUES (?1, ?2)",
                params![SCHEMA_VERSION, now],
            )?;
        }

        Ok(())
    }

    /// Insert a drop and its file in one transaction.
    ///
    /// A unique violation on `drops.slug` maps to [`MetaError::SlugConflict`];
    /// concurrent creates racing on the same slug get exactly one winner.
    pub fn insert_drop_with_file(&self, record: &DropRecord) -> Result<(), MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let tx = conn.unchecked_transaction()?;

        let insert = tx.execute(
            "INSERT INTO drops (id, slug, title, description, passphrase_hash,
                                private, favorite, owner_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id.to_string(),
                record.slug,
                record.title,
                record.description,
                record.passphrase_hash,
                record.private as i64,
                record.favorite as i64,
                record.owner_id,
                format_ts(record.created_at),
                format_ts(record.updated_at),
            ],
        );
        if let Err(e) = insert {
            return Err(map_slug_conflict(e, &record.slug));
        }

        tx.execute(
            "INSERT INTO files (id, drop_id, name, media_type, size,
                                content_hash, storage_key, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.file.id.to_string(),
                record.id.to_string(),
                record.file.name,
                record.file.media_type,
                record.file.size as i64,
                record.file.content_hash,
                record.file.storage_key,
                format_ts(record.file.created_at),
            ],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Look up a drop by slug, file eager-loaded.
    pub fn get_by_slug(&self, slug: &str) -> Result<Option<DropRecord>, MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let sql = format!(
            "SELECT {DROP_COLUMNS} FROM drops d JOIN files f ON f.drop_id = d.id
             WHERE d.slug = ?1"
        );
        let record = conn
            .query_row(&sql, params![slug], map_drop_row)
            .optional()?;
        Ok(record)
    }

    /// Whether any live drop uses `slug`.
    pub fn slug_exists(&self, slug: &str) -> Result<bool, MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM drops WHERE slug = ?1",
            params![slug],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// List drops with sorting, pagination, and the favorite filter.
    ///
    /// Title sort falls back to the file name for untitled drops.
    pub fn list(&self, p: &ListParams) -> Result<ListResult, MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");

        let order_column = match p.sort {
            SortKey::CreatedAt => "d.created_at",
            SortKey::Title => "COALESCE(d.title, f.name) COLLATE NOCASE",
            SortKey::Size => "f.size",
        };
        let direction = match p.order {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        let filter = match p.favorite {
            Some(_) => "WHERE d.favorite = ?1",
            None => "",
        };

        let page_size = p.page_size.max(1);
        let offset = (p.page.max(1) - 1) as i64 * page_size as i64;

        let sql = format!(
            "SELECT {DROP_COLUMNS} FROM drops d JOIN files f ON f.drop_id = d.id
             {filter}
             ORDER BY {order_column} {direction}, d.id {direction}
             LIMIT {page_size} OFFSET {offset}"
        );
        let count_sql =
            format!("SELECT COUNT(*) FROM drops d JOIN files f ON f.drop_id = d.id {filter}");

        let (drops, total) = match p.favorite {
            Some(fav) => {
                let mut stmt = conn.prepare(&sql)?;
                let drops = stmt
                    .query_map(params![fav as i64], map_drop_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                let total: i64 =
                    conn.query_row(&count_sql, params![fav as i64], |row| row.get(0))?;
                (drops, total)
            }
            None => {
                let mut stmt = conn.prepare(&sql)?;
                let drops = stmt
                    .query_map([], map_drop_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                let total: i64 = conn.query_row(&count_sql, [], |row| row.get(0))?;
                (drops, total)
            }
        };

        Ok(ListResult {
            drops,
            total: total as u64,
        })
    }

    /// Partial update of `{title, description}`; touches `updated_at`.
    ///
    /// Outer `None` leaves a field unchanged; inner `None` clears it.
    pub fn update_detail(
        &self,
        slug: &str,
        title: Option<Option<String>>,
        description: Option<Option<String>>,
        now: DateTime<Utc>,
    ) -> Result<DropRecord, MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let tx = conn.unchecked_transaction()?;

        let current = Self::require_by_slug(&tx, slug)?;
        let new_title = title.unwrap_or(current.title);
        let new_description = description.unwrap_or(current.description);

        tx.execute(
            "UPDATE drops SET title = ?1, description = ?2, updated_at = ?3 WHERE slug = ?4",
            params![new_title, new_description, format_ts(now), slug],
        )?;

        let updated = Self::require_by_slug(&tx, slug)?;
        tx.commit()?;
        Ok(updated)
    }

    /// Set the `private` flag; touches `updated_at`.
    pub fn set_private(
        &self,
        slug: &str,
        private: bool,
        now: DateTime<Utc>,
    ) -> Result<DropRecord, MetaError> {
        self.update_row(
            slug,
            "UPDATE drops SET private = ?1, updated_at = ?2 WHERE slug = ?3",
            params![private as i64, format_ts(now), slug],
        )
    }

    /// Set the `favorite` flag.  Does NOT touch `updated_at`: favorite is
    /// a UI marker, not a content change.
    pub fn set_favorite(&self, slug: &str, favorite: bool) -> Result<DropRecord, MetaError> {
        self.update_row(
            slug,
            "UPDATE drops SET favorite = ?1 WHERE slug = ?2",
            params![favorite as i64, slug],
        )
    }

    /// Replace or clear the passphrase verifier; touches `updated_at`.
    pub fn set_passphrase_hash(
        &self,
        slug: &str,
        hash: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<DropRecord, MetaError> {
        self.update_row(
            slug,
            "UPDATE drops SET passphrase_hash = ?1, updated_at = ?2 WHERE slug = ?3",
            params![hash, format_ts(now), slug],
        )
    }

    /// Delete a drop and its file row in one transaction.
    ///
    /// Returns the file's storage key so the caller can remove the blob
    /// after the commit.
    pub fn delete_by_slug(&self, slug: &str) -> Result<String, MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let tx = conn.unchecked_transaction()?;

        let record = Self::require_by_slug(&tx, slug)?;
        let storage_key = record.file.storage_key.clone();

        tx.execute(
            "DELETE FROM files WHERE drop_id = ?1",
            params![record.id.to_string()],
        )?;
        tx.execute(
            "DELETE FROM drops WHERE id = ?1",
            params![record.id.to_string()],
        )?;

        tx.commit()?;
        Ok(storage_key)
    }

    // -- Internals ----------------------------------------------------------

    fn update_row(
        &self,
        slug: &str,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<DropRecord, MetaError> {
        let conn = self.conn.lock().expect("mutex poisoned");
        let tx = conn.unchecked_transaction()?;

        let changed = tx.execute(sql, args)?;
        if changed == 0 {
            return Err(MetaError::NotFound);
        }
        let updated = Self::require_by_slug(&tx, slug)?;
        tx.commit()?;
        Ok(updated)
    }

    fn require_by_slug(conn: &Connection, slug: &str) -> Result<DropRecord, MetaError> {
        let sql = format!(
            "SELECT {DROP_COLUMNS} FROM drops d JOIN files f ON f.drop_id = d.id
             WHERE d.slug = ?1"
        );
        conn.query_row(&sql, params![slug], map_drop_row)
            .optional()?
            .ok_or(MetaError::NotFound)
    }
}

/// Map an insert error to `SlugConflict` when the slug unique index fired.
fn map_slug_conflict(err: rusqlite::Error, slug: &str) -> MetaError {
    if let rusqlite::Error::SqliteFailure(e, Some(ref msg)) = err {
        if e.code == rusqlite::ErrorCode::ConstraintViolation && msg.contains("drops.slug") {
            return MetaError::SlugConflict(slug.to_string());
        }
    }
    MetaError::Db(err)
}

/// Map one joined row (see [`DROP_COLUMNS`]) to a [`DropRecord`].
fn map_drop_row(row: &Row<'_>) -> rusqlite::Result<DropRecord> {
    Ok(DropRecord {
        id: parse_uuid(row.get::<_, String>(0)?)?,
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        passphrase_hash: row.get(4)?,
        private: row.get::<_, i64>(5)? != 0,
        favorite: row.get::<_, i64>(6)? != 0,
        owner_id: row.get(7)?,
        created_at: parse_ts(&row.get::<_, String>(8)?)?,
        updated_at: parse_ts(&row.get::<_, String>(9)?)?,
        file: FileRecord {
            id: parse_uuid(row.get::<_, String>(10)?)?,
            name: row.get(11)?,
            media_type: row.get(12)?,
            size: row.get::<_, i64>(13)? as u64,
            content_hash: row.get(14)?,
            storage_key: row.get(15)?,
            created_at: parse_ts(&row.get::<_, String>(16)?)?,
        },
    })
}

fn parse_uuid(s: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

// ── Tests ───────────────────────────────────────────────────────────
