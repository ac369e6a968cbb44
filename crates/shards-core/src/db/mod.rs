//! Direct SQLite access to the shard store.
//!
//! All query functions take a `&Connection`. A `rusqlite::Transaction`
//! dereferences to `Connection`, so the same functions run unchanged inside
//! a caller-managed transaction.
//!
//! Database location priority:
//! 1. SHARDS_DATABASE_PATH env var
//! 2. Walk up directory tree looking for shards.db
//! 3. ~/.shards/shards.db

use crate::error::{Error, Result};
use crate::types::{NewShard, Shard, ShardLink, ShardStatus, ShardType};
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Shard schema SQL (001)
pub const SHARDS_SQL: &str = include_str!("migrations/001_shards.sql");

/// Default database file name
pub const DATABASE_FILE: &str = "shards.db";

const SHARD_COLUMNS: &str = "id, project, shard_type, title, content, content_hash, status,
     parent_id, metadata_json, created_at, updated_at";

// ─────────────────────────────────────────────────────────────────────────────
// Connection Setup
// ─────────────────────────────────────────────────────────────────────────────

/// Open a database file and apply the schema
pub fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    // WAL lets readers proceed while a writer holds the lock
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
    configure(&conn)?;
    tracing::debug!(path = %path.display(), "Opened shard database");
    Ok(conn)
}

/// Open a private in-memory database with the schema applied
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    Ok(conn)
}

fn configure(conn: &Connection) -> Result<()> {
    conn.execute_batch("PRAGMA foreign_keys=ON;")?;
    migrate(conn)
}

/// Run all schema migrations (idempotent)
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(SHARDS_SQL)?;
    Ok(())
}

/// Find database file location
pub fn find_database() -> Result<PathBuf> {
    // 1. Environment variable
    if let Ok(path) = std::env::var("SHARDS_DATABASE_PATH") {
        return Ok(PathBuf::from(path));
    }

    // 2. Walk up directory tree from current dir
    if let Ok(mut current) = std::env::current_dir() {
        loop {
            let db_path = current.join(DATABASE_FILE);
            if db_path.exists() {
                return Ok(db_path);
            }
            if !current.pop() {
                break;
            }
        }
    }

    // 3. Home directory
    dirs::home_dir()
        .map(|home| home.join(".shards").join(DATABASE_FILE))
        .ok_or(Error::DatabaseNotFound)
}

// ─────────────────────────────────────────────────────────────────────────────
// Shard Operations
// ─────────────────────────────────────────────────────────────────────────────

/// Insert a new shard and its labels, returning the generated ID
pub fn insert_shard(conn: &Connection, shard: &NewShard) -> Result<String> {
    let id = uuid::Uuid::new_v4().to_string();
    let now = chrono::Utc::now().timestamp_millis();
    let metadata_json = serde_json::to_string(&shard.metadata)?;
    let embedding = shard.embedding.as_deref().map(encode_embedding);

    conn.execute(
        "INSERT INTO shards
         (id, project, shard_type, title, content, content_hash, status, parent_id,
          metadata_json, embedding, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'open', ?7, ?8, ?9, ?10, ?10)",
        params![
            id,
            shard.project,
            shard.shard_type.as_str(),
            shard.title,
            shard.content,
            content_hash(&shard.content),
            shard.parent_id,
            metadata_json,
            embedding,
            now,
        ],
    )?;

    for label in &shard.labels {
        add_label(conn, &id, label)?;
    }

    Ok(id)
}

/// Get shard by ID
pub fn get_shard(conn: &Connection, id: &str) -> Result<Option<Shard>> {
    let sql = format!("SELECT {SHARD_COLUMNS} FROM shards WHERE id = ?1");
    let shard = conn.query_row(&sql, params![id], map_shard).optional()?;

    match shard {
        Some(mut shard) => {
            shard.labels = labels(conn, &shard.id)?;
            Ok(Some(shard))
        }
        None => Ok(None),
    }
}

/// Get shard by ID, failing when it does not exist
pub fn require_shard(conn: &Connection, id: &str) -> Result<Shard> {
    get_shard(conn, id)?.ok_or_else(|| Error::ShardNotFound(id.to_string()))
}

/// Direct children of a shard, oldest first
pub fn children(conn: &Connection, parent_id: &str, shard_type: Option<ShardType>) -> Result<Vec<Shard>> {
    let sql = format!(
        "SELECT {SHARD_COLUMNS} FROM shards
         WHERE parent_id = ?1 AND (?2 IS NULL OR shard_type = ?2)
         ORDER BY created_at, rowid"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut shards = stmt
        .query_map(params![parent_id, shard_type.map(|t| t.as_str())], map_shard)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    for shard in &mut shards {
        shard.labels = labels(conn, &shard.id)?;
    }
    Ok(shards)
}

/// Walk upward from `id` following parent pointers.
///
/// The first link is the shard itself at distance 0. The walk stops at a
/// root or after `max_steps` steps, whichever comes first; a result whose
/// last link still has a parent was cut off by the bound.
pub fn ancestors(conn: &Connection, id: &str, max_steps: usize) -> Result<Vec<ShardLink>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE chain(id, parent_id, title, distance) AS (
             SELECT id, parent_id, title, 0 FROM shards WHERE id = ?1
             UNION ALL
             SELECT s.id, s.parent_id, s.title, c.distance + 1
             FROM shards s JOIN chain c ON s.id = c.parent_id
             WHERE c.distance < ?2
         )
         SELECT id, parent_id, title, distance FROM chain ORDER BY distance",
    )?;

    let links = stmt
        .query_map(params![id, max_steps as i64], map_link)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

/// Walk downward from `id`, returning the shard and every descendant within
/// `max_depth` levels, shallowest first.
///
/// With a `shard_type`, the walk only descends through shards of that type.
pub fn descendants(
    conn: &Connection,
    id: &str,
    max_depth: usize,
    shard_type: Option<ShardType>,
) -> Result<Vec<ShardLink>> {
    let mut stmt = conn.prepare(
        "WITH RECURSIVE subtree(id, parent_id, title, distance) AS (
             SELECT id, parent_id, title, 0 FROM shards WHERE id = ?1
             UNION ALL
             SELECT s.id, s.parent_id, s.title, t.distance + 1
             FROM shards s JOIN subtree t ON s.parent_id = t.id
             WHERE t.distance < ?2 AND (?3 IS NULL OR s.shard_type = ?3)
         )
         SELECT id, parent_id, title, distance FROM subtree ORDER BY distance, id",
    )?;

    let links = stmt
        .query_map(
            params![id, max_depth as i64, shard_type.map(|t| t.as_str())],
            map_link,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(links)
}

/// Replace a shard's content and refresh its hash
pub fn update_content(conn: &Connection, id: &str, content: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    let changed = conn.execute(
        "UPDATE shards SET content = ?1, content_hash = ?2, updated_at = ?3 WHERE id = ?4",
        params![content, content_hash(content), now, id],
    )?;
    if changed == 0 {
        return Err(Error::ShardNotFound(id.to_string()));
    }
    Ok(())
}

/// Re-parent a shard (`None` makes it a root)
pub fn set_parent(conn: &Connection, id: &str, parent_id: Option<&str>) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    let changed = conn.execute(
        "UPDATE shards SET parent_id = ?1, updated_at = ?2 WHERE id = ?3",
        params![parent_id, now, id],
    )?;
    if changed == 0 {
        return Err(Error::ShardNotFound(id.to_string()));
    }
    Ok(())
}

/// Update shard status
pub fn set_status(conn: &Connection, id: &str, status: ShardStatus) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    let changed = conn.execute(
        "UPDATE shards SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    if changed == 0 {
        return Err(Error::ShardNotFound(id.to_string()));
    }
    Ok(())
}

/// Delete a single shard. Returns false when nothing was deleted.
pub fn delete_shard(conn: &Connection, id: &str) -> Result<bool> {
    let deleted = conn.execute("DELETE FROM shards WHERE id = ?1", params![id])?;
    Ok(deleted > 0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Label Operations
// ─────────────────────────────────────────────────────────────────────────────

pub fn add_label(conn: &Connection, id: &str, label: &str) -> Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO shard_labels (shard_id, label) VALUES (?1, ?2)",
        params![id, label],
    )?;
    Ok(())
}

pub fn labels(conn: &Connection, id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT label FROM shard_labels WHERE shard_id = ?1 ORDER BY label")?;
    let labels = stmt
        .query_map(params![id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(labels)
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// SHA-256 of content as lowercase hex
pub fn content_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Pack an embedding as little-endian f32 bytes
pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Load the stored embedding for a shard, if any
pub fn embedding(conn: &Connection, id: &str) -> Result<Option<Vec<f32>>> {
    let blob: Option<Vec<u8>> = conn
        .query_row("SELECT embedding FROM shards WHERE id = ?1", params![id], |row| row.get(0))
        .optional()?
        .flatten();

    Ok(blob.map(|bytes| {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect()
    }))
}

fn map_shard(row: &rusqlite::Row) -> rusqlite::Result<Shard> {
    let shard_type: String = row.get(2)?;
    let status: String = row.get(6)?;
    let metadata_json: String = row.get(8)?;

    Ok(Shard {
        id: row.get(0)?,
        project: row.get(1)?,
        shard_type: shard_type
            .parse()
            .map_err(|e: String| conversion_error(2, Error::InvalidShardType(e)))?,
        title: row.get(3)?,
        content: row.get(4)?,
        content_hash: row.get(5)?,
        status: status
            .parse()
            .map_err(|e: String| conversion_error(6, Error::InvalidStatus(e)))?,
        parent_id: row.get(7)?,
        labels: Vec::new(),
        metadata: serde_json::from_str(&metadata_json)
            .map_err(|e| conversion_error(8, Error::from(e)))?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

fn map_link(row: &rusqlite::Row) -> rusqlite::Result<ShardLink> {
    Ok(ShardLink {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        title: row.get(2)?,
        distance: row.get::<_, i64>(3)? as usize,
    })
}

fn conversion_error(column: usize, source: Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(source))
}
