//! Typed query helpers for every table in the relic store.
//!
//! The free functions take a `&Connection` so that commit assembly can
//! compose them inside a single transaction; [`Database`] carries
//! convenience wrappers for standalone reads.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::Database;
use crate::errors::DatabaseError;
use crate::models::{CommitInfo, Signature};

/// Name of the primary ref.
pub const HEAD_REF: &str = "HEAD";

// ---------------------------------------------------------------------------
// Row structs
// ---------------------------------------------------------------------------

/// A row from the `file_refs` table. A `None` content hash is a tombstone:
/// the path was deleted at this commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRefRow {
    pub group_id: i64,
    pub commit_id: String,
    pub version_id: Option<i64>,
    pub content_hash: Option<String>,
    pub mode: u32,
    pub is_symlink: bool,
    pub symlink_target: Option<String>,
    pub is_binary: bool,
}

impl FileRefRow {
    pub fn is_tombstone(&self) -> bool {
        self.content_hash.is_none()
    }
}

/// A row from the `sync_state` table.
#[derive(Debug, Clone)]
pub struct SyncStateRow {
    pub remote_name: String,
    pub last_commit_id: Option<String>,
    pub synced_at: String,
}

// ---------------------------------------------------------------------------
// paths
// ---------------------------------------------------------------------------

/// Intern a repository-relative path, returning its stable group id.
///
/// Groups are created lazily the first time a path is staged and are never
/// deleted; re-interning an existing path returns the original id.
pub fn intern_path(conn: &Connection, path: &str) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT OR IGNORE INTO paths (path) VALUES (?1)",
        params![path],
    )?;
    let group_id: i64 = conn.query_row(
        "SELECT group_id FROM paths WHERE path = ?1",
        params![path],
        |row| row.get(0),
    )?;
    Ok(group_id)
}

/// Look up the group id for a path, if it was ever tracked.
pub fn group_for_path(conn: &Connection, path: &str) -> Result<Option<i64>, DatabaseError> {
    let id = conn
        .query_row(
            "SELECT group_id FROM paths WHERE path = ?1",
            params![path],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

/// Reverse lookup: path for a group id.
pub fn path_for_group(conn: &Connection, group_id: i64) -> Result<String, DatabaseError> {
    conn.query_row(
        "SELECT path FROM paths WHERE group_id = ?1",
        params![group_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "path group".into(),
        id: group_id.to_string(),
    })
}

/// Number of groups ever interned. The tree resolver uses this for its
/// early-stop bound.
pub fn group_count(conn: &Connection) -> Result<i64, DatabaseError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM paths", [], |row| row.get(0))?;
    Ok(count)
}

// ---------------------------------------------------------------------------
// content versions
// ---------------------------------------------------------------------------

/// Payload passed to [`put_version`].
pub enum VersionPayload<'a> {
    Text(&'a str),
    Binary(&'a [u8]),
}

/// The most recent `(version_id, content_hash)` recorded for a group, taken
/// from the highest-versioned `file_refs` row.
pub fn latest_version(
    conn: &Connection,
    group_id: i64,
) -> Result<Option<(i64, String)>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT version_id, content_hash FROM file_refs
             WHERE group_id = ?1 AND version_id IS NOT NULL
             ORDER BY version_id DESC LIMIT 1",
            params![group_id],
            |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?)),
        )
        .optional()?;
    Ok(row.and_then(|(v, h)| h.map(|h| (v, h))))
}

/// Next version id for a group: one past the highest id in either content
/// table. Gapless because allocation always runs inside the single writer
/// transaction.
fn next_version_id(conn: &Connection, group_id: i64) -> Result<i64, DatabaseError> {
    let max: i64 = conn.query_row(
        "SELECT COALESCE(MAX(v), 0) FROM (
             SELECT MAX(version_id) AS v FROM text_content WHERE group_id = ?1
             UNION ALL
             SELECT MAX(version_id) AS v FROM binary_content WHERE group_id = ?1
         )",
        params![group_id],
        |row| row.get(0),
    )?;
    Ok(max + 1)
}

/// Append a content snapshot to a group's version chain and return its
/// version id.
///
/// De-duplication: if `content_hash` matches the hash of the group's most
/// recent version, no row is appended and the prior version id is reused.
/// This keeps no-op modifications from growing the delta chain.
pub fn put_version(
    conn: &Connection,
    group_id: i64,
    payload: VersionPayload<'_>,
    content_hash: &str,
) -> Result<i64, DatabaseError> {
    if let Some((version_id, latest_hash)) = latest_version(conn, group_id)? {
        if latest_hash == content_hash {
            debug!(group_id, version_id, "content unchanged, reusing version");
            return Ok(version_id);
        }
    }

    let version_id = next_version_id(conn, group_id)?;
    match payload {
        VersionPayload::Text(text) => {
            conn.execute(
                "INSERT INTO text_content (group_id, version_id, content) VALUES (?1, ?2, ?3)",
                params![group_id, version_id, text],
            )?;
        }
        VersionPayload::Binary(bytes) => {
            conn.execute(
                "INSERT INTO binary_content (group_id, version_id, content) VALUES (?1, ?2, ?3)",
                params![group_id, version_id, bytes],
            )?;
        }
    }
    debug!(group_id, version_id, "appended content version");
    Ok(version_id)
}

/// Fetch a content snapshot. Text content is returned as a `String`, binary
/// as raw bytes.
pub fn get_version(
    conn: &Connection,
    group_id: i64,
    version_id: i64,
) -> Result<crate::models::FileContent, DatabaseError> {
    let text: Option<String> = conn
        .query_row(
            "SELECT content FROM text_content WHERE group_id = ?1 AND version_id = ?2",
            params![group_id, version_id],
            |row| row.get(0),
        )
        .optional()?;
    if let Some(text) = text {
        return Ok(crate::models::FileContent::Text(text));
    }

    let bytes: Option<Vec<u8>> = conn
        .query_row(
            "SELECT content FROM binary_content WHERE group_id = ?1 AND version_id = ?2",
            params![group_id, version_id],
            |row| row.get(0),
        )
        .optional()?;
    bytes
        .map(crate::models::FileContent::Binary)
        .ok_or_else(|| DatabaseError::NotFound {
            entity: "content version".into(),
            id: format!("{group_id}:{version_id}"),
        })
}

/// All version ids for a group, ascending. This ordering is the contract
/// the external delta-compression engine relies on.
pub fn versions_for_group(conn: &Connection, group_id: i64) -> Result<Vec<i64>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT version_id FROM (
             SELECT version_id FROM text_content WHERE group_id = ?1
             UNION ALL
             SELECT version_id FROM binary_content WHERE group_id = ?1
         ) ORDER BY version_id",
    )?;
    let versions = stmt
        .query_map(params![group_id], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(versions)
}

// ---------------------------------------------------------------------------
// commits
// ---------------------------------------------------------------------------

/// Insert an immutable commit record.
pub fn insert_commit(conn: &Connection, commit: &CommitInfo) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO commits (id, parent_id, tree_hash, message,
                              author_name, author_email, authored_at,
                              committer_name, committer_email, committed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            commit.id,
            commit.parent_id,
            commit.tree_hash,
            commit.message,
            commit.author.name,
            commit.author.email,
            commit.author.timestamp.to_rfc3339(),
            commit.committer.name,
            commit.committer.email,
            commit.committer.timestamp.to_rfc3339(),
        ],
    )?;
    debug!(id = %commit.id, parent = ?commit.parent_id, "inserted commit");
    Ok(())
}

fn parse_ts(value: String, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                Box::new(e),
            )
        })
}

fn row_to_commit(row: &rusqlite::Row<'_>) -> rusqlite::Result<CommitInfo> {
    Ok(CommitInfo {
        id: row.get(0)?,
        parent_id: row.get(1)?,
        tree_hash: row.get(2)?,
        message: row.get(3)?,
        author: Signature {
            name: row.get(4)?,
            email: row.get(5)?,
            timestamp: parse_ts(row.get(6)?, 6)?,
        },
        committer: Signature {
            name: row.get(7)?,
            email: row.get(8)?,
            timestamp: parse_ts(row.get(9)?, 9)?,
        },
    })
}

const COMMIT_COLUMNS: &str = "id, parent_id, tree_hash, message,
     author_name, author_email, authored_at,
     committer_name, committer_email, committed_at";

/// Fetch a commit by id.
pub fn get_commit(conn: &Connection, id: &str) -> Result<Option<CommitInfo>, DatabaseError> {
    let commit = conn
        .query_row(
            &format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE id = ?1"),
            params![id],
            row_to_commit,
        )
        .optional()?;
    Ok(commit)
}

/// Parent id of a commit. Errors if the commit itself does not exist.
pub fn parent_of(conn: &Connection, id: &str) -> Result<Option<String>, DatabaseError> {
    conn.query_row(
        "SELECT parent_id FROM commits WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| DatabaseError::NotFound {
        entity: "commit".into(),
        id: id.to_string(),
    })
}

// ---------------------------------------------------------------------------
// refs
// ---------------------------------------------------------------------------

/// Current value of a named ref.
pub fn get_ref(conn: &Connection, name: &str) -> Result<Option<String>, DatabaseError> {
    let commit_id = conn
        .query_row(
            "SELECT commit_id FROM refs WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(commit_id)
}

/// Compare-and-swap ref advance.
///
/// The ref is moved to `new_commit` only if it still holds `expected`
/// (`None` meaning the ref does not exist yet). Returns `false` when the
/// ref moved underneath the caller, who must then retry the whole commit
/// sequence against the new tip.
pub fn advance_ref_if(
    conn: &Connection,
    name: &str,
    expected: Option<&str>,
    new_commit: &str,
) -> Result<bool, DatabaseError> {
    let changed = match expected {
        Some(old) => conn.execute(
            "UPDATE refs SET commit_id = ?1 WHERE name = ?2 AND commit_id = ?3",
            params![new_commit, name, old],
        )?,
        None => conn.execute(
            "INSERT INTO refs (name, commit_id) VALUES (?1, ?2)
             ON CONFLICT (name) DO NOTHING",
            params![name, new_commit],
        )?,
    };
    if changed == 1 {
        debug!(name, new_commit, "advanced ref");
    }
    Ok(changed == 1)
}

// ---------------------------------------------------------------------------
// file_refs
// ---------------------------------------------------------------------------

/// Insert a file reference (or tombstone) for a commit.
pub fn insert_file_ref(conn: &Connection, file_ref: &FileRefRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO file_refs (group_id, commit_id, version_id, content_hash,
                                mode, is_symlink, symlink_target, is_binary)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            file_ref.group_id,
            file_ref.commit_id,
            file_ref.version_id,
            file_ref.content_hash,
            file_ref.mode,
            file_ref.is_symlink,
            file_ref.symlink_target,
            file_ref.is_binary,
        ],
    )?;
    Ok(())
}

fn row_to_file_ref(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRefRow> {
    Ok(FileRefRow {
        group_id: row.get(0)?,
        commit_id: row.get(1)?,
        version_id: row.get(2)?,
        content_hash: row.get(3)?,
        mode: row.get(4)?,
        is_symlink: row.get(5)?,
        symlink_target: row.get(6)?,
        is_binary: row.get(7)?,
    })
}

/// All file references a commit carries (only the paths it touched).
pub fn file_refs_for_commit(
    conn: &Connection,
    commit_id: &str,
) -> Result<Vec<FileRefRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT group_id, commit_id, version_id, content_hash,
                mode, is_symlink, symlink_target, is_binary
         FROM file_refs WHERE commit_id = ?1",
    )?;
    let refs = stmt
        .query_map(params![commit_id], row_to_file_ref)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(refs)
}

// ---------------------------------------------------------------------------
// sync_state
// ---------------------------------------------------------------------------

/// Record the last merged commit for a remote.
pub fn upsert_sync_state(
    conn: &Connection,
    remote_name: &str,
    last_commit_id: Option<&str>,
) -> Result<(), DatabaseError> {
    let now = Utc::now().to_rfc3339();
    conn.execute(
        "INSERT INTO sync_state (remote_name, last_commit_id, synced_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT (remote_name) DO UPDATE
             SET last_commit_id = excluded.last_commit_id,
                 synced_at = excluded.synced_at",
        params![remote_name, last_commit_id, now],
    )?;
    debug!(remote_name, ?last_commit_id, "updated sync state");
    Ok(())
}

/// Fetch the sync bookkeeping for a remote.
pub fn get_sync_state(
    conn: &Connection,
    remote_name: &str,
) -> Result<Option<SyncStateRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT remote_name, last_commit_id, synced_at FROM sync_state
             WHERE remote_name = ?1",
            params![remote_name],
            |row| {
                Ok(SyncStateRow {
                    remote_name: row.get(0)?,
                    last_commit_id: row.get(1)?,
                    synced_at: row.get(2)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// Database convenience wrappers
// ---------------------------------------------------------------------------

impl Database {
    /// Commit id HEAD points at, or `None` in an empty repository.
    pub fn head(&self) -> Result<Option<String>, DatabaseError> {
        get_ref(&self.conn(), HEAD_REF)
    }

    /// Fetch a commit, erroring if it does not exist.
    pub fn commit(&self, id: &str) -> Result<CommitInfo, DatabaseError> {
        get_commit(&self.conn(), id)?.ok_or_else(|| DatabaseError::NotFound {
            entity: "commit".into(),
            id: id.to_string(),
        })
    }

    /// Newest-first commit listing from HEAD, at most `limit` entries.
    pub fn log(&self, limit: usize) -> Result<Vec<CommitInfo>, DatabaseError> {
        let conn = self.conn();
        let mut out = Vec::new();
        let mut seen = std::collections::HashSet::new();
        let mut current = get_ref(&conn, HEAD_REF)?;
        while let Some(id) = current {
            if out.len() >= limit {
                break;
            }
            if !seen.insert(id.clone()) {
                return Err(DatabaseError::CorruptChain(id));
            }
            let commit = get_commit(&conn, &id)?.ok_or_else(|| DatabaseError::NotFound {
                entity: "commit".into(),
                id: id.clone(),
            })?;
            current = commit.parent_id.clone();
            out.push(commit);
        }
        Ok(out)
    }
}
