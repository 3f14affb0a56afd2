//! Store schema and the schema-version gate.
//!
//! The schema version lives in the SQLite `user_version` pragma. Unlike a
//! migration-based store, the marker is a hard compatibility gate: a fresh
//! store (version 0) is initialized in place, a store at the supported
//! version is accepted, and anything else is fatal: the operator must
//! re-import with a matching relic version. Version chains are
//! delta-compressed by an external engine keyed on `(group_id, version_id)`
//! order, so silently rewriting an old layout is never safe.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: u32 = 1;

/// Full schema, created in one batch on a fresh store.
const SCHEMA_SQL: &str = r#"
CREATE TABLE commits (
    id              TEXT PRIMARY KEY,
    parent_id       TEXT REFERENCES commits (id),
    tree_hash       TEXT NOT NULL,
    message         TEXT NOT NULL,
    author_name     TEXT NOT NULL,
    author_email    TEXT NOT NULL,
    authored_at     TEXT NOT NULL,
    committer_name  TEXT NOT NULL,
    committer_email TEXT NOT NULL,
    committed_at    TEXT NOT NULL
);

CREATE INDEX idx_commits_parent ON commits (parent_id);

CREATE TABLE paths (
    group_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    path        TEXT NOT NULL UNIQUE
);

CREATE TABLE file_refs (
    group_id        INTEGER NOT NULL REFERENCES paths (group_id),
    commit_id       TEXT NOT NULL REFERENCES commits (id),
    version_id      INTEGER,
    content_hash    TEXT,
    mode            INTEGER NOT NULL,
    is_symlink      INTEGER NOT NULL DEFAULT 0,
    symlink_target  TEXT,
    is_binary       INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (group_id, commit_id)
);

CREATE INDEX idx_file_refs_commit ON file_refs (commit_id);

CREATE TABLE text_content (
    group_id    INTEGER NOT NULL,
    version_id  INTEGER NOT NULL,
    content     TEXT NOT NULL,
    PRIMARY KEY (group_id, version_id)
);

CREATE TABLE binary_content (
    group_id    INTEGER NOT NULL,
    version_id  INTEGER NOT NULL,
    content     BLOB NOT NULL,
    PRIMARY KEY (group_id, version_id)
);

CREATE TABLE refs (
    name        TEXT PRIMARY KEY,
    commit_id   TEXT NOT NULL REFERENCES commits (id)
);

CREATE TABLE sync_state (
    remote_name     TEXT PRIMARY KEY,
    last_commit_id  TEXT,
    synced_at       TEXT NOT NULL
);
"#;

/// Initialize a fresh store or verify an existing one.
pub fn ensure_schema(conn: &Connection) -> Result<(), DatabaseError> {
    let found = get_schema_version(conn)?;
    match found {
        0 => {
            info!(version = SCHEMA_VERSION, "initializing store schema");
            conn.execute_batch(SCHEMA_SQL)?;
            set_schema_version(conn, SCHEMA_VERSION)?;
            debug!("store schema created");
            Ok(())
        }
        v if v == SCHEMA_VERSION => {
            debug!(version = v, "store schema is current");
            Ok(())
        }
        v => Err(DatabaseError::SchemaVersion {
            found: v,
            expected: SCHEMA_VERSION,
        }),
    }
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), DatabaseError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}
