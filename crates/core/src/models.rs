//! Domain model types used throughout relic.
//!
//! These types bridge the storage layer, the tree resolver, and the
//! staging/commit/merge machinery.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// File modes
// ---------------------------------------------------------------------------

/// Regular file.
pub const MODE_FILE: u32 = 0o100644;
/// Regular file with the executable bit set.
pub const MODE_EXEC: u32 = 0o100755;
/// Symbolic link.
pub const MODE_SYMLINK: u32 = 0o120000;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// An author or committer identity with a timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

// ---------------------------------------------------------------------------
// Commit
// ---------------------------------------------------------------------------

/// An immutable commit record.
///
/// `id` is a ULID: lexicographic order matches creation order, which is what
/// the commit graph relies on. `parent_id` is `None` only for the root
/// commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitInfo {
    pub id: String,
    pub parent_id: Option<String>,
    /// Digest over the full resolved tree at this commit.
    pub tree_hash: String,
    pub message: String,
    pub author: Signature,
    pub committer: Signature,
}

impl CommitInfo {
    /// First line of the commit message.
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }

    /// Abbreviated commit id for display.
    pub fn short_id(&self) -> &str {
        &self.id[..self.id.len().min(10)]
    }
}

// ---------------------------------------------------------------------------
// File state
// ---------------------------------------------------------------------------

/// The visible state of one path at one commit, as produced by the tree
/// resolver. Tombstones never appear here; a deleted path is simply absent
/// from the resolved tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Pointer into the path's version chain.
    pub version_id: i64,
    /// SHA-256 of the content, hex-encoded.
    pub content_hash: String,
    pub mode: u32,
    pub is_symlink: bool,
    pub symlink_target: Option<String>,
    pub is_binary: bool,
}

// ---------------------------------------------------------------------------
// File content
// ---------------------------------------------------------------------------

/// A full content snapshot. Binary detection is a property of the snapshot,
/// not of the path: the same group may hold text and binary versions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileContent {
    Text(String),
    Binary(Vec<u8>),
}

impl FileContent {
    /// Classify raw working-copy bytes. Content is text when it is valid
    /// UTF-8 and contains no NUL byte in its first 8000 bytes.
    pub fn classify(bytes: Vec<u8>) -> Self {
        let probe = &bytes[..bytes.len().min(8000)];
        if probe.contains(&0) {
            return Self::Binary(bytes);
        }
        match String::from_utf8(bytes) {
            Ok(text) => Self::Text(text),
            Err(e) => Self::Binary(e.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Text(s) => s.as_bytes(),
            Self::Binary(b) => b,
        }
    }

    pub fn is_binary(&self) -> bool {
        matches!(self, Self::Binary(_))
    }

    /// Text view of the content, if it is text.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Binary(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

/// Status of a staged path. One entry per path, last write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Added,
    Modified,
    Deleted,
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Added => write!(f, "added"),
            Self::Modified => write!(f, "modified"),
            Self::Deleted => write!(f, "deleted"),
        }
    }
}
