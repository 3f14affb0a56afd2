//! Error types for the relic core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Repo(#[from] RepoError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Commit(#[from] CommitError),

    #[error(transparent)]
    Merge(#[from] MergeError),
}

// ---------------------------------------------------------------------------
// Repository lifecycle errors
// ---------------------------------------------------------------------------

/// Errors from repository discovery and creation.
#[derive(Debug, Error)]
pub enum RepoError {
    /// `init` was attempted where a repository already exists.
    #[error("'{0}' is already a relic repository")]
    AlreadyInitialized(String),

    /// No `.relic` directory was found between the start path and the
    /// filesystem root.
    #[error("'{0}' is not inside a relic repository")]
    NotARepository(String),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite persistence layer.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// The store's schema marker does not match the version this build
    /// supports. Fatal and non-retryable.
    #[error(
        "store schema version {found} is not supported (expected {expected}); \
         re-import the repository with a matching relic version"
    )]
    SchemaVersion { found: u32, expected: u32 },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The commit graph revisited a commit during an ancestry walk.
    #[error("corrupt commit chain: ancestry walk revisited {0}")]
    CorruptChain(String),

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and key/value access.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// The key is not one of the enumerated configuration keys.
    #[error("unknown configuration key: '{0}'")]
    UnknownKey(String),

    /// A config value failed validation.
    #[error("invalid configuration value for '{key}': {detail}")]
    InvalidValue { key: String, detail: String },

    /// Generic I/O error reading or writing the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Staging errors
// ---------------------------------------------------------------------------

/// Errors from staging-index operations.
#[derive(Debug, Error)]
pub enum StageError {
    /// The path is malformed, escapes the working copy, or names nothing
    /// stageable. No state is mutated.
    #[error("invalid path '{path}': {detail}")]
    InvalidPath { path: String, detail: String },

    /// The path matches an ignore pattern.
    #[error("path '{0}' is ignored")]
    Ignored(String),

    /// The path is not currently staged.
    #[error("path '{0}' is not staged")]
    NotStaged(String),

    /// The index file could not be read or written.
    #[error("staging index I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The index file is not valid JSON.
    #[error("staging index parse error: {0}")]
    ParseError(String),
}

// ---------------------------------------------------------------------------
// Commit errors
// ---------------------------------------------------------------------------

/// Errors from commit assembly.
#[derive(Debug, Error)]
pub enum CommitError {
    /// Commit was attempted on an empty staging index.
    #[error("nothing staged to commit")]
    NothingStaged,

    /// Author/committer identity could not be resolved. Lists every missing
    /// field so the operator can fix all of them at once.
    #[error("missing identity field(s): {}", fields.join(", "))]
    MissingIdentity { fields: Vec<String> },

    /// HEAD moved while the commit was being assembled. The caller should
    /// re-resolve the parent tree and retry the whole commit sequence.
    #[error("ref '{reference}' was advanced concurrently; retry the commit")]
    ConcurrentModification { reference: String },

    /// A staged path disappeared from the working copy before it was read.
    #[error("staged file missing from working copy: {0}")]
    StagedFileMissing(String),

    /// Database error during the atomic write.
    #[error("commit database error: {0}")]
    Database(#[from] DatabaseError),

    /// Staging index error.
    #[error("commit staging error: {0}")]
    Stage(#[from] StageError),

    /// I/O error reading working-copy content.
    #[error("commit I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Merge errors
// ---------------------------------------------------------------------------

/// Errors from the merge coordinator.
#[derive(Debug, Error)]
pub enum MergeError {
    /// The two histories share no commit. Fatal for this merge attempt.
    #[error("no common ancestor between {local} and {remote}")]
    NoCommonAncestor { local: String, remote: String },

    /// A previous merge has not been completed or aborted.
    #[error("a merge with remote '{remote}' is already in progress")]
    AlreadyInProgress { remote: String },

    /// The operation requires an in-progress merge and there is none.
    #[error("no merge in progress")]
    NotInProgress,

    /// Completion was attempted while conflicted paths remain.
    #[error("{count} conflicted path(s) remain unresolved")]
    UnresolvedConflicts { count: usize },

    /// The path is not in the conflict set.
    #[error("path '{0}' is not conflicted")]
    NotConflicted(String),

    /// A merge needs a local HEAD to merge into.
    #[error("cannot merge into an empty repository")]
    EmptyRepository,

    /// Database error during merge bookkeeping.
    #[error("merge database error: {0}")]
    Database(#[from] DatabaseError),

    /// Commit error while applying the merge result.
    #[error("merge commit error: {0}")]
    Commit(#[from] CommitError),

    /// Staging error while applying the merge result.
    #[error("merge staging error: {0}")]
    Stage(#[from] StageError),

    /// I/O error materializing merge results in the working copy.
    #[error("merge I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The merge-state file is not valid JSON.
    #[error("merge state parse error: {0}")]
    ParseError(String),
}
