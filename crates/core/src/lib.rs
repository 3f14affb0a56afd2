//! relic core library.
//!
//! A version-control engine that keeps history in a relational store
//! instead of an object directory: commits are rows, file content lives in
//! per-path version chains, and each commit records only the paths it
//! touched. Snapshots are reconstructed on demand by the tree resolver.
//!
//! [`Repository`] is the main entry point; it binds a working copy to its
//! `.relic/` metadata (SQLite store, TOML configuration, staging index,
//! merge state).

pub mod commit;
pub mod config;
pub mod db;
pub mod diff;
pub mod errors;
pub mod hash;
pub mod identity;
pub mod ids;
pub mod ignore;
pub mod merge;
pub mod models;
pub mod repo;
pub mod stage;
pub mod tree;

pub use config::{ConfigKey, RepoConfig};
pub use db::Database;
pub use diff::{DiffLine, Hunk, LineKind};
pub use errors::{
    CommitError, ConfigError, CoreError, DatabaseError, MergeError, RepoError, StageError,
};
pub use models::{CommitInfo, FileContent, FileState, Signature, StageStatus};
pub use repo::{FileDiff, MergeOutcome, Repository, StatusReport, RELIC_DIR};
