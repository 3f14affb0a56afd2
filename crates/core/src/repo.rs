//! The repository facade.
//!
//! [`Repository`] ties the store, the configuration, the staging index, and
//! the merge coordinator to one working copy. All metadata lives under the
//! `.relic/` directory at the working copy root: the SQLite store, the TOML
//! configuration, the JSON staging index, and the JSON merge state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::commit::create_commit;
use crate::config::RepoConfig;
use crate::db::queries;
use crate::db::Database;
use crate::diff::{diff, Hunk};
use crate::errors::{CommitError, CoreError, MergeError, RepoError, StageError};
use crate::identity::ConfigIdentity;
use crate::ignore::{GlobFilter, PathFilter};
use crate::merge::{self, MergeDecision, MergeState, PersistedMergeState};
use crate::models::{CommitInfo, FileContent, FileState, StageStatus};
use crate::stage::StagingIndex;
use crate::tree::{common_ancestor, resolve_tree};

/// Name of the metadata directory at the working copy root.
pub const RELIC_DIR: &str = ".relic";
const DB_FILE: &str = "relic.db";
const CONFIG_FILE: &str = "config.toml";
const INDEX_FILE: &str = "index.json";
const MERGE_STATE_FILE: &str = "merge_state.json";

/// One file's place in a status report.
#[derive(Debug, Clone, Default)]
pub struct StatusReport {
    /// Paths in the staging index, with their staged status.
    pub staged: Vec<(String, StageStatus)>,
    /// Tracked paths whose working-copy content differs from HEAD and which
    /// are not staged.
    pub modified: Vec<String>,
    /// Tracked paths missing from the working copy and not staged.
    pub deleted: Vec<String>,
    /// Working-copy paths unknown to HEAD and the index.
    pub untracked: Vec<String>,
    /// Paths still conflicted from an in-progress merge.
    pub conflicted: Vec<String>,
}

impl StatusReport {
    pub fn is_clean(&self) -> bool {
        self.staged.is_empty()
            && self.modified.is_empty()
            && self.deleted.is_empty()
            && self.untracked.is_empty()
            && self.conflicted.is_empty()
    }
}

/// A per-file diff.
#[derive(Debug, Clone)]
pub struct FileDiff {
    pub path: String,
    /// Binary files get no hunks, only this marker.
    pub is_binary: bool,
    pub hunks: Vec<Hunk>,
}

/// Result of starting a merge.
#[derive(Debug)]
pub enum MergeOutcome {
    /// The merge applied cleanly and was committed.
    Completed(CommitInfo),
    /// Remote introduced no changes; nothing to commit.
    UpToDate,
    /// Conflicted paths were materialized with markers and await
    /// resolution.
    Conflicted(Vec<String>),
}

/// A repository rooted at a working copy directory.
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    db: Database,
    config: RepoConfig,
}

impl Repository {
    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create a new repository at `root`. Fails if one already exists there.
    pub fn init<P: AsRef<Path>>(root: P) -> Result<Self, CoreError> {
        let root = root.as_ref().to_path_buf();
        let relic_dir = root.join(RELIC_DIR);
        if relic_dir.exists() {
            return Err(RepoError::AlreadyInitialized(root.display().to_string()).into());
        }
        std::fs::create_dir_all(&relic_dir).map_err(StageError::from)?;

        let config = RepoConfig::default();
        config.save(relic_dir.join(CONFIG_FILE))?;
        let db = Database::open(relic_dir.join(DB_FILE))?;

        info!(root = %root.display(), "initialized repository");
        Ok(Self { root, db, config })
    }

    /// Open the repository containing `start`, searching upward for the
    /// `.relic` directory.
    pub fn open<P: AsRef<Path>>(start: P) -> Result<Self, CoreError> {
        let start = start.as_ref();
        let root = Self::discover(start)
            .ok_or_else(|| RepoError::NotARepository(start.display().to_string()))?;
        let relic_dir = root.join(RELIC_DIR);
        let config = RepoConfig::load(relic_dir.join(CONFIG_FILE))?;
        let db = Database::open(relic_dir.join(DB_FILE))?;
        debug!(root = %root.display(), "opened repository");
        Ok(Self { root, db, config })
    }

    fn discover(start: &Path) -> Option<PathBuf> {
        let mut current = Some(start);
        while let Some(dir) = current {
            if dir.join(RELIC_DIR).is_dir() {
                return Some(dir.to_path_buf());
            }
            current = dir.parent();
        }
        None
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut RepoConfig {
        &mut self.config
    }

    /// Persist the in-memory configuration.
    pub fn save_config(&self) -> Result<(), CoreError> {
        self.config
            .save(self.root.join(RELIC_DIR).join(CONFIG_FILE))?;
        Ok(())
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(RELIC_DIR).join(INDEX_FILE)
    }

    fn merge_state_path(&self) -> PathBuf {
        self.root.join(RELIC_DIR).join(MERGE_STATE_FILE)
    }

    fn index(&self) -> Result<StagingIndex, StageError> {
        StagingIndex::load(self.index_path())
    }

    fn merge_state(&self) -> Result<PersistedMergeState, MergeError> {
        MergeState::load(self.merge_state_path())
    }

    fn filter(&self) -> GlobFilter {
        GlobFilter::new(self.config.core.ignore.clone())
    }

    // -----------------------------------------------------------------------
    // Tree access
    // -----------------------------------------------------------------------

    /// Resolved tree at HEAD, or empty for a fresh repository.
    pub fn head_tree(&self) -> Result<BTreeMap<String, FileState>, CoreError> {
        match self.db.head()? {
            Some(head) => Ok(resolve_tree(&self.db.conn(), &head)?),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Resolved tree at an arbitrary commit.
    pub fn tree_at(&self, commit_id: &str) -> Result<BTreeMap<String, FileState>, CoreError> {
        Ok(resolve_tree(&self.db.conn(), commit_id)?)
    }

    /// Content of one path at one commit, if present there.
    pub fn file_at(&self, commit_id: &str, path: &str) -> Result<Option<FileContent>, CoreError> {
        let conn = self.db.conn();
        let tree = resolve_tree(&conn, commit_id)?;
        let Some(state) = tree.get(path) else {
            return Ok(None);
        };
        let group = queries::group_for_path(&conn, path)?.ok_or_else(|| {
            crate::errors::DatabaseError::NotFound {
                entity: "path group".into(),
                id: path.to_string(),
            }
        })?;
        Ok(Some(queries::get_version(&conn, group, state.version_id)?))
    }

    // -----------------------------------------------------------------------
    // Staging
    // -----------------------------------------------------------------------

    fn validate_path(path: &str) -> Result<(), StageError> {
        let invalid = |detail: &str| StageError::InvalidPath {
            path: path.to_string(),
            detail: detail.to_string(),
        };
        if path.is_empty() {
            return Err(invalid("empty path"));
        }
        if Path::new(path).is_absolute() {
            return Err(invalid("path must be relative to the repository root"));
        }
        if Path::new(path)
            .components()
            .any(|c| matches!(c, std::path::Component::ParentDir))
        {
            return Err(invalid("path must not escape the repository root"));
        }
        Ok(())
    }

    /// Stage a path as added or modified, depending on whether HEAD already
    /// tracks it. The path must exist in the working copy and not match an
    /// ignore pattern.
    pub fn add(&self, path: &str) -> Result<StageStatus, CoreError> {
        Self::validate_path(path)?;
        let abs = self.root.join(path);
        let metadata = std::fs::symlink_metadata(&abs).map_err(|_| StageError::InvalidPath {
            path: path.to_string(),
            detail: "no such file in the working copy".into(),
        })?;
        if metadata.is_dir() {
            return Err(StageError::InvalidPath {
                path: path.to_string(),
                detail: "is a directory; stage files individually".into(),
            }
            .into());
        }
        if self.filter().is_ignored(path, false) {
            return Err(StageError::Ignored(path.to_string()).into());
        }

        let status = if self.head_tree()?.contains_key(path) {
            StageStatus::Modified
        } else {
            StageStatus::Added
        };
        let mut index = self.index()?;
        index.stage(path, status);
        index.save()?;
        debug!(path, %status, "staged");
        Ok(status)
    }

    /// Stage a deletion. The path must be tracked at HEAD.
    pub fn remove(&self, path: &str) -> Result<(), CoreError> {
        Self::validate_path(path)?;
        if !self.head_tree()?.contains_key(path) {
            return Err(StageError::InvalidPath {
                path: path.to_string(),
                detail: "not tracked at HEAD".into(),
            }
            .into());
        }
        let mut index = self.index()?;
        index.stage(path, StageStatus::Deleted);
        index.save()?;
        debug!(path, "staged deletion");
        Ok(())
    }

    /// Drop one path from the staging index.
    pub fn unstage(&self, path: &str) -> Result<(), CoreError> {
        let mut index = self.index()?;
        index.unstage(path)?;
        index.save()?;
        Ok(())
    }

    /// Drop every staged entry.
    pub fn clear_stage(&self) -> Result<(), CoreError> {
        let mut index = self.index()?;
        index.clear_and_save()?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Status
    // -----------------------------------------------------------------------

    fn scan_workdir(&self) -> Result<Vec<String>, StageError> {
        let filter = self.filter();
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            for entry in std::fs::read_dir(&dir)? {
                let entry = entry?;
                let abs = entry.path();
                let rel = match abs.strip_prefix(&self.root) {
                    Ok(rel) => rel.to_string_lossy().into_owned(),
                    Err(_) => continue,
                };
                let is_dir = entry.file_type()?.is_dir();
                if filter.is_ignored(&rel, is_dir) {
                    continue;
                }
                if is_dir {
                    stack.push(abs);
                } else {
                    out.push(rel);
                }
            }
        }
        out.sort();
        Ok(out)
    }

    fn workdir_hash(&self, path: &str) -> Result<Option<String>, StageError> {
        let abs = self.root.join(path);
        let Ok(metadata) = std::fs::symlink_metadata(&abs) else {
            return Ok(None);
        };
        if metadata.file_type().is_symlink() {
            let target = std::fs::read_link(&abs)?;
            return Ok(Some(crate::hash::content_hash(
                target.to_string_lossy().as_bytes(),
            )));
        }
        let bytes = std::fs::read(&abs)?;
        Ok(Some(crate::hash::content_hash(&bytes)))
    }

    /// Compare the working copy and the staging index against HEAD.
    pub fn status(&self) -> Result<StatusReport, CoreError> {
        let head_tree = self.head_tree()?;
        let index = self.index()?;
        let merge_state = self.merge_state()?;

        let mut report = StatusReport {
            staged: index.entries().map(|(p, s)| (p.to_string(), s)).collect(),
            conflicted: merge_state.state.conflicted.iter().cloned().collect(),
            ..Default::default()
        };

        let workdir: std::collections::BTreeSet<String> =
            self.scan_workdir().map_err(CoreError::Stage)?.into_iter().collect();

        for (path, state) in &head_tree {
            if index.status(path).is_some() {
                continue;
            }
            match self.workdir_hash(path).map_err(CoreError::Stage)? {
                Some(hash) if hash != state.content_hash => {
                    report.modified.push(path.clone());
                }
                Some(_) => {}
                None => report.deleted.push(path.clone()),
            }
        }

        for path in workdir {
            if !head_tree.contains_key(&path) && index.status(&path).is_none() {
                report.untracked.push(path);
            }
        }

        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Commit and history
    // -----------------------------------------------------------------------

    /// Commit the staging index.
    pub fn commit(&self, message: &str) -> Result<CommitInfo, CoreError> {
        let mut index = self.index().map_err(CommitError::from)?;
        let identity = ConfigIdentity::new(&self.config);
        let commit = create_commit(&self.db, &self.root, &mut index, &identity, message)?;
        Ok(commit)
    }

    /// Newest-first history from HEAD.
    pub fn log(&self, limit: usize) -> Result<Vec<CommitInfo>, CoreError> {
        Ok(self.db.log(limit)?)
    }

    // -----------------------------------------------------------------------
    // Diff
    // -----------------------------------------------------------------------

    fn stored_text(&self, path: &str, state: &FileState) -> Result<Option<String>, CoreError> {
        if state.is_binary {
            return Ok(None);
        }
        let conn = self.db.conn();
        let group = queries::group_for_path(&conn, path)?.ok_or_else(|| {
            crate::errors::DatabaseError::NotFound {
                entity: "path group".into(),
                id: path.to_string(),
            }
        })?;
        match queries::get_version(&conn, group, state.version_id)? {
            FileContent::Text(text) => Ok(Some(text)),
            FileContent::Binary(_) => Ok(None),
        }
    }

    /// Diff the working copy against HEAD for every tracked path (or one
    /// path when `only` is given).
    pub fn diff_workdir(&self, only: Option<&str>) -> Result<Vec<FileDiff>, CoreError> {
        let head_tree = self.head_tree()?;
        let context = self.config.core.diff_context;
        let mut out = Vec::new();

        for (path, state) in &head_tree {
            if let Some(only) = only {
                if path != only {
                    continue;
                }
            }
            let abs = self.root.join(path);
            let new_bytes = match std::fs::read(&abs) {
                Ok(bytes) => bytes,
                Err(_) => Vec::new(),
            };
            let new_hash = crate::hash::content_hash(&new_bytes);
            if new_hash == state.content_hash {
                continue;
            }

            let old_text = self.stored_text(path, state)?;
            let new_content = FileContent::classify(new_bytes);
            match (old_text, new_content.as_text()) {
                (Some(old), Some(new)) => {
                    let hunks = diff(&old, new, context);
                    if !hunks.is_empty() {
                        out.push(FileDiff {
                            path: path.clone(),
                            is_binary: false,
                            hunks,
                        });
                    }
                }
                _ => out.push(FileDiff {
                    path: path.clone(),
                    is_binary: true,
                    hunks: Vec::new(),
                }),
            }
        }
        Ok(out)
    }

    /// Diff two commits, oldest side first.
    pub fn diff_commits(&self, old_id: &str, new_id: &str) -> Result<Vec<FileDiff>, CoreError> {
        let old_tree = self.tree_at(old_id)?;
        let new_tree = self.tree_at(new_id)?;
        let context = self.config.core.diff_context;
        let mut out = Vec::new();

        let mut paths: std::collections::BTreeSet<&String> = old_tree.keys().collect();
        paths.extend(new_tree.keys());

        for path in paths {
            let old_state = old_tree.get(path);
            let new_state = new_tree.get(path);
            let same = match (old_state, new_state) {
                (Some(o), Some(n)) => o.content_hash == n.content_hash,
                (None, None) => true,
                _ => false,
            };
            if same {
                continue;
            }

            let old_text = match old_state {
                Some(state) => self.stored_text(path, state)?,
                None => Some(String::new()),
            };
            let new_text = match new_state {
                Some(state) => self.stored_text(path, state)?,
                None => Some(String::new()),
            };
            match (old_text, new_text) {
                (Some(old), Some(new)) => {
                    let hunks = diff(&old, &new, context);
                    if !hunks.is_empty() {
                        out.push(FileDiff {
                            path: path.clone(),
                            is_binary: false,
                            hunks,
                        });
                    }
                }
                _ => out.push(FileDiff {
                    path: path.clone(),
                    is_binary: true,
                    hunks: Vec::new(),
                }),
            }
        }
        Ok(out)
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    fn write_workdir_file(&self, path: &str, content: &FileContent) -> Result<(), MergeError> {
        let abs = self.root.join(path);
        if let Some(parent) = abs.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&abs, content.as_bytes())?;
        Ok(())
    }

    /// Begin merging `remote_commit` (which must exist in the local store)
    /// into HEAD.
    ///
    /// Clean decisions are applied to the working copy and staged; if no
    /// path conflicts, the merge commit is created immediately. Conflicted
    /// paths are materialized with conflict markers and recorded in the
    /// merge state for later resolution.
    pub fn merge(&self, remote_commit: &str) -> Result<MergeOutcome, CoreError> {
        let mut merge_state = self.merge_state()?;
        if merge_state.state.in_progress {
            return Err(MergeError::AlreadyInProgress {
                remote: merge_state
                    .state
                    .remote_name
                    .clone()
                    .unwrap_or_else(|| self.config.remote.name.clone()),
            }
            .into());
        }

        let head = self.db.head()?.ok_or(MergeError::EmptyRepository)?;
        // The remote commit must be resolvable locally.
        self.db.commit(remote_commit).map_err(MergeError::from)?;

        let remote_name = self.config.remote.name.clone();
        let ancestor = {
            let conn = self.db.conn();
            common_ancestor(&conn, &head, remote_commit)?
        };
        info!(local = %head, remote = %remote_commit, %ancestor, "starting merge");

        let local_tree = self.tree_at(&head)?;
        let remote_tree = self.tree_at(remote_commit)?;
        let ancestor_tree = self.tree_at(&ancestor)?;

        let mut paths: std::collections::BTreeSet<&String> = local_tree.keys().collect();
        paths.extend(remote_tree.keys());
        paths.extend(ancestor_tree.keys());

        let mut index = self.index().map_err(MergeError::from)?;
        let mut conflicted = Vec::new();
        for path in paths {
            let decision = merge::decide(
                ancestor_tree.get(path),
                local_tree.get(path),
                remote_tree.get(path),
            );
            match decision {
                MergeDecision::KeepLocal | MergeDecision::NoOp => {}
                MergeDecision::TakeRemote(state) => {
                    let content = self
                        .file_at(remote_commit, path)?
                        .ok_or_else(|| crate::errors::DatabaseError::NotFound {
                            entity: "content version".into(),
                            id: format!("{remote_commit}:{path}"),
                        })
                        .map_err(MergeError::from)?;
                    self.write_workdir_file(path, &content)
                        .map_err(MergeError::from)?;
                    let status = if local_tree.contains_key(path) {
                        StageStatus::Modified
                    } else {
                        StageStatus::Added
                    };
                    index.stage(path, status);
                    debug!(path, version = state.version_id, "took remote state");
                }
                MergeDecision::DeleteLocal => {
                    let abs = self.root.join(path);
                    if abs.exists() {
                        std::fs::remove_file(&abs).map_err(MergeError::from)?;
                    }
                    index.stage(path, StageStatus::Deleted);
                    debug!(path, "applied remote deletion");
                }
                MergeDecision::Conflict => {
                    let local_text = self.conflict_side_text(&local_tree, &head, path)?;
                    let remote_text =
                        self.conflict_side_text(&remote_tree, remote_commit, path)?;
                    let marked = merge::conflict_file(&local_text, &remote_text, &remote_name);
                    self.write_workdir_file(path, &FileContent::Text(marked))
                        .map_err(MergeError::from)?;
                    conflicted.push(path.clone());
                    warn!(path, "merge conflict");
                }
            }
        }
        index.save().map_err(MergeError::from)?;

        merge_state.state = MergeState {
            in_progress: true,
            remote_name: Some(remote_name.clone()),
            remote_commit: Some(remote_commit.to_string()),
            local_commit: Some(head),
            ancestor_commit: Some(ancestor),
            conflicted: conflicted.iter().cloned().collect(),
        };
        merge_state.save().map_err(MergeError::from)?;

        if conflicted.is_empty() {
            self.merge_complete(None)
        } else {
            Ok(MergeOutcome::Conflicted(conflicted))
        }
    }

    /// A conflict side rendered as text. Binary content falls back to its
    /// hash so the marker file stays text.
    fn conflict_side_text(
        &self,
        tree: &BTreeMap<String, FileState>,
        commit_id: &str,
        path: &str,
    ) -> Result<String, CoreError> {
        let Some(state) = tree.get(path) else {
            return Ok(String::new());
        };
        match self.file_at(commit_id, path)? {
            Some(FileContent::Text(text)) => Ok(text),
            Some(FileContent::Binary(_)) | None => Ok(format!("(binary: {})", state.content_hash)),
        }
    }

    /// Mark one conflicted path as resolved. The working-copy content (as
    /// edited by the operator) is staged for the merge commit.
    pub fn merge_resolve(&self, path: &str) -> Result<(), CoreError> {
        let mut merge_state = self.merge_state()?;
        if !merge_state.state.in_progress {
            return Err(MergeError::NotInProgress.into());
        }
        if !merge_state.state.conflicted.remove(path) {
            return Err(MergeError::NotConflicted(path.to_string()).into());
        }

        let abs = self.root.join(path);
        let mut index = self.index().map_err(MergeError::from)?;
        if abs.exists() {
            let status = match merge_state
                .state
                .local_commit
                .as_deref()
                .map(|c| self.tree_at(c))
                .transpose()?
            {
                Some(tree) if tree.contains_key(path) => StageStatus::Modified,
                _ => StageStatus::Added,
            };
            index.stage(path, status);
        } else {
            // The operator resolved by deleting the file.
            index.stage(path, StageStatus::Deleted);
        }
        index.save().map_err(MergeError::from)?;
        merge_state.save().map_err(MergeError::from)?;
        info!(path, remaining = merge_state.state.conflicted.len(), "resolved conflict");
        Ok(())
    }

    /// Complete an in-progress merge: commit the staged result and record
    /// the merged remote commit in `sync_state`.
    pub fn merge_complete(&self, message: Option<&str>) -> Result<MergeOutcome, CoreError> {
        let mut merge_state = self.merge_state()?;
        if !merge_state.state.in_progress {
            return Err(MergeError::NotInProgress.into());
        }
        if !merge_state.state.conflicted.is_empty() {
            return Err(MergeError::UnresolvedConflicts {
                count: merge_state.state.conflicted.len(),
            }
            .into());
        }

        let remote_name = merge_state
            .state
            .remote_name
            .clone()
            .unwrap_or_else(|| self.config.remote.name.clone());
        let remote_commit = merge_state.state.remote_commit.clone();

        let mut index = self.index().map_err(MergeError::from)?;
        let outcome = if index.is_empty() {
            info!(remote = %remote_name, "merge introduced no changes");
            MergeOutcome::UpToDate
        } else {
            let default_message = format!(
                "Merge remote '{remote_name}' at {}",
                remote_commit.as_deref().unwrap_or("unknown")
            );
            let identity = ConfigIdentity::new(&self.config);
            let commit = create_commit(
                &self.db,
                &self.root,
                &mut index,
                &identity,
                message.unwrap_or(&default_message),
            )
            .map_err(MergeError::from)?;
            MergeOutcome::Completed(commit)
        };

        queries::upsert_sync_state(&self.db.conn(), &remote_name, remote_commit.as_deref())
            .map_err(MergeError::from)?;
        merge_state.clear().map_err(MergeError::from)?;
        Ok(outcome)
    }

    /// Abort an in-progress merge, restoring the working copy to the local
    /// commit's state for every path the merge touched.
    pub fn merge_abort(&self) -> Result<(), CoreError> {
        let mut merge_state = self.merge_state()?;
        if !merge_state.state.in_progress {
            return Err(MergeError::NotInProgress.into());
        }

        let local = merge_state.state.local_commit.clone();
        let remote = merge_state.state.remote_commit.clone();
        let ancestor = merge_state.state.ancestor_commit.clone();

        if let (Some(local), Some(remote), Some(ancestor)) = (local, remote, ancestor) {
            let local_tree = self.tree_at(&local)?;
            let remote_tree = self.tree_at(&remote)?;
            let ancestor_tree = self.tree_at(&ancestor)?;

            let mut paths: std::collections::BTreeSet<&String> = local_tree.keys().collect();
            paths.extend(remote_tree.keys());
            paths.extend(ancestor_tree.keys());

            // Undo every path the merge wrote or deleted.
            for path in paths {
                let touched = !matches!(
                    merge::decide(
                        ancestor_tree.get(path),
                        local_tree.get(path),
                        remote_tree.get(path),
                    ),
                    MergeDecision::KeepLocal | MergeDecision::NoOp
                );
                if !touched {
                    continue;
                }
                match self.file_at(&local, path)? {
                    Some(content) => {
                        self.write_workdir_file(path, &content)
                            .map_err(MergeError::from)?;
                    }
                    None => {
                        let abs = self.root.join(path);
                        if abs.exists() {
                            std::fs::remove_file(&abs).map_err(MergeError::from)?;
                        }
                    }
                }
            }
        }

        self.clear_stage()?;
        merge_state.clear().map_err(MergeError::from)?;
        info!("merge aborted");
        Ok(())
    }
}
