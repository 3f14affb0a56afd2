//! Merge coordination: state machine, per-path decisions, and conflict
//! materialization.
//!
//! The state machine is `Idle -> Merging -> {Idle, Conflicted}`;
//! `Conflicted -> Idle` only once every conflicted path has been resolved
//! and committed. Conflicts are data, not errors: a conflicted repository
//! stays fully usable and resumable.
//!
//! Merge resolution produces an ordinary single-parent commit. The remote
//! side of history is acknowledged in `sync_state` rather than by a
//! second parent; the data model has no multi-parent commits.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::MergeError;
use crate::models::FileState;

// ---------------------------------------------------------------------------
// Merge state
// ---------------------------------------------------------------------------

/// Singleton merge bookkeeping, persisted as JSON in
/// `.relic/merge_state.json`. `in_progress == false` implies the conflict
/// set is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeState {
    pub in_progress: bool,
    pub remote_name: Option<String>,
    pub remote_commit: Option<String>,
    pub local_commit: Option<String>,
    pub ancestor_commit: Option<String>,
    #[serde(default)]
    pub conflicted: BTreeSet<String>,
}

impl MergeState {
    /// Load the state from `path`, defaulting to idle if the file is
    /// absent.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<PersistedMergeState, MergeError> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents).map_err(|e| MergeError::ParseError(e.to_string()))?
        } else {
            MergeState::default()
        };
        Ok(PersistedMergeState { path, state })
    }

    /// True iff a merge is in progress and conflicted paths remain.
    pub fn has_conflicts(&self) -> bool {
        self.in_progress && !self.conflicted.is_empty()
    }
}

/// A [`MergeState`] bound to its backing file.
#[derive(Debug)]
pub struct PersistedMergeState {
    path: PathBuf,
    pub state: MergeState,
}

impl PersistedMergeState {
    pub fn save(&self) -> Result<(), MergeError> {
        let contents = serde_json::to_string_pretty(&self.state)
            .map_err(|e| MergeError::ParseError(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    /// Reset to idle and persist. Idempotent: clearing an already-idle
    /// state is a no-op and never errors.
    pub fn clear(&mut self) -> Result<(), MergeError> {
        if !self.state.in_progress && self.state.conflicted.is_empty() {
            return Ok(());
        }
        self.state = MergeState::default();
        self.save()?;
        debug!("cleared merge state");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Per-path decision
// ---------------------------------------------------------------------------

/// What to do with one path when merging remote changes into local.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeDecision {
    /// Remote did not change the path; local state stands.
    KeepLocal,
    /// Only remote changed the path; adopt the remote state.
    TakeRemote(FileState),
    /// Only remote changed the path, and remote deleted it.
    DeleteLocal,
    /// Both sides made the identical change.
    NoOp,
    /// Both sides changed the path to different content.
    Conflict,
}

fn changed(side: Option<&FileState>, ancestor: Option<&FileState>) -> bool {
    match (side, ancestor) {
        (None, None) => false,
        (Some(s), Some(a)) => s.content_hash != a.content_hash,
        _ => true,
    }
}

/// Decide one path from its states at the ancestor, local, and remote
/// commits. Change is judged by content hash (and presence) relative to
/// the common ancestor.
pub fn decide(
    ancestor: Option<&FileState>,
    local: Option<&FileState>,
    remote: Option<&FileState>,
) -> MergeDecision {
    let local_changed = changed(local, ancestor);
    let remote_changed = changed(remote, ancestor);

    match (local_changed, remote_changed) {
        (_, false) => MergeDecision::KeepLocal,
        (false, true) => match remote {
            Some(state) => MergeDecision::TakeRemote(state.clone()),
            None => MergeDecision::DeleteLocal,
        },
        (true, true) => {
            let same = match (local, remote) {
                (Some(l), Some(r)) => l.content_hash == r.content_hash,
                (None, None) => true,
                _ => false,
            };
            if same {
                MergeDecision::NoOp
            } else {
                MergeDecision::Conflict
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Conflict materialization
// ---------------------------------------------------------------------------

fn newline_terminated(content: &str) -> String {
    if content.is_empty() || content.ends_with('\n') {
        content.to_string()
    } else {
        format!("{content}\n")
    }
}

/// Build the conflict-marker file for a both-sides-changed path.
///
/// The format is a bit-exact contract consumed by external tooling:
///
/// ```text
/// <<<<<<< LOCAL
/// <local bytes, newline-terminated>
/// =======
/// <remote bytes, newline-terminated>
/// >>>>>>> REMOTE (<remote-name>)
/// ```
pub fn conflict_file(local: &str, remote: &str, remote_name: &str) -> String {
    format!(
        "<<<<<<< LOCAL\n{}=======\n{}>>>>>>> REMOTE ({})\n",
        newline_terminated(local),
        newline_terminated(remote),
        remote_name,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MODE_FILE;

    fn state(hash: &str) -> FileState {
        FileState {
            version_id: 1,
            content_hash: hash.into(),
            mode: MODE_FILE,
            is_symlink: false,
            symlink_target: None,
            is_binary: false,
        }
    }

    #[test]
    fn test_decide_remote_unchanged() {
        let a = state("x");
        let l = state("y");
        assert_eq!(
            decide(Some(&a), Some(&l), Some(&a)),
            MergeDecision::KeepLocal
        );
        // Path absent everywhere on the remote side of history.
        assert_eq!(decide(None, Some(&l), None), MergeDecision::KeepLocal);
    }

    #[test]
    fn test_decide_only_remote_changed() {
        let a = state("x");
        let r = state("z");
        assert_eq!(
            decide(Some(&a), Some(&a), Some(&r)),
            MergeDecision::TakeRemote(r.clone())
        );
        assert_eq!(
            decide(Some(&a), Some(&a), None),
            MergeDecision::DeleteLocal
        );
        // Remote added a new path.
        assert_eq!(
            decide(None, None, Some(&r)),
            MergeDecision::TakeRemote(r)
        );
    }

    #[test]
    fn test_decide_identical_changes_are_noop() {
        let a = state("x");
        let both = state("y");
        assert_eq!(
            decide(Some(&a), Some(&both), Some(&both)),
            MergeDecision::NoOp
        );
        // Both deleted.
        assert_eq!(decide(Some(&a), None, None), MergeDecision::NoOp);
    }

    #[test]
    fn test_decide_divergent_changes_conflict() {
        let a = state("x");
        let l = state("y");
        let r = state("z");
        assert_eq!(
            decide(Some(&a), Some(&l), Some(&r)),
            MergeDecision::Conflict
        );
        // Edit vs delete is a conflict too.
        assert_eq!(decide(Some(&a), Some(&l), None), MergeDecision::Conflict);
        assert_eq!(decide(Some(&a), None, Some(&r)), MergeDecision::Conflict);
    }

    #[test]
    fn test_conflict_file_format_is_bit_exact() {
        let file = conflict_file("Y", "Z", "origin");
        assert_eq!(
            file,
            "<<<<<<< LOCAL\nY\n=======\nZ\n>>>>>>> REMOTE (origin)\n"
        );
    }

    #[test]
    fn test_conflict_file_preserves_existing_newline() {
        let file = conflict_file("a\nb\n", "c\n", "upstream");
        assert_eq!(
            file,
            "<<<<<<< LOCAL\na\nb\n=======\nc\n>>>>>>> REMOTE (upstream)\n"
        );
    }

    #[test]
    fn test_merge_state_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge_state.json");

        let mut persisted = MergeState::load(&path).unwrap();
        assert!(!persisted.state.in_progress);

        persisted.state.in_progress = true;
        persisted.state.remote_name = Some("origin".into());
        persisted.state.conflicted.insert("a.txt".into());
        persisted.save().unwrap();

        let reloaded = MergeState::load(&path).unwrap();
        assert!(reloaded.state.has_conflicts());
        assert!(reloaded.state.conflicted.contains("a.txt"));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("merge_state.json");

        let mut persisted = MergeState::load(&path).unwrap();
        // Clearing an idle state is a no-op and must not error or create
        // the file.
        persisted.clear().unwrap();
        persisted.clear().unwrap();
        assert!(!path.exists());

        persisted.state.in_progress = true;
        persisted.save().unwrap();
        persisted.clear().unwrap();
        assert!(!persisted.state.in_progress);
        persisted.clear().unwrap();
    }

    #[test]
    fn test_has_conflicts_requires_in_progress() {
        let mut state = MergeState::default();
        state.conflicted.insert("a.txt".into());
        assert!(!state.has_conflicts());
        state.in_progress = true;
        assert!(state.has_conflicts());
    }
}
