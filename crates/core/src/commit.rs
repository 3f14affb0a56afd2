//! Commit assembly.
//!
//! Turns the staging index into one immutable commit: content is read from
//! the working copy and classified, versions are appended to each path's
//! chain, and the commit record, its file references, and the HEAD advance
//! all land in a single immediate transaction. HEAD moves by compare-and-
//! swap; if another writer advanced it first the whole commit fails with
//! [`CommitError::ConcurrentModification`] and nothing is persisted.

use std::path::Path;

use tracing::{debug, info};

use crate::db::queries::{self, VersionPayload, HEAD_REF};
use crate::db::Database;
use crate::errors::CommitError;
use crate::hash::{content_hash, tree_hash};
use crate::identity::{resolve_signature, IdentityProvider};
use crate::ids::new_commit_id;
use crate::models::{
    CommitInfo, FileContent, FileState, StageStatus, MODE_EXEC, MODE_FILE, MODE_SYMLINK,
};
use crate::stage::StagingIndex;
use crate::tree::resolve_tree;

/// One staged change with its content already read from the working copy.
#[derive(Debug)]
enum PlannedChange {
    Write {
        path: String,
        content: FileContent,
        content_hash: String,
        mode: u32,
        is_symlink: bool,
        symlink_target: Option<String>,
    },
    Delete {
        path: String,
    },
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    if metadata.permissions().mode() & 0o111 != 0 {
        MODE_EXEC
    } else {
        MODE_FILE
    }
}

#[cfg(not(unix))]
fn file_mode(_metadata: &std::fs::Metadata) -> u32 {
    MODE_FILE
}

/// Read one staged path from the working copy. Symlinks are recorded by
/// their target, not followed.
fn plan_write(workdir: &Path, path: &str) -> Result<PlannedChange, CommitError> {
    let abs = workdir.join(path);
    let metadata = std::fs::symlink_metadata(&abs)
        .map_err(|_| CommitError::StagedFileMissing(path.to_string()))?;

    if metadata.file_type().is_symlink() {
        let target = std::fs::read_link(&abs)?;
        let target = target.to_string_lossy().into_owned();
        let hash = content_hash(target.as_bytes());
        return Ok(PlannedChange::Write {
            path: path.to_string(),
            content: FileContent::Text(target.clone()),
            content_hash: hash,
            mode: MODE_SYMLINK,
            is_symlink: true,
            symlink_target: Some(target),
        });
    }

    let bytes = std::fs::read(&abs)?;
    let hash = content_hash(&bytes);
    Ok(PlannedChange::Write {
        path: path.to_string(),
        content: FileContent::classify(bytes),
        content_hash: hash,
        mode: file_mode(&metadata),
        is_symlink: false,
        symlink_target: None,
    })
}

/// Assemble and persist one commit from the staging index.
///
/// Identity is validated before any content is read. On success the index
/// is cleared and saved; on any failure the index and the store are left
/// untouched.
pub fn create_commit(
    db: &Database,
    workdir: &Path,
    index: &mut StagingIndex,
    identity: &dyn IdentityProvider,
    message: &str,
) -> Result<CommitInfo, CommitError> {
    let signature = resolve_signature(identity)?;

    if index.is_empty() {
        return Err(CommitError::NothingStaged);
    }

    // Read and classify all content up front so the write transaction
    // stays short.
    let mut plan = Vec::new();
    for (path, status) in index.entries() {
        match status {
            StageStatus::Added | StageStatus::Modified => {
                plan.push(plan_write(workdir, path)?);
            }
            StageStatus::Deleted => {
                plan.push(PlannedChange::Delete {
                    path: path.to_string(),
                });
            }
        }
    }

    let commit = db.write_transaction(|conn| {
        let parent_id = queries::get_ref(conn, HEAD_REF)?;
        let mut tree = match &parent_id {
            Some(parent) => resolve_tree(conn, parent)?,
            None => Default::default(),
        };

        let commit_id = new_commit_id();
        let mut file_refs = Vec::with_capacity(plan.len());
        for change in &plan {
            match change {
                PlannedChange::Write {
                    path,
                    content,
                    content_hash,
                    mode,
                    is_symlink,
                    symlink_target,
                } => {
                    let group_id = queries::intern_path(conn, path)?;
                    let payload = match content {
                        FileContent::Text(text) => VersionPayload::Text(text),
                        FileContent::Binary(bytes) => VersionPayload::Binary(bytes),
                    };
                    let version_id = queries::put_version(conn, group_id, payload, content_hash)?;
                    let state = FileState {
                        version_id,
                        content_hash: content_hash.clone(),
                        mode: *mode,
                        is_symlink: *is_symlink,
                        symlink_target: symlink_target.clone(),
                        is_binary: content.is_binary(),
                    };
                    file_refs.push(queries::FileRefRow {
                        group_id,
                        commit_id: commit_id.clone(),
                        version_id: Some(version_id),
                        content_hash: Some(content_hash.clone()),
                        mode: *mode,
                        is_symlink: *is_symlink,
                        symlink_target: symlink_target.clone(),
                        is_binary: content.is_binary(),
                    });
                    tree.insert(path.clone(), state);
                }
                PlannedChange::Delete { path } => {
                    let group_id = queries::intern_path(conn, path)?;
                    file_refs.push(queries::FileRefRow {
                        group_id,
                        commit_id: commit_id.clone(),
                        version_id: None,
                        content_hash: None,
                        mode: 0,
                        is_symlink: false,
                        symlink_target: None,
                        is_binary: false,
                    });
                    tree.remove(path);
                }
            }
        }

        let commit = CommitInfo {
            id: commit_id,
            parent_id: parent_id.clone(),
            tree_hash: tree_hash(&tree),
            message: message.to_string(),
            author: signature.clone(),
            committer: signature.clone(),
        };
        queries::insert_commit(conn, &commit)?;
        for file_ref in &file_refs {
            queries::insert_file_ref(conn, file_ref)?;
        }

        if !queries::advance_ref_if(conn, HEAD_REF, parent_id.as_deref(), &commit.id)? {
            return Err(CommitError::ConcurrentModification {
                reference: HEAD_REF.to_string(),
            });
        }
        debug!(id = %commit.id, files = file_refs.len(), "commit persisted");
        Ok(commit)
    })?;

    index.clear_and_save()?;
    info!(id = %commit.id, message = commit.summary(), "created commit");
    Ok(commit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityProvider;
    use crate::models::StageStatus;

    struct TestIdentity;

    impl IdentityProvider for TestIdentity {
        fn user_name(&self) -> Option<String> {
            Some("Test".into())
        }
        fn user_email(&self) -> Option<String> {
            Some("test@example.com".into())
        }
    }

    struct NoIdentity;

    impl IdentityProvider for NoIdentity {
        fn user_name(&self) -> Option<String> {
            None
        }
        fn user_email(&self) -> Option<String> {
            None
        }
    }

    fn setup() -> (tempfile::TempDir, Database, StagingIndex) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::in_memory().unwrap();
        let index = StagingIndex::load(dir.path().join("index.json")).unwrap();
        (dir, db, index)
    }

    fn write_file(dir: &tempfile::TempDir, name: &str, content: &str) {
        std::fs::write(dir.path().join(name), content).unwrap();
    }

    #[test]
    fn test_commit_advances_head_and_clears_index() {
        let (dir, db, mut index) = setup();
        write_file(&dir, "a.txt", "hello\n");
        index.stage("a.txt", StageStatus::Added);
        index.save().unwrap();

        let commit = create_commit(&db, dir.path(), &mut index, &TestIdentity, "add a").unwrap();
        assert!(commit.parent_id.is_none());
        assert_eq!(db.head().unwrap().as_deref(), Some(commit.id.as_str()));
        assert!(index.is_empty());

        let tree = resolve_tree(&db.conn(), &commit.id).unwrap();
        assert_eq!(tree["a.txt"].content_hash, content_hash(b"hello\n"));
    }

    #[test]
    fn test_empty_index_rejected() {
        let (dir, db, mut index) = setup();
        let err = create_commit(&db, dir.path(), &mut index, &TestIdentity, "m").unwrap_err();
        assert!(matches!(err, CommitError::NothingStaged));
    }

    #[test]
    fn test_identity_checked_before_content() {
        let (dir, db, mut index) = setup();
        // The staged file does not exist on disk, but identity validation
        // must fire first.
        index.stage("ghost.txt", StageStatus::Added);

        let err = create_commit(&db, dir.path(), &mut index, &NoIdentity, "m").unwrap_err();
        assert!(matches!(err, CommitError::MissingIdentity { .. }));
    }

    #[test]
    fn test_staged_file_missing() {
        let (dir, db, mut index) = setup();
        index.stage("ghost.txt", StageStatus::Added);

        let err = create_commit(&db, dir.path(), &mut index, &TestIdentity, "m").unwrap_err();
        assert!(matches!(err, CommitError::StagedFileMissing(_)));
        // Nothing was persisted and the index survives.
        assert!(db.head().unwrap().is_none());
        assert!(!index.is_empty());
    }

    #[test]
    fn test_delete_writes_tombstone() {
        let (dir, db, mut index) = setup();
        write_file(&dir, "a.txt", "one\n");
        write_file(&dir, "b.txt", "two\n");
        index.stage("a.txt", StageStatus::Added);
        index.stage("b.txt", StageStatus::Added);
        let c1 = create_commit(&db, dir.path(), &mut index, &TestIdentity, "add").unwrap();

        index.stage("a.txt", StageStatus::Deleted);
        let c2 = create_commit(&db, dir.path(), &mut index, &TestIdentity, "rm a").unwrap();
        assert_eq!(c2.parent_id.as_deref(), Some(c1.id.as_str()));

        let tree = resolve_tree(&db.conn(), &c2.id).unwrap();
        assert!(!tree.contains_key("a.txt"));
        assert!(tree.contains_key("b.txt"));
    }

    #[test]
    fn test_unchanged_content_reuses_version() {
        let (dir, db, mut index) = setup();
        write_file(&dir, "a.txt", "same\n");
        index.stage("a.txt", StageStatus::Added);
        let c1 = create_commit(&db, dir.path(), &mut index, &TestIdentity, "one").unwrap();

        // Staged again with identical bytes: the version chain must not
        // grow.
        index.stage("a.txt", StageStatus::Modified);
        let c2 = create_commit(&db, dir.path(), &mut index, &TestIdentity, "two").unwrap();

        let conn = db.conn();
        let t1 = resolve_tree(&conn, &c1.id).unwrap();
        let t2 = resolve_tree(&conn, &c2.id).unwrap();
        assert_eq!(t1["a.txt"].version_id, t2["a.txt"].version_id);

        let group = queries::group_for_path(&conn, "a.txt").unwrap().unwrap();
        assert_eq!(queries::versions_for_group(&conn, group).unwrap(), vec![1]);
    }

    #[test]
    fn test_tree_hash_ignores_commit_metadata() {
        let (dir, db, mut index) = setup();
        write_file(&dir, "a.txt", "x\n");
        index.stage("a.txt", StageStatus::Added);
        let c1 = create_commit(&db, dir.path(), &mut index, &TestIdentity, "first").unwrap();

        // A no-op modification yields the same tree hash under a different
        // message and timestamp.
        index.stage("a.txt", StageStatus::Modified);
        let c2 = create_commit(&db, dir.path(), &mut index, &TestIdentity, "second").unwrap();
        assert_eq!(c1.tree_hash, c2.tree_hash);
        assert_ne!(c1.id, c2.id);
    }

    #[test]
    fn test_binary_content_round_trip() {
        let (dir, db, mut index) = setup();
        std::fs::write(dir.path().join("blob.bin"), [0u8, 159, 146, 150]).unwrap();
        index.stage("blob.bin", StageStatus::Added);
        let commit = create_commit(&db, dir.path(), &mut index, &TestIdentity, "bin").unwrap();

        let conn = db.conn();
        let tree = resolve_tree(&conn, &commit.id).unwrap();
        assert!(tree["blob.bin"].is_binary);
        let group = queries::group_for_path(&conn, "blob.bin").unwrap().unwrap();
        let content = queries::get_version(&conn, group, tree["blob.bin"].version_id).unwrap();
        assert_eq!(content.as_bytes(), &[0u8, 159, 146, 150]);
    }

    #[cfg(unix)]
    #[test]
    fn test_executable_bit_recorded() {
        use std::os::unix::fs::PermissionsExt;
        let (dir, db, mut index) = setup();
        let script = dir.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();
        index.stage("run.sh", StageStatus::Added);

        let commit = create_commit(&db, dir.path(), &mut index, &TestIdentity, "x").unwrap();
        let tree = resolve_tree(&db.conn(), &commit.id).unwrap();
        assert_eq!(tree["run.sh"].mode, MODE_EXEC);
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_recorded_by_target() {
        let (dir, db, mut index) = setup();
        write_file(&dir, "target.txt", "t\n");
        std::os::unix::fs::symlink("target.txt", dir.path().join("link")).unwrap();
        index.stage("link", StageStatus::Added);

        let commit = create_commit(&db, dir.path(), &mut index, &TestIdentity, "ln").unwrap();
        let tree = resolve_tree(&db.conn(), &commit.id).unwrap();
        let state = &tree["link"];
        assert!(state.is_symlink);
        assert_eq!(state.mode, MODE_SYMLINK);
        assert_eq!(state.symlink_target.as_deref(), Some("target.txt"));
    }
}
