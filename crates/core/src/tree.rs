//! Tree resolution and commit-graph ancestry.
//!
//! Commits store sparse deltas: a `file_refs` row exists only for the paths
//! a commit touched. [`resolve_tree`] reconstructs the full snapshot visible
//! at a commit by walking the parent chain and taking, for each group, the
//! nearest row on that walk. The walk stops early once every group ever
//! interned has been decided, turning an O(commits) history into an
//! O(groups touched) snapshot.

use std::collections::{BTreeMap, HashMap, HashSet};

use rusqlite::Connection;
use tracing::{debug, trace};

use crate::db::queries;
use crate::errors::{DatabaseError, MergeError};
use crate::models::FileState;

/// Reconstruct the full set of visible files at `commit_id`.
///
/// A tombstone row (nil content hash) decides its group as deleted; the
/// path is absent from the result. A visited-set guards against corrupt
/// (cyclic) chains.
pub fn resolve_tree(
    conn: &Connection,
    commit_id: &str,
) -> Result<BTreeMap<String, FileState>, DatabaseError> {
    let total_groups = queries::group_count(conn)? as usize;

    // group_id -> Some(state) | None (deleted). First row seen on the walk
    // wins; later (older) rows for the same group are superseded history.
    let mut decided: HashMap<i64, Option<FileState>> = HashMap::new();
    let mut visited: HashSet<String> = HashSet::new();
    let mut current = Some(commit_id.to_string());

    while let Some(id) = current {
        if !visited.insert(id.clone()) {
            return Err(DatabaseError::CorruptChain(id));
        }
        for row in queries::file_refs_for_commit(conn, &id)? {
            if decided.contains_key(&row.group_id) {
                continue;
            }
            let state = if row.is_tombstone() {
                None
            } else {
                Some(FileState {
                    // A non-tombstone row always carries a version pointer.
                    version_id: row.version_id.unwrap_or(0),
                    content_hash: row.content_hash.clone().unwrap_or_default(),
                    mode: row.mode,
                    is_symlink: row.is_symlink,
                    symlink_target: row.symlink_target.clone(),
                    is_binary: row.is_binary,
                })
            };
            decided.insert(row.group_id, state);
        }
        if decided.len() >= total_groups {
            trace!(commit = %id, "all groups decided, stopping walk early");
            break;
        }
        current = queries::parent_of(conn, &id)?;
    }

    let mut tree = BTreeMap::new();
    for (group_id, state) in decided {
        if let Some(state) = state {
            let path = queries::path_for_group(conn, group_id)?;
            tree.insert(path, state);
        }
    }
    debug!(commit = commit_id, files = tree.len(), "resolved tree");
    Ok(tree)
}

/// Nearest common ancestor of two commits.
///
/// Collects the full ancestor set of `local` (bounded by chain length),
/// then walks `remote` from its tip; the first id found in the set is the
/// nearest common ancestor. Disjoint histories are fatal for merge
/// purposes.
pub fn common_ancestor(
    conn: &Connection,
    local: &str,
    remote: &str,
) -> Result<String, MergeError> {
    let mut local_ancestors: HashSet<String> = HashSet::new();
    let mut current = Some(local.to_string());
    while let Some(id) = current {
        if !local_ancestors.insert(id.clone()) {
            return Err(DatabaseError::CorruptChain(id).into());
        }
        current = queries::parent_of(conn, &id)?;
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut current = Some(remote.to_string());
    while let Some(id) = current {
        if local_ancestors.contains(&id) {
            debug!(local, remote, ancestor = %id, "found common ancestor");
            return Ok(id);
        }
        if !visited.insert(id.clone()) {
            return Err(DatabaseError::CorruptChain(id).into());
        }
        current = queries::parent_of(conn, &id)?;
    }

    Err(MergeError::NoCommonAncestor {
        local: local.to_string(),
        remote: remote.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::queries::{
        advance_ref_if, insert_commit, insert_file_ref, intern_path, put_version, FileRefRow,
        VersionPayload, HEAD_REF,
    };
    use crate::db::Database;
    use crate::models::{CommitInfo, Signature, MODE_FILE};
    use chrono::Utc;

    fn sig() -> Signature {
        Signature {
            name: "Test".into(),
            email: "test@example.com".into(),
            timestamp: Utc::now(),
        }
    }

    fn commit(conn: &Connection, id: &str, parent: Option<&str>) {
        insert_commit(
            conn,
            &CommitInfo {
                id: id.into(),
                parent_id: parent.map(String::from),
                tree_hash: "tree".into(),
                message: id.into(),
                author: sig(),
                committer: sig(),
            },
        )
        .unwrap();
    }

    fn touch(conn: &Connection, commit_id: &str, path: &str, content: &str) {
        let group = intern_path(conn, path).unwrap();
        let hash = crate::hash::content_hash(content.as_bytes());
        let version = put_version(conn, group, VersionPayload::Text(content), &hash).unwrap();
        insert_file_ref(
            conn,
            &FileRefRow {
                group_id: group,
                commit_id: commit_id.into(),
                version_id: Some(version),
                content_hash: Some(hash),
                mode: MODE_FILE,
                is_symlink: false,
                symlink_target: None,
                is_binary: false,
            },
        )
        .unwrap();
    }

    fn tombstone(conn: &Connection, commit_id: &str, path: &str) {
        let group = intern_path(conn, path).unwrap();
        insert_file_ref(
            conn,
            &FileRefRow {
                group_id: group,
                commit_id: commit_id.into(),
                version_id: None,
                content_hash: None,
                mode: 0,
                is_symlink: false,
                symlink_target: None,
                is_binary: false,
            },
        )
        .unwrap();
    }

    #[test]
    fn test_resolve_tree_takes_nearest_ancestor_state() {
        // C1 adds a.txt="1"; C2 adds b.txt="1"; C3 modifies a.txt="2".
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "c1", None);
        touch(&conn, "c1", "a.txt", "1");
        commit(&conn, "c2", Some("c1"));
        touch(&conn, "c2", "b.txt", "1");
        commit(&conn, "c3", Some("c2"));
        touch(&conn, "c3", "a.txt", "2");

        let tree = resolve_tree(&conn, "c3").unwrap();
        assert_eq!(tree.len(), 2);
        assert_eq!(
            tree["a.txt"].content_hash,
            crate::hash::content_hash(b"2")
        );
        assert_eq!(
            tree["b.txt"].content_hash,
            crate::hash::content_hash(b"1")
        );

        // At C1 only a.txt="1" is visible.
        let tree = resolve_tree(&conn, "c1").unwrap();
        assert_eq!(tree.len(), 1);
        assert_eq!(
            tree["a.txt"].content_hash,
            crate::hash::content_hash(b"1")
        );
    }

    #[test]
    fn test_resolve_tree_tombstone_removes_path() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "c1", None);
        touch(&conn, "c1", "a.txt", "1");
        touch(&conn, "c1", "b.txt", "1");
        commit(&conn, "c2", Some("c1"));
        tombstone(&conn, "c2", "a.txt");

        let tree = resolve_tree(&conn, "c2").unwrap();
        assert_eq!(tree.len(), 1);
        assert!(!tree.contains_key("a.txt"));
        assert!(tree.contains_key("b.txt"));

        // The group and its history survive for time-travel queries.
        let tree = resolve_tree(&conn, "c1").unwrap();
        assert!(tree.contains_key("a.txt"));
    }

    #[test]
    fn test_resolve_tree_sparse_long_history() {
        // One path touched at the root, then many commits that leave it
        // alone. The nearest-row rule must still find the root's state.
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "c0", None);
        touch(&conn, "c0", "stable.txt", "root");
        let mut parent = "c0".to_string();
        for i in 1..50 {
            let id = format!("c{i}");
            commit(&conn, &id, Some(&parent));
            touch(&conn, &id, &format!("f{i}.txt"), "x");
            parent = id;
        }

        let tree = resolve_tree(&conn, &parent).unwrap();
        assert_eq!(tree.len(), 50);
        assert_eq!(
            tree["stable.txt"].content_hash,
            crate::hash::content_hash(b"root")
        );
    }

    #[test]
    fn test_resolve_tree_empty_commit_graph() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "c1", None);
        let tree = resolve_tree(&conn, "c1").unwrap();
        assert!(tree.is_empty());
    }

    #[test]
    fn test_common_ancestor_linear() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "c1", None);
        commit(&conn, "c2", Some("c1"));
        commit(&conn, "c3", Some("c2"));

        // One chain is a prefix of the other: the tip of the shorter chain
        // is the ancestor.
        assert_eq!(common_ancestor(&conn, "c3", "c2").unwrap(), "c2");
        assert_eq!(common_ancestor(&conn, "c2", "c3").unwrap(), "c2");
        assert_eq!(common_ancestor(&conn, "c3", "c3").unwrap(), "c3");
    }

    #[test]
    fn test_common_ancestor_forked() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "base", None);
        commit(&conn, "l1", Some("base"));
        commit(&conn, "l2", Some("l1"));
        commit(&conn, "r1", Some("base"));

        assert_eq!(common_ancestor(&conn, "l2", "r1").unwrap(), "base");
        assert_eq!(common_ancestor(&conn, "r1", "l2").unwrap(), "base");
    }

    #[test]
    fn test_common_ancestor_disjoint_histories() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "a1", None);
        commit(&conn, "b1", None);
        commit(&conn, "b2", Some("b1"));

        let err = common_ancestor(&conn, "a1", "b2").unwrap_err();
        assert!(matches!(err, MergeError::NoCommonAncestor { .. }));
    }

    #[test]
    fn test_head_ref_integration() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn();
        commit(&conn, "c1", None);
        touch(&conn, "c1", "a.txt", "1");
        advance_ref_if(&conn, HEAD_REF, None, "c1").unwrap();

        let head = crate::db::queries::get_ref(&conn, HEAD_REF).unwrap().unwrap();
        let tree = resolve_tree(&conn, &head).unwrap();
        assert_eq!(tree.len(), 1);
    }
}
