//! Content-addressing primitives.
//!
//! SHA-256 is used for both per-file content hashes and the per-commit tree
//! hash. The tree hash is a digest over the sorted `(mode, path,
//! content_hash)` triples of the fully resolved tree, so two commits with
//! identical resolved trees always carry the same `tree_hash` regardless of
//! the order their entries were assembled in.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::models::FileState;

/// Hex-encoded SHA-256 of raw content bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Deterministic digest over a resolved tree.
///
/// The map is keyed by path, so iteration order is already sorted; each
/// entry contributes `"<mode:o> <path>\0<content_hash>\n"` to the digest.
pub fn tree_hash(tree: &BTreeMap<String, FileState>) -> String {
    let mut hasher = Sha256::new();
    for (path, state) in tree {
        hasher.update(format!("{:06o} {}\0{}\n", state.mode, path, state.content_hash));
    }
    hex::encode(hasher.finalize())
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
    fn test_content_hash_is_sha256_hex() {
        let h = content_hash(b"hello");
        assert_eq!(h.len(), 64);
        assert_eq!(
            h,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_tree_hash_insertion_order_independent() {
        let mut a = BTreeMap::new();
        a.insert("b.txt".to_string(), state("h2"));
        a.insert("a.txt".to_string(), state("h1"));

        let mut b = BTreeMap::new();
        b.insert("a.txt".to_string(), state("h1"));
        b.insert("b.txt".to_string(), state("h2"));

        assert_eq!(tree_hash(&a), tree_hash(&b));
    }

    #[test]
    fn test_tree_hash_sensitive_to_content() {
        let mut a = BTreeMap::new();
        a.insert("a.txt".to_string(), state("h1"));
        let mut b = BTreeMap::new();
        b.insert("a.txt".to_string(), state("h2"));
        assert_ne!(tree_hash(&a), tree_hash(&b));
    }

    #[test]
    fn test_empty_tree_hash_is_stable() {
        let empty: BTreeMap<String, FileState> = BTreeMap::new();
        assert_eq!(tree_hash(&empty), tree_hash(&BTreeMap::new()));
    }
}
