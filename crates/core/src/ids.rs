//! Commit identifier generation.
//!
//! Commit ids are ULIDs: 48 bits of wall-clock milliseconds plus 80 bits of
//! randomness, rendered in Crockford base32. Lexicographic order therefore
//! tracks creation order, even across concurrent processes, which is the
//! property the commit graph and the log rely on.

use ulid::Ulid;

/// Generate a fresh commit id.
pub fn new_commit_id() -> String {
    Ulid::new().to_string().to_lowercase()
}
