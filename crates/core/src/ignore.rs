//! Path filtering for staging and working-directory scans.
//!
//! Patterns come from `[core] ignore` in the repository config and are
//! matched with `glob-match` against the repository-relative path. The
//! `.relic` metadata directory is always excluded.

use glob_match::glob_match;
use tracing::trace;

/// Decides which paths are excluded from staging and status scans.
pub trait PathFilter {
    fn is_ignored(&self, path: &str, is_dir: bool) -> bool;
}

/// Glob-pattern filter over repository-relative paths.
#[derive(Debug, Clone, Default)]
pub struct GlobFilter {
    patterns: Vec<String>,
}

impl GlobFilter {
    pub fn new(patterns: Vec<String>) -> Self {
        Self { patterns }
    }
}

impl PathFilter for GlobFilter {
    fn is_ignored(&self, path: &str, is_dir: bool) -> bool {
        if path == ".relic" || path.starts_with(".relic/") {
            return true;
        }
        for pattern in &self.patterns {
            // A trailing slash restricts the pattern to directories.
            let (pattern, dir_only) = match pattern.strip_suffix('/') {
                Some(p) => (p, true),
                None => (pattern.as_str(), false),
            };
            if dir_only && !is_dir {
                continue;
            }
            if glob_match(pattern, path) {
                trace!(path, pattern, "path ignored");
                return true;
            }
            // A bare name pattern also matches anywhere in the tree.
            if !pattern.contains('/') && glob_match(&format!("**/{pattern}"), path) {
                trace!(path, pattern, "path ignored");
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_dir_always_ignored() {
        let filter = GlobFilter::default();
        assert!(filter.is_ignored(".relic", true));
        assert!(filter.is_ignored(".relic/relic.db", false));
        assert!(!filter.is_ignored("src/main.rs", false));
    }

    #[test]
    fn test_glob_patterns() {
        let filter = GlobFilter::new(vec!["*.tmp".into(), "build/**".into()]);
        assert!(filter.is_ignored("scratch.tmp", false));
        assert!(filter.is_ignored("deep/nested/scratch.tmp", false));
        assert!(filter.is_ignored("build/out.o", false));
        assert!(!filter.is_ignored("src/lib.rs", false));
    }

    #[test]
    fn test_directory_only_pattern() {
        let filter = GlobFilter::new(vec!["target/".into()]);
        assert!(filter.is_ignored("target", true));
        assert!(!filter.is_ignored("target", false));
    }

    #[test]
    fn test_bare_name_matches_nested() {
        let filter = GlobFilter::new(vec!["node_modules".into()]);
        assert!(filter.is_ignored("node_modules", true));
        assert!(filter.is_ignored("web/node_modules", true));
    }
}
