//! The staging index.
//!
//! An ephemeral `path -> status` map persisted as JSON in the working
//! copy's `.relic/index.json`. One entry per path, last write wins. The
//! index is cleared atomically after a successful commit; saves go through
//! a temp-file rename so a crash never leaves a half-written index.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::StageError;
use crate::models::StageStatus;

/// Serialized shape of the index file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexData {
    #[serde(default)]
    entries: BTreeMap<String, StageStatus>,
}

/// The staging index, bound to its backing file.
#[derive(Debug)]
pub struct StagingIndex {
    path: PathBuf,
    data: IndexData,
}

impl StagingIndex {
    /// Load the index from `path`, starting empty if the file is absent.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, StageError> {
        let path = path.as_ref().to_path_buf();
        let data = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents).map_err(|e| StageError::ParseError(e.to_string()))?
        } else {
            IndexData::default()
        };
        Ok(Self { path, data })
    }

    /// Persist the index via write-to-temp-then-rename.
    pub fn save(&self) -> Result<(), StageError> {
        let contents = serde_json::to_string_pretty(&self.data)
            .map_err(|e| StageError::ParseError(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, contents)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(entries = self.data.entries.len(), "saved staging index");
        Ok(())
    }

    /// Stage a path with the given status. Last write wins.
    pub fn stage(&mut self, path: &str, status: StageStatus) {
        self.data.entries.insert(path.to_string(), status);
    }

    /// Remove a single path from the index.
    pub fn unstage(&mut self, path: &str) -> Result<(), StageError> {
        if self.data.entries.remove(path).is_none() {
            return Err(StageError::NotStaged(path.to_string()));
        }
        Ok(())
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.data.entries.clear();
    }

    /// Clear and persist in one step (used after a successful commit).
    pub fn clear_and_save(&mut self) -> Result<(), StageError> {
        self.clear();
        self.save()
    }

    pub fn is_empty(&self) -> bool {
        self.data.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.entries.len()
    }

    /// Status of a staged path, if present.
    pub fn status(&self, path: &str) -> Option<StageStatus> {
        self.data.entries.get(path).copied()
    }

    /// Iterate entries in path order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, StageStatus)> {
        self.data.entries.iter().map(|(p, s)| (p.as_str(), *s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index_in(dir: &tempfile::TempDir) -> StagingIndex {
        StagingIndex::load(dir.path().join("index.json")).unwrap()
    }

    #[test]
    fn test_empty_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let index = index_in(&dir);
        assert!(index.is_empty());
    }

    #[test]
    fn test_stage_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(&dir);
        index.stage("a.txt", StageStatus::Added);
        index.stage("b.txt", StageStatus::Deleted);
        index.save().unwrap();

        let reloaded = index_in(&dir);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.status("a.txt"), Some(StageStatus::Added));
        assert_eq!(reloaded.status("b.txt"), Some(StageStatus::Deleted));
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(&dir);
        index.stage("a.txt", StageStatus::Added);
        index.stage("a.txt", StageStatus::Modified);
        assert_eq!(index.len(), 1);
        assert_eq!(index.status("a.txt"), Some(StageStatus::Modified));
    }

    #[test]
    fn test_unstage() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(&dir);
        index.stage("a.txt", StageStatus::Added);
        index.unstage("a.txt").unwrap();
        assert!(index.is_empty());

        let err = index.unstage("a.txt").unwrap_err();
        assert!(matches!(err, StageError::NotStaged(_)));
    }

    #[test]
    fn test_clear_and_save() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(&dir);
        index.stage("a.txt", StageStatus::Added);
        index.save().unwrap();
        index.clear_and_save().unwrap();

        let reloaded = index_in(&dir);
        assert!(reloaded.is_empty());
    }

    #[test]
    fn test_entries_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = index_in(&dir);
        index.stage("z.txt", StageStatus::Added);
        index.stage("a.txt", StageStatus::Added);
        let paths: Vec<&str> = index.entries().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["a.txt", "z.txt"]);
    }
}
