//! Per-repository exclusion ledger.
//!
//! Maps a PR number to the reason it failed conclusively. A PR in the ledger
//! is never processed again. Entries are never removed or overwritten.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::{StateError, read_json, write_json_atomic};

/// Durable map of PR number to failure reason.
#[derive(Debug)]
pub struct ExclusionLedger {
    path: PathBuf,
    entries: IndexMap<u64, String>,
}

impl ExclusionLedger {
    /// Load the ledger at `path`. A missing file is an empty ledger; the file
    /// is only created on the first [`record`](Self::record).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let entries = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, pr_number: u64) -> bool {
        self.entries.contains_key(&pr_number)
    }

    pub fn reason(&self, pr_number: u64) -> Option<&str> {
        self.entries.get(&pr_number).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record a conclusive failure and rewrite the file.
    ///
    /// A PR that is already present keeps its first reason.
    pub fn record(&mut self, pr_number: u64, reason: impl Into<String>) -> Result<(), StateError> {
        if self.entries.contains_key(&pr_number) {
            return Ok(());
        }
        self.entries.insert(pr_number, reason.into());
        write_json_atomic(&self.path, &self.entries)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u64, &str)> {
        self.entries.iter().map(|(n, r)| (*n, r.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty_and_not_created() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("exclude_prs_repo.json");
        let ledger = ExclusionLedger::load(&path).unwrap();
        assert!(ledger.is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn record_persists_across_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/exclude_prs_repo.json");

        let mut ledger = ExclusionLedger::load(&path).unwrap();
        ledger.record(12, "build failed at commit 2 (abc)").unwrap();
        ledger.record(3, "scan failed at commit 1 (def)").unwrap();

        let reloaded = ExclusionLedger::load(&path).unwrap();
        assert!(reloaded.contains(12));
        assert_eq!(reloaded.reason(3), Some("scan failed at commit 1 (def)"));
        let order: Vec<u64> = reloaded.iter().map(|(n, _)| n).collect();
        assert_eq!(order, vec![12, 3]);
    }

    #[test]
    fn first_reason_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut ledger = ExclusionLedger::load(dir.path().join("l.json")).unwrap();
        ledger.record(1, "first").unwrap();
        ledger.record(1, "second").unwrap();
        assert_eq!(ledger.reason(1), Some("first"));
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn file_uses_string_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l.json");
        let mut ledger = ExclusionLedger::load(&path).unwrap();
        ledger.record(42, "reason").unwrap();
        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["42"], "reason");
    }
}
