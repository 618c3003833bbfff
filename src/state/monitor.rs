//! Per-commit wall-clock timing of completed pull requests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;

use super::{StateError, read_json, write_json_atomic};

/// Scratch timing record for the PR currently being processed.
///
/// Only merged into the [`ProgressMonitor`] once every commit succeeded;
/// an aborted PR's timings are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PullTimings {
    durations: IndexMap<String, f64>,
}

impl PullTimings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record how long `commit_sha` took.
    pub fn record(&mut self, commit_sha: impl Into<String>, elapsed: Duration) {
        self.durations.insert(commit_sha.into(), elapsed.as_secs_f64());
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    /// Seconds spent on `commit_sha`, if recorded.
    pub fn get(&self, commit_sha: &str) -> Option<f64> {
        self.durations.get(commit_sha).copied()
    }
}

/// Durable map of PR number to per-commit durations in seconds.
#[derive(Debug)]
pub struct ProgressMonitor {
    path: PathBuf,
    records: IndexMap<u64, IndexMap<String, f64>>,
}

impl ProgressMonitor {
    /// Load the monitoring file at `path`; missing means empty.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StateError> {
        let path = path.into();
        let records = read_json(&path)?.unwrap_or_default();
        Ok(Self { path, records })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, pr_number: u64) -> bool {
        self.records.contains_key(&pr_number)
    }

    pub fn get(&self, pr_number: u64) -> Option<&IndexMap<String, f64>> {
        self.records.get(&pr_number)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Merge the timings of a completed PR and rewrite the file.
    ///
    /// On a failed write the in-memory records are left as they were.
    pub fn commit(&mut self, pr_number: u64, timings: PullTimings) -> Result<(), StateError> {
        let previous = self.records.insert(pr_number, timings.durations);
        let written = write_json_atomic(&self.path, &self.records);
        if written.is_err() {
            match previous {
                Some(durations) => {
                    self.records.insert(pr_number, durations);
                }
                None => {
                    self.records.shift_remove(&pr_number);
                }
            }
        }
        written
    }

    /// Every recorded `(pr, commit, seconds)` triple, in file order.
    pub fn entries(&self) -> impl Iterator<Item = (u64, &str, f64)> + '_ {
        self.records.iter().flat_map(|(pr, durations)| {
            durations
                .iter()
                .map(move |(sha, secs)| (*pr, sha.as_str(), *secs))
        })
    }
}
