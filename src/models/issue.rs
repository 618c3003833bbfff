//! Issue and metric types collected from the analysis service.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::pull::MovedFile;

/// Source location of an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextRange {
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub start_offset: u32,
    #[serde(default)]
    pub end_offset: u32,
}

/// A single issue reported by the analysis service for one commit.
///
/// Field names follow the service's wire format so artifacts stay readable
/// by other tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// Stable issue key. The same key across snapshots means the same issue.
    pub key: String,
    pub rule: String,
    pub severity: String,
    /// Repository-relative path of the file the issue is attached to.
    pub component: String,
    pub status: String,
    /// Remediation effort, e.g. `"1h30min"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_range: Option<TextRange>,
}

/// Size and complexity of one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub ncloc: Option<u64>,
    pub complexity: Option<u64>,
}

/// Per-file metrics keyed by repository-relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsByPath(BTreeMap<String, FileMetrics>);

impl MetricsByPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, metrics: FileMetrics) {
        self.0.insert(path.into(), metrics);
    }

    pub fn get(&self, path: &str) -> Option<&FileMetrics> {
        self.0.get(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FileMetrics)> {
        self.0.iter()
    }

    /// Drop every entry whose path is not in `keep`.
    pub fn retain_paths(&mut self, keep: &BTreeSet<String>) {
        self.0.retain(|path, _| keep.contains(path));
    }

    /// Copy metrics across each rename so both paths resolve.
    ///
    /// When only one side of a move has metrics, the other side receives a
    /// copy. Entries present on both sides are left untouched. Additions are
    /// computed against the map as it was before the pass.
    pub fn mirror_renames(&mut self, moved: &[MovedFile]) {
        let mut additions = Vec::new();
        for file in moved {
            match (self.0.get(&file.old_path), self.0.get(&file.new_path)) {
                (Some(old), None) => additions.push((file.new_path.clone(), *old)),
                (None, Some(new)) => additions.push((file.old_path.clone(), *new)),
                _ => {}
            }
        }
        for (path, metrics) in additions {
            self.0.entry(path).or_insert(metrics);
        }
    }

    /// Union `other` into `self`; entries from `other` win on conflict.
    pub fn merge_from(&mut self, other: &MetricsByPath) {
        for (path, metrics) in &other.0 {
            self.0.insert(path.clone(), *metrics);
        }
    }
}

impl FromIterator<(String, FileMetrics)> for MetricsByPath {
    fn from_iter<I: IntoIterator<Item = (String, FileMetrics)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Issues and metrics collected after analyzing one commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSnapshot {
    pub commit_sha: String,
    pub issues: Vec<Issue>,
    pub metrics: MetricsByPath,
}

/// Whether an issue surviving in the PR's final state predates the PR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Origin {
    PreExisting,
    New,
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::PreExisting => write!(f, "PRE_EXISTING"),
            Origin::New => write!(f, "NEW"),
        }
    }
}

/// A classified issue from the final snapshot of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRecord {
    pub repo: String,
    pub pr_number: u64,
    pub key: String,
    pub rule: String,
    pub severity: String,
    pub file: String,
    #[serde(rename = "type")]
    pub issue_type: String,
    pub status: String,
    /// Parsed remediation effort; `None` when absent or malformed.
    pub debt_minutes: Option<u64>,
    pub ncloc_of_file: Option<u64>,
    pub complexity_of_file: Option<u64>,
    pub origin: Origin,
}
