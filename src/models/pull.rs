//! Pull-request records: as mined, and after lineage resolution.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commit::{LineageCommit, RawCommit};

/// A merged pull request as returned by the mining stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawPullRequest {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub additions: u64,
    #[serde(default)]
    pub deletions: u64,
    #[serde(default)]
    pub changed_files: u64,
    /// Total commit count reported by the hosting service. May exceed
    /// `commits.len()` when the PR has more commits than were mined.
    #[serde(default)]
    pub commits_total: u64,
    /// Commits in chronological ascending order.
    pub commits: Vec<RawCommit>,
}

/// One entry of a pull request's changed-file listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullFile {
    pub filename: String,
    /// Set when the file was renamed or moved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_filename: Option<String>,
}

/// A file rename recorded by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MovedFile {
    pub old_path: String,
    pub new_path: String,
}

/// A pull request with its analyzable lineage resolved.
///
/// Invariants (established by the `lineage` module):
/// - `pr_commit` is a member of `commits`.
/// - `start_commit` is the single parent of `pr_commit` when
///   `is_pr_commit_first`, otherwise the commit preceding it in `commits`.
/// - Only the last entry of `commits` may be a merge artifact, and if it is,
///   it is not `pr_commit`.
/// - `changed_files` is non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub commits: Vec<LineageCommit>,
    pub pr_commit: String,
    pub start_commit: String,
    pub is_pr_commit_first: bool,
    pub changed_files: BTreeSet<String>,
    #[serde(default)]
    pub moved_files: Vec<MovedFile>,
}

impl PullRequest {
    /// Key of the remote analysis project dedicated to this PR.
    pub fn project_key(&self, repo: &str) -> String {
        project_key(repo, self.number)
    }
}

/// Key of the remote analysis project for `repo` and PR `number`.
pub fn project_key(repo: &str, number: u64) -> String {
    format!("{repo}-{number}")
}
