//! Per-repository reports over completed pull requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::RawPullRequest;
use crate::state::ProgressMonitor;

/// Size and dates of one completed pull request, as mined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullCharacteristics {
    pub repo: String,
    pub pr_number: u64,
    pub created_at: DateTime<Utc>,
    pub merged_at: Option<DateTime<Utc>>,
    pub additions: u64,
    pub deletions: u64,
    pub changed_files_count: u64,
    pub commits_count: u64,
}

/// One commit's analysis duration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitTiming {
    pub repo: String,
    pub pr_number: u64,
    pub commit_sha: String,
    pub duration_secs: f64,
}

/// Characterize the pull requests numbered in `completed`, in that order.
///
/// Numbers missing from `mined` are logged and skipped.
pub fn characterize(repo: &str, mined: &[RawPullRequest], completed: &[u64]) -> Vec<PullCharacteristics> {
    completed
        .iter()
        .filter_map(|&number| {
            let Some(pull) = mined.iter().find(|p| p.number == number) else {
                warn!(repo, pr = number, "completed pull request missing from mined data");
                return None;
            };
            Some(PullCharacteristics {
                repo: repo.to_string(),
                pr_number: number,
                created_at: pull.created_at,
                merged_at: pull.merged_at,
                additions: pull.additions,
                deletions: pull.deletions,
                changed_files_count: pull.changed_files,
                commits_count: pull.commits_total,
            })
        })
        .collect()
}

/// One row per commit of every pull request in `monitor`.
pub fn flatten_timings(repo: &str, monitor: &ProgressMonitor) -> Vec<CommitTiming> {
    monitor
        .entries()
        .map(|(pr_number, sha, secs)| CommitTiming {
            repo: repo.to_string(),
            pr_number,
            commit_sha: sha.to_string(),
            duration_secs: secs,
        })
        .collect()
}
