//! Identification of the PR-defining commit.

use chrono::{DateTime, Utc};

use super::LineageError;
use crate::models::{Commit, RawPullRequest};

/// A pull request whose defining commit has been identified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentifiedPull {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    /// Commits in chronological ascending order.
    pub commits: Vec<Commit>,
    /// Sha of the commit that opened the pull request.
    pub pr_commit: String,
}

/// Classify every commit and pick the PR-defining commit.
///
/// Commits are scanned in the order given. The defining commit is the last
/// one whose committer timestamp is strictly earlier than the PR creation
/// time. A commit is a merge artifact when it has more than one parent.
pub fn identify_pr_commit(pull: RawPullRequest) -> Result<IdentifiedPull, LineageError> {
    let created_at = pull.created_at;
    let commits: Vec<Commit> = pull.commits.into_iter().map(Commit::from).collect();

    let pr_commit = commits
        .iter()
        .rev()
        .find(|c| c.created_at < created_at)
        .map(|c| c.sha.clone())
        .ok_or(LineageError::UndecidableLineage)?;

    Ok(IdentifiedPull {
        number: pull.number,
        created_at,
        commits,
        pr_commit,
    })
}
