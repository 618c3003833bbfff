//! Resolution of the baseline ("start") commit.

use chrono::{DateTime, Utc};

use super::LineageError;
use super::resolver::IdentifiedPull;
use crate::models::LineageCommit;

/// A pull request with both ends of its analyzable range known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartedPull {
    pub number: u64,
    pub created_at: DateTime<Utc>,
    pub commits: Vec<LineageCommit>,
    pub pr_commit: String,
    pub start_commit: String,
    pub is_pr_commit_first: bool,
}

/// Compute the start commit and drop parent edges.
///
/// When the defining commit opens the list, its single parent becomes the
/// baseline; zero or several parents make the baseline ambiguous. Otherwise
/// the commit immediately preceding the defining commit is the baseline.
pub fn resolve_start(pull: IdentifiedPull) -> Result<StartedPull, LineageError> {
    let position = pull
        .commits
        .iter()
        .position(|c| c.sha == pull.pr_commit)
        .ok_or_else(|| LineageError::MissingPrCommit {
            sha: pull.pr_commit.clone(),
        })?;

    let is_pr_commit_first = position == 0;
    let start_commit = if is_pr_commit_first {
        let defining = &pull.commits[0];
        match defining.parent_shas.as_slice() {
            [parent] => parent.clone(),
            parents => {
                return Err(LineageError::AmbiguousBaseline {
                    sha: defining.sha.clone(),
                    parents: parents.len(),
                });
            }
        }
    } else {
        pull.commits[position - 1].sha.clone()
    };

    Ok(StartedPull {
        number: pull.number,
        created_at: pull.created_at,
        commits: pull.commits.into_iter().map(LineageCommit::from).collect(),
        pr_commit: pull.pr_commit,
        start_commit,
        is_pr_commit_first,
    })
}
