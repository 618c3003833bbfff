//! The ordered list of commits the orchestrator analyzes for one PR.

use chrono::{DateTime, Utc};

use super::LineageError;
use crate::models::{LineageCommit, PullRequest};

/// One entry of an analyzable sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzableCommit {
    pub sha: String,
    /// `None` for a baseline that lies outside the PR's own commits (the
    /// parent of a first defining commit).
    pub created_at: Option<DateTime<Utc>>,
}

/// Build the baseline-to-final sequence of commits for a pull request.
///
/// The result always starts with `start_commit` and ends with the last
/// commit of the PR, and holds at least two entries.
pub fn analyzable_sequence(pull: &PullRequest) -> Result<Vec<AnalyzableCommit>, LineageError> {
    let as_entry = |c: &LineageCommit| AnalyzableCommit {
        sha: c.sha.clone(),
        created_at: Some(c.created_at),
    };

    let sequence: Vec<AnalyzableCommit> = if pull.is_pr_commit_first {
        std::iter::once(AnalyzableCommit {
            sha: pull.start_commit.clone(),
            created_at: None,
        })
        .chain(pull.commits.iter().map(as_entry))
        .collect()
    } else {
        let start = pull
            .commits
            .iter()
            .position(|c| c.sha == pull.start_commit)
            .ok_or_else(|| LineageError::MissingStartCommit {
                sha: pull.start_commit.clone(),
            })?;
        pull.commits[start..].iter().map(as_entry).collect()
    };

    if sequence.len() < 2 {
        return Err(LineageError::EmptySequence);
    }
    Ok(sequence)
}
