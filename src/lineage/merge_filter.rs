//! Rejection of pull requests whose history contains merge commits.

use super::LineageError;
use super::resolver::IdentifiedPull;

/// Keep, trim or reject a pull request based on its merge commits.
///
/// A merge artifact anywhere before the last position rejects the PR. A
/// trailing merge artifact is stripped, unless it is the defining commit, in
/// which case nothing analyzable remains and the PR is rejected. Timestamps
/// are never touched.
pub fn filter_merges(mut pull: IdentifiedPull) -> Result<IdentifiedPull, LineageError> {
    let Some((last, init)) = pull.commits.split_last() else {
        return Ok(pull);
    };

    if let Some((position, polluting)) = init
        .iter()
        .enumerate()
        .find(|(_, c)| c.is_merge_artifact)
    {
        return Err(LineageError::PollutedHistory {
            sha: polluting.sha.clone(),
            position: position + 1,
        });
    }

    if last.is_merge_artifact {
        if last.sha == pull.pr_commit {
            return Err(LineageError::MergeArtifactIsDefining {
                sha: last.sha.clone(),
            });
        }
        pull.commits.pop();
    }

    Ok(pull)
}
