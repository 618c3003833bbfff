//! Per-commit issue and metric collection with rename correction.

use crate::models::{CommitSnapshot, PullRequest};
use crate::sonar::{AnalysisError, AnalysisService};

/// Collects the snapshot of one analyzed commit.
#[derive(Debug, Clone, Copy, Default)]
pub struct IssueCollector;

impl IssueCollector {
    /// Fetch issues for the PR's changed files and metrics for the same
    /// files, mirrored across renames so both paths of a moved file resolve.
    pub async fn collect(
        &self,
        service: &dyn AnalysisService,
        key: &str,
        commit_sha: &str,
        pull: &PullRequest,
    ) -> Result<CommitSnapshot, AnalysisError> {
        let issues = service.issues(key, &pull.changed_files).await?;

        let mut metrics = service.metrics(key).await?;
        metrics.retain_paths(&pull.changed_files);
        metrics.mirror_renames(&pull.moved_files);

        Ok(CommitSnapshot {
            commit_sha: commit_sha.to_string(),
            issues,
            metrics,
        })
    }
}
