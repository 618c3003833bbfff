//! Per-repository progress counters.

use crate::models::{PullRequest, RawPullRequest};
use crate::state::{DataLayout, ExclusionLedger, StateError, read_json};

/// How far a repository has come through the pipeline.
///
/// `None` means the stage's file does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    pub repo: String,
    pub mined: Option<usize>,
    pub prepared: Option<usize>,
    pub completed: usize,
    pub excluded: usize,
}

impl RepoStatus {
    pub fn collect(layout: &DataLayout, repo: &str) -> Result<Self, StateError> {
        let mined = read_json::<Vec<RawPullRequest>>(&layout.raw_file(repo))?.map(|p| p.len());
        let prepared = read_json::<Vec<PullRequest>>(&layout.pulls_file(repo))?.map(|p| p.len());
        let completed = layout.artifacts().list(repo)?.len();
        let excluded = ExclusionLedger::load(layout.ledger_file(repo))?.len();
        Ok(Self {
            repo: repo.to_string(),
            mined,
            prepared,
            completed,
            excluded,
        })
    }

    /// Prepared pull requests neither completed nor excluded.
    pub fn remaining(&self) -> Option<usize> {
        self.prepared
            .map(|p| p.saturating_sub(self.completed + self.excluded))
    }
}
