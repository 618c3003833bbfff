//! Commit-lineage resolution.
//!
//! Turns a mined pull request into a minimal, ordered sequence of analyzable
//! commits bounded by a baseline commit and the PR's final state. The stages
//! run in order: [`identify_pr_commit`], [`filter_merges`],
//! [`resolve_start`], [`StartedPull::with_files`] and finally
//! [`analyzable_sequence`] at execution time.

pub mod files;
pub mod merge_filter;
pub mod resolver;
pub mod sequence;
pub mod start;

use thiserror::Error;

pub use files::{ChangedFiles, classify_files};
pub use merge_filter::filter_merges;
pub use resolver::{IdentifiedPull, identify_pr_commit};
pub use sequence::{AnalyzableCommit, analyzable_sequence};
pub use start::{StartedPull, resolve_start};

use crate::models::RawPullRequest;

/// Reasons a pull request cannot be given an analyzable lineage.
///
/// These are filtering decisions: the PR is never scheduled for analysis.
#[derive(Error, Debug, Clone, PartialEq, Eq, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum LineageError {
    #[error("no commit precedes the pull request creation time")]
    UndecidableLineage,

    #[error("defining commit {sha} has {parents} parents, baseline is ambiguous")]
    AmbiguousBaseline { sha: String, parents: usize },

    #[error("merge commit {sha} at position {position} pollutes the history")]
    PollutedHistory { sha: String, position: usize },

    #[error("trailing merge commit {sha} is the defining commit")]
    MergeArtifactIsDefining { sha: String },

    #[error("defining commit {sha} is not part of the commit list")]
    MissingPrCommit { sha: String },

    #[error("start commit {sha} is not part of the commit list")]
    MissingStartCommit { sha: String },

    #[error("analyzable sequence has fewer than two commits")]
    EmptySequence,

    #[error("no relevant source files changed")]
    NoSourceFiles,
}

impl LineageError {
    /// Short snake_case label used when tallying drop reasons.
    pub fn label(&self) -> &'static str {
        self.into()
    }
}

/// Apply defining-commit identification, merge filtering and start
/// resolution in order.
pub fn resolve_lineage(pull: RawPullRequest) -> Result<StartedPull, LineageError> {
    let identified = identify_pr_commit(pull)?;
    let filtered = filter_merges(identified)?;
    resolve_start(filtered)
}
