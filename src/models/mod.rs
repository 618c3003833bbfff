//! Shared types used across all modules.
//!
//! This module defines the core data structures for commits, pull requests,
//! issues and metrics. Other modules import from here rather than reaching
//! into each other's internals.

pub mod commit;
pub mod issue;
pub mod pull;

pub use commit::{Commit, LineageCommit, RawCommit};
pub use issue::{CommitSnapshot, FileMetrics, Issue, IssueRecord, MetricsByPath, Origin, TextRange};
pub use pull::{MovedFile, PullFile, PullRequest, RawPullRequest, project_key};
