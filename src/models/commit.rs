//! Commit types at each stage of lineage resolution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A commit as mined from the hosting service, before any classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCommit {
    pub sha: String,
    /// Committer timestamp.
    pub committed_at: DateTime<Utc>,
    /// Parent shas in the order the hosting service reports them (at most two
    /// are mined).
    #[serde(default)]
    pub parent_shas: Vec<String>,
}

/// A commit with its merge-artifact status decided.
///
/// Immutable once extracted from raw history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub sha: String,
    pub created_at: DateTime<Utc>,
    /// `true` when the commit has more than one parent.
    pub is_merge_artifact: bool,
    pub parent_shas: Vec<String>,
}

impl From<RawCommit> for Commit {
    fn from(raw: RawCommit) -> Self {
        Self {
            is_merge_artifact: raw.parent_shas.len() > 1,
            sha: raw.sha,
            created_at: raw.committed_at,
            parent_shas: raw.parent_shas,
        }
    }
}

/// A commit inside a lineage-resolved pull request.
///
/// Parent edges are dropped once the start commit has been resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineageCommit {
    pub sha: String,
    pub created_at: DateTime<Utc>,
    pub is_merge_artifact: bool,
}

impl From<Commit> for LineageCommit {
    fn from(commit: Commit) -> Self {
        Self {
            sha: commit.sha,
            created_at: commit.created_at,
            is_merge_artifact: commit.is_merge_artifact,
        }
    }
}
