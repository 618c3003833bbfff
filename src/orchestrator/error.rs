//! Failure classification for a single pull request.

use thiserror::Error;

use crate::execution::{BuildError, CommandError, PollError, ScanError};
use crate::lineage::LineageError;
use crate::snapshot::SnapshotError;
use crate::sonar::AnalysisError;

/// Why processing a pull request stopped.
///
/// `index` is the 1-based position of the commit in the analyzable sequence.
#[derive(Error, Debug)]
pub enum PullError {
    #[error("missing build descriptor ({descriptor}) at commit {index}")]
    MissingBuildDescriptor { index: usize, descriptor: String },

    #[error("build failed at commit {index} ({sha})")]
    BuildFailed {
        index: usize,
        sha: String,
        tail: Vec<String>,
    },

    #[error("scan failed at commit {index} ({sha})")]
    ScanFailed {
        index: usize,
        sha: String,
        tail: Vec<String>,
    },

    #[error("poll timed out at commit {index} ({sha})")]
    PollTimeout { index: usize, sha: String },

    #[error("failed to run a command at commit {index}: {source}")]
    Command {
        index: usize,
        #[source]
        source: CommandError,
    },

    #[error(transparent)]
    Lineage(#[from] LineageError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),
}

impl PullError {
    pub(crate) fn from_build(index: usize, sha: &str, err: BuildError) -> Self {
        match err {
            BuildError::MissingDescriptor { descriptor } => Self::MissingBuildDescriptor { index, descriptor },
            BuildError::Failed { tail, .. } => Self::BuildFailed {
                index,
                sha: sha.to_string(),
                tail,
            },
            BuildError::Command(source) => Self::Command { index, source },
        }
    }

    pub(crate) fn from_scan(index: usize, sha: &str, err: ScanError) -> Self {
        match err {
            ScanError::Failed { tail, .. } => Self::ScanFailed {
                index,
                sha: sha.to_string(),
                tail,
            },
            ScanError::Command(source) => Self::Command { index, source },
        }
    }

    pub(crate) fn from_poll(index: usize, sha: &str, err: PollError) -> Self {
        match err {
            PollError::TimedOut { .. } => Self::PollTimeout {
                index,
                sha: sha.to_string(),
            },
            PollError::Service(e) => Self::Analysis(e),
        }
    }

    /// Conclusive failures are never retried.
    pub fn is_conclusive(&self) -> bool {
        matches!(
            self,
            Self::MissingBuildDescriptor { .. }
                | Self::BuildFailed { .. }
                | Self::ScanFailed { .. }
                | Self::PollTimeout { .. }
        )
    }

    /// Reason written to the exclusion ledger, for conclusive failures only.
    pub fn ledger_reason(&self) -> Option<String> {
        self.is_conclusive().then(|| self.to_string())
    }

    /// Captured output explaining a failed build or scan.
    pub fn output_tail(&self) -> &[String] {
        match self {
            Self::BuildFailed { tail, .. } | Self::ScanFailed { tail, .. } => tail,
            _ => &[],
        }
    }
}
