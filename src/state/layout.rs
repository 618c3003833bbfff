//! Paths of every file the pipeline reads or writes under the data directory.

use std::path::{Path, PathBuf};

use super::ArtifactStore;
use crate::constants::{
    APP_NAME, CLASSIFIED_DIR, LOGS_DIR, OUTPUT_DIR, PULLS_DIR, RAW_DIR, REPORTS_DIR, STATE_DIR,
};

/// Data-directory layout rooted at `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Mined pull requests for `repo`.
    pub fn raw_file(&self, repo: &str) -> PathBuf {
        self.root.join(RAW_DIR).join(format!("{repo}.json"))
    }

    /// Lineage-resolved pull requests for `repo`.
    pub fn pulls_file(&self, repo: &str) -> PathBuf {
        self.root.join(PULLS_DIR).join(format!("{repo}.json"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(OUTPUT_DIR)
    }

    /// Store of per-PR artifacts under [`output_dir`](Self::output_dir).
    pub fn artifacts(&self) -> ArtifactStore {
        ArtifactStore::new(self.output_dir())
    }

    pub fn ledger_file(&self, repo: &str) -> PathBuf {
        self.root
            .join(STATE_DIR)
            .join(format!("exclude_prs_{repo}.json"))
    }

    pub fn monitor_file(&self, repo: &str) -> PathBuf {
        self.root
            .join(STATE_DIR)
            .join("monitoring")
            .join(format!("{repo}.json"))
    }

    pub fn classified_file(&self, repo: &str) -> PathBuf {
        self.root.join(CLASSIFIED_DIR).join(format!("{repo}.json"))
    }

    /// Size and dates of every completed pull request of `repo`.
    pub fn characterization_file(&self, repo: &str) -> PathBuf {
        self.root.join(REPORTS_DIR).join(format!("{repo}_pulls.json"))
    }

    /// Monitoring records of `repo` as one row per commit.
    pub fn timings_file(&self, repo: &str) -> PathBuf {
        self.root.join(REPORTS_DIR).join(format!("{repo}_timings.json"))
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join(LOGS_DIR).join(format!("{APP_NAME}.log"))
    }
}
