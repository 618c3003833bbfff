//! Per-PR output artifacts: the ordered list of commit snapshots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{StateError, read_json, write_json_atomic};
use crate::models::CommitSnapshot;

/// Filesystem store of `issues_{repo}_{pr}.json` artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for `repo` and PR `pr_number`.
    pub fn path(&self, repo: &str, pr_number: u64) -> PathBuf {
        self.dir.join(format!("issues_{repo}_{pr_number}.json"))
    }

    /// Whether the PR already completed in an earlier run.
    pub fn exists(&self, repo: &str, pr_number: u64) -> bool {
        self.path(repo, pr_number).is_file()
    }

    pub fn put(&self, repo: &str, pr_number: u64, snapshots: &[CommitSnapshot]) -> Result<(), StateError> {
        write_json_atomic(&self.path(repo, pr_number), snapshots)
    }

    pub fn get(&self, repo: &str, pr_number: u64) -> Result<Option<Vec<CommitSnapshot>>, StateError> {
        read_json(&self.path(repo, pr_number))
    }

    /// PR numbers with an artifact for `repo`, ascending.
    pub fn list(&self, repo: &str) -> Result<Vec<u64>, StateError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.dir.clone(),
                    source,
                });
            }
        };

        let prefix = format!("issues_{repo}_");
        let mut numbers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StateError::Read {
                path: self.dir.clone(),
                source,
            })?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            let number = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
                .and_then(|n| n.parse::<u64>().ok());
            if let Some(n) = number {
                numbers.push(n);
            }
        }
        numbers.sort_unstable();
        Ok(numbers)
    }
}
