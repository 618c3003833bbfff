//! Changed-file and rename classification for a pull request.

use std::collections::BTreeSet;

use super::LineageError;
use super::start::StartedPull;
use crate::models::{MovedFile, PullFile, PullRequest};

/// Source files touched by a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangedFiles {
    pub changed: BTreeSet<String>,
    pub moved: Vec<MovedFile>,
}

/// Keep only files ending in `extension`.
///
/// A renamed file contributes both its previous and current path when each
/// is a source file. A [`MovedFile`] is recorded only when both sides are.
pub fn classify_files(files: &[PullFile], extension: &str) -> ChangedFiles {
    let mut out = ChangedFiles::default();
    for file in files {
        let is_source = file.filename.ends_with(extension);
        if is_source {
            out.changed.insert(file.filename.clone());
        }
        let Some(previous) = &file.previous_filename else {
            continue;
        };
        if previous.ends_with(extension) {
            out.changed.insert(previous.clone());
            if is_source {
                out.moved.push(MovedFile {
                    old_path: previous.clone(),
                    new_path: file.filename.clone(),
                });
            }
        }
    }
    out
}

impl StartedPull {
    /// Attach the PR's source files, completing lineage resolution.
    pub fn with_files(self, files: ChangedFiles) -> Result<PullRequest, LineageError> {
        if files.changed.is_empty() {
            return Err(LineageError::NoSourceFiles);
        }
        Ok(PullRequest {
            number: self.number,
            created_at: self.created_at,
            commits: self.commits,
            pr_commit: self.pr_commit,
            start_commit: self.start_commit,
            is_pr_commit_first: self.is_pr_commit_first,
            changed_files: files.changed,
            moved_files: files.moved,
        })
    }
}
