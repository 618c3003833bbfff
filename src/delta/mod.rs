//! Issue-delta classification.
//!
//! Compares the baseline snapshot of a pull request with its final snapshot
//! and labels every surviving issue as pre-existing or newly introduced.

pub mod debt;

use std::collections::HashSet;

use crate::models::{CommitSnapshot, IssueRecord, MetricsByPath, MovedFile, Origin};

pub use debt::parse_debt;

/// Classify the issues of the last snapshot against the first.
///
/// `snapshots` must be in baseline-to-final order. Issues attached to the
/// old path of a moved file are skipped because the service reports them
/// again under the new path. File metrics are the union of every snapshot's
/// metrics, later snapshots overriding earlier ones.
pub fn classify(
    repo: &str,
    pr_number: u64,
    snapshots: &[CommitSnapshot],
    moved_files: &[MovedFile],
) -> Vec<IssueRecord> {
    let (Some(first), Some(last)) = (snapshots.first(), snapshots.last()) else {
        return Vec::new();
    };

    let baseline: HashSet<&str> = first.issues.iter().map(|i| i.key.as_str()).collect();
    let old_paths: HashSet<&str> = moved_files.iter().map(|m| m.old_path.as_str()).collect();

    let mut metrics = MetricsByPath::new();
    for snapshot in snapshots {
        metrics.merge_from(&snapshot.metrics);
    }

    last.issues
        .iter()
        .filter(|issue| !old_paths.contains(issue.component.as_str()))
        .map(|issue| {
            let file_metrics = metrics.get(&issue.component).copied().unwrap_or_default();
            IssueRecord {
                repo: repo.to_string(),
                pr_number,
                key: issue.key.clone(),
                rule: issue.rule.clone(),
                severity: issue.severity.clone(),
                file: issue.component.clone(),
                issue_type: issue.issue_type.clone(),
                status: issue.status.clone(),
                debt_minutes: issue.debt.as_deref().and_then(parse_debt),
                ncloc_of_file: file_metrics.ncloc,
                complexity_of_file: file_metrics.complexity,
                origin: if baseline.contains(issue.key.as_str()) {
                    Origin::PreExisting
                } else {
                    Origin::New
                },
            }
        })
        .collect()
}
