//! Turning mined pull requests into lineage-resolved ones.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::github::{GitHubError, PullFileSource};
use crate::lineage::{classify_files, resolve_lineage};
use crate::models::{PullRequest, RawPullRequest};

/// Label under which the merged-date cutoff tallies its drops.
pub const OUTSIDE_MERGE_CUTOFF: &str = "outside_merge_cutoff";

/// Prepared pull requests and the number dropped for each reason.
#[derive(Debug, Default)]
pub struct Prepared {
    pub pulls: Vec<PullRequest>,
    pub dropped: BTreeMap<&'static str, usize>,
}

impl Prepared {
    fn tally(&mut self, reason: &'static str) {
        *self.dropped.entry(reason).or_default() += 1;
    }

    pub fn dropped_total(&self) -> usize {
        self.dropped.values().sum()
    }
}

/// Keep pull requests merged at or before `cutoff`. Pull requests without a
/// merge date never pass.
pub fn within_cutoff(pull: &RawPullRequest, cutoff: Option<DateTime<Utc>>) -> bool {
    match (pull.merged_at, cutoff) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(merged), Some(limit)) => merged <= limit,
    }
}

/// Resolve lineage and changed files for every mined pull request of
/// `repo`, in the order given.
///
/// File listings are only fetched for pull requests whose lineage resolved.
pub async fn prepare_pulls(
    repo: &str,
    raw: Vec<RawPullRequest>,
    files: &dyn PullFileSource,
    extension: &str,
    cutoff: Option<DateTime<Utc>>,
) -> Result<Prepared, GitHubError> {
    let mut prepared = Prepared::default();
    for pull in raw {
        let number = pull.number;
        if !within_cutoff(&pull, cutoff) {
            prepared.tally(OUTSIDE_MERGE_CUTOFF);
            continue;
        }

        let started = match resolve_lineage(pull) {
            Ok(started) => started,
            Err(e) => {
                debug!(repo, pr = number, reason = %e, "dropping pull request");
                prepared.tally(e.label());
                continue;
            }
        };

        let listing = files.pull_files(repo, number).await?;
        match started.with_files(classify_files(&listing, extension)) {
            Ok(pull) => prepared.pulls.push(pull),
            Err(e) => {
                debug!(repo, pr = number, reason = %e, "dropping pull request");
                prepared.tally(e.label());
            }
        }
    }
    Ok(prepared)
}
