//! Batch stages over the configured repositories.
//!
//! Each stage reads the previous stage's files under the data directory and
//! skips repositories whose output already exists, so the whole pipeline
//! can be re-run after an interruption:
//!
//! `mine` -> `raw/{repo}.json` -> `prepare` -> `pulls/{repo}.json` ->
//! `run` -> `output/issues_{repo}_{pr}.json` -> `classify` ->
//! `classified/{repo}.json`
//!
//! `report` summarizes completed pull requests and their timings under
//! `reports/`.

pub mod prepare;
pub mod report;
pub mod status;

use std::sync::Arc;

use thiserror::Error;
use tracing::{info, warn};

pub use prepare::{Prepared, prepare_pulls, within_cutoff};
pub use report::{CommitTiming, PullCharacteristics, characterize, flatten_timings};
pub use status::RepoStatus;

use crate::config::{Config, ConfigError};
use crate::delta;
use crate::execution::{AnalysisPoller, BuildHandler, SonarScanner};
use crate::github::{GitHubError, GraphQlClient, RestClient};
use crate::models::{IssueRecord, PullRequest, RawPullRequest};
use crate::orchestrator::{Orchestrator, RunSummary};
use crate::snapshot::{ArchiveSnapshotSource, SnapshotError};
use crate::sonar::{AnalysisError, SonarClient};
use crate::state::{DataLayout, ProgressMonitor, StateError, read_json, write_json_atomic};

/// Errors that stop a stage.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    GitHub(#[from] GitHubError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error(transparent)]
    Snapshot(#[from] SnapshotError),

    #[error(transparent)]
    State(#[from] StateError),
}

/// What a file-producing stage did for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageOutcome {
    /// The stage wrote this many records.
    Written(usize),
    /// Output already present.
    Skipped,
    /// Input from the previous stage is missing.
    MissingInput,
}

/// Runs pipeline stages with one configuration.
pub struct Pipeline {
    config: Config,
    layout: DataLayout,
}

impl Pipeline {
    pub fn new(config: Config) -> Self {
        let layout = DataLayout::new(&config.pipeline.data_dir);
        Self { config, layout }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Repositories a stage applies to.
    pub fn repos(&self, requested: &[String]) -> Vec<String> {
        self.config.select_repos(requested)
    }

    /// Fetch merged pull requests for every repository without a raw file.
    pub async fn mine(&self, repos: &[String]) -> Result<Vec<(String, StageOutcome)>, PipelineError> {
        let owner = self.config.github.owner()?;
        let client = GraphQlClient::new(&self.config.github, owner)?;
        let mut outcomes = Vec::with_capacity(repos.len());
        for repo in repos {
            let path = self.layout.raw_file(repo);
            if path.exists() {
                info!(repo = %repo, "already mined, skipping");
                outcomes.push((repo.clone(), StageOutcome::Skipped));
                continue;
            }
            info!(repo = %repo, "mining merged pull requests");
            let pulls = client.merged_pulls(repo).await?;
            write_json_atomic(&path, &pulls)?;
            info!(repo = %repo, pulls = pulls.len(), "mined");
            outcomes.push((repo.clone(), StageOutcome::Written(pulls.len())));
        }
        Ok(outcomes)
    }

    /// Resolve lineage and changed files for every mined repository that
    /// has not been prepared yet.
    pub async fn prepare(&self, repos: &[String]) -> Result<Vec<(String, StageOutcome)>, PipelineError> {
        let owner = self.config.github.owner()?;
        let files = RestClient::new(&self.config.github, owner)?;
        let mut outcomes = Vec::with_capacity(repos.len());
        for repo in repos {
            let target = self.layout.pulls_file(repo);
            if target.exists() {
                info!(repo = %repo, "already prepared, skipping");
                outcomes.push((repo.clone(), StageOutcome::Skipped));
                continue;
            }
            let Some(raw) = read_json::<Vec<RawPullRequest>>(&self.layout.raw_file(repo))? else {
                warn!(repo = %repo, "no mined pull requests, run `prscan mine` first");
                outcomes.push((repo.clone(), StageOutcome::MissingInput));
                continue;
            };

            let mined = raw.len();
            let prepared = prepare_pulls(
                repo,
                raw,
                &files,
                &self.config.pipeline.source_extension,
                self.config.pipeline.merged_before,
            )
            .await?;
            for (reason, count) in &prepared.dropped {
                info!(repo = %repo, reason, count, "dropped pull requests");
            }
            write_json_atomic(&target, &prepared.pulls)?;
            info!(repo = %repo, mined, kept = prepared.pulls.len(), "prepared");
            outcomes.push((repo.clone(), StageOutcome::Written(prepared.pulls.len())));
        }
        Ok(outcomes)
    }

    /// Run the orchestrator over every prepared repository.
    ///
    /// Every repository must have a build command before any work starts.
    pub async fn run(&self, repos: &[String]) -> Result<Vec<(String, RunSummary)>, PipelineError> {
        let builds = repos
            .iter()
            .map(|repo| {
                let handler = BuildHandler::new(self.config.build_command(repo)?)
                    .with_timeout(self.config.build.timeout());
                Ok((repo.clone(), handler))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let owner = self.config.github.owner()?;
        let sonar = &self.config.sonar;
        let orchestrator = Orchestrator::new(
            Arc::new(SonarClient::new(sonar)?),
            Arc::new(ArchiveSnapshotSource::new(
                &self.config.github,
                owner,
                &self.config.pipeline.work_dir,
            )?),
            Arc::new(SonarScanner::new(sonar)),
            AnalysisPoller::new(sonar.poll_interval(), sonar.poll_timeout()),
            self.layout.clone(),
        );

        let mut summaries = Vec::with_capacity(builds.len());
        for (repo, build) in builds {
            let Some(pulls) = read_json::<Vec<PullRequest>>(&self.layout.pulls_file(&repo))? else {
                warn!(repo = %repo, "no prepared pull requests, run `prscan prepare` first");
                continue;
            };
            let summary = orchestrator.run_repo(&repo, &pulls, &build).await?;
            summaries.push((repo, summary));
        }
        Ok(summaries)
    }

    /// Label the issues of every output artifact of each repository.
    pub fn classify(&self, repos: &[String]) -> Result<Vec<(String, StageOutcome)>, PipelineError> {
        let mut outcomes = Vec::with_capacity(repos.len());
        for repo in repos {
            let Some(pulls) = read_json::<Vec<PullRequest>>(&self.layout.pulls_file(repo))? else {
                warn!(repo = %repo, "no prepared pull requests");
                outcomes.push((repo.clone(), StageOutcome::MissingInput));
                continue;
            };
            let records = classify_repo(&self.layout, repo, &pulls)?;
            write_json_atomic(&self.layout.classified_file(repo), &records)?;
            info!(repo = %repo, issues = records.len(), "classified");
            outcomes.push((repo.clone(), StageOutcome::Written(records.len())));
        }
        Ok(outcomes)
    }

    /// Write the characterization of completed pull requests and the
    /// flattened monitoring records of each repository.
    pub fn report(&self, repos: &[String]) -> Result<Vec<(String, StageOutcome)>, PipelineError> {
        let mut outcomes = Vec::with_capacity(repos.len());
        for repo in repos {
            let Some(mined) = read_json::<Vec<RawPullRequest>>(&self.layout.raw_file(repo))? else {
                warn!(repo = %repo, "no mined pull requests");
                outcomes.push((repo.clone(), StageOutcome::MissingInput));
                continue;
            };
            let completed = self.layout.artifacts().list(repo)?;
            let pulls = characterize(repo, &mined, &completed);
            write_json_atomic(&self.layout.characterization_file(repo), &pulls)?;

            let monitor = ProgressMonitor::load(self.layout.monitor_file(repo))?;
            let timings = flatten_timings(repo, &monitor);
            write_json_atomic(&self.layout.timings_file(repo), &timings)?;

            info!(repo = %repo, pulls = pulls.len(), commits = timings.len(), "reported");
            outcomes.push((repo.clone(), StageOutcome::Written(pulls.len())));
        }
        Ok(outcomes)
    }

    /// Progress counters for each repository.
    pub fn status(&self, repos: &[String]) -> Result<Vec<RepoStatus>, PipelineError> {
        repos
            .iter()
            .map(|repo| RepoStatus::collect(&self.layout, repo).map_err(PipelineError::from))
            .collect()
    }
}

/// Classify every completed pull request of `repo`, in pull-request order.
///
/// Artifacts without a matching prepared pull request are classified
/// without rename information.
pub fn classify_repo(
    layout: &DataLayout,
    repo: &str,
    pulls: &[PullRequest],
) -> Result<Vec<IssueRecord>, StateError> {
    let artifacts = layout.artifacts();
    let mut records = Vec::new();
    for number in artifacts.list(repo)? {
        let Some(snapshots) = artifacts.get(repo, number)? else {
            continue;
        };
        let moved = pulls
            .iter()
            .find(|p| p.number == number)
            .map(|p| p.moved_files.as_slice())
            .unwrap_or_default();
        records.extend(delta::classify(repo, number, &snapshots, moved));
    }
    Ok(records)
}
