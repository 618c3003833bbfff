//! Resumable execution of the per-commit analysis loop.
//!
//! For every lineage-resolved pull request of a repository the orchestrator
//! fetches each commit of the analyzable sequence, builds it, scans it,
//! waits for the analysis service to ingest the scan and collects the
//! resulting issues and metrics. Pull requests and commits are processed
//! one at a time: the remote project's cumulative analysis count is what
//! tells the poller a scan has been ingested, so two scans in flight would
//! be indistinguishable.
//!
//! A pull request is skipped when its output artifact exists or when the
//! exclusion ledger names it. Conclusive failures (missing descriptor,
//! failed build or scan, poll timeout) are written to the ledger; anything
//! else leaves no trace and is retried on the next run.

pub mod error;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

pub use error::PullError;

use crate::execution::{AnalysisPoller, BuildHandler, IssueCollector, ScanTarget, Scanner};
use crate::lineage::{AnalyzableCommit, analyzable_sequence};
use crate::models::{CommitSnapshot, PullRequest};
use crate::snapshot::SnapshotSource;
use crate::sonar::AnalysisService;
use crate::state::{ArtifactStore, DataLayout, ExclusionLedger, ProgressMonitor, PullTimings, StateError};

/// Terminal state of one pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Output artifact already present or PR already in the ledger.
    Skipped,
    Completed,
    /// Conclusive failure, recorded in the ledger with this reason.
    Excluded(String),
    /// Transient failure; the PR is retried on the next run.
    Aborted(String),
}

/// Per-repository tally of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: usize,
    pub excluded: usize,
    pub aborted: usize,
    pub skipped: usize,
}

impl RunSummary {
    fn count(&mut self, outcome: &PullOutcome) {
        match outcome {
            PullOutcome::Skipped => self.skipped += 1,
            PullOutcome::Completed => self.completed += 1,
            PullOutcome::Excluded(_) => self.excluded += 1,
            PullOutcome::Aborted(_) => self.aborted += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.completed + self.excluded + self.aborted + self.skipped
    }
}

/// Drives build, scan, poll and collection for every pull request of a
/// repository.
pub struct Orchestrator {
    service: Arc<dyn AnalysisService>,
    snapshots: Arc<dyn SnapshotSource>,
    scanner: Arc<dyn Scanner>,
    poller: AnalysisPoller,
    collector: IssueCollector,
    layout: DataLayout,
}

impl Orchestrator {
    pub fn new(
        service: Arc<dyn AnalysisService>,
        snapshots: Arc<dyn SnapshotSource>,
        scanner: Arc<dyn Scanner>,
        poller: AnalysisPoller,
        layout: DataLayout,
    ) -> Self {
        Self {
            service,
            snapshots,
            scanner,
            poller,
            collector: IssueCollector,
            layout,
        }
    }

    /// Process every pull request of `repo` in order.
    ///
    /// Only failing to load the ledger or monitoring file is an error; every
    /// per-PR failure is logged, classified and counted.
    pub async fn run_repo(
        &self,
        repo: &str,
        pulls: &[PullRequest],
        build: &BuildHandler,
    ) -> Result<RunSummary, StateError> {
        let artifacts = self.layout.artifacts();
        let mut ledger = ExclusionLedger::load(self.layout.ledger_file(repo))?;
        let mut monitor = ProgressMonitor::load(self.layout.monitor_file(repo))?;
        let mut summary = RunSummary::default();

        info!(repo, pulls = pulls.len(), excluded = ledger.len(), "starting repository");
        for pull in pulls {
            let outcome = self
                .run_pull(repo, pull, build, &artifacts, &mut ledger, &mut monitor)
                .await;
            summary.count(&outcome);
        }
        info!(
            repo,
            completed = summary.completed,
            excluded = summary.excluded,
            aborted = summary.aborted,
            skipped = summary.skipped,
            "repository finished"
        );
        Ok(summary)
    }

    /// Run one pull request from pending to a terminal state.
    pub async fn run_pull(
        &self,
        repo: &str,
        pull: &PullRequest,
        build: &BuildHandler,
        artifacts: &ArtifactStore,
        ledger: &mut ExclusionLedger,
        monitor: &mut ProgressMonitor,
    ) -> PullOutcome {
        let pr = pull.number;
        if artifacts.exists(repo, pr) {
            debug!(repo, pr, "output artifact present, skipping");
            return PullOutcome::Skipped;
        }
        if let Some(reason) = ledger.reason(pr) {
            debug!(repo, pr, reason, "excluded, skipping");
            return PullOutcome::Skipped;
        }

        info!(repo, pr, "processing pull request");
        let started = Instant::now();
        let (snapshots, timings) = match self.analyze_pull(repo, pull, build).await {
            Ok(done) => done,
            Err(err) => return self.abandon(repo, pull, err, ledger).await,
        };

        // The artifact is the resumability signal, so it is written last.
        let persisted = monitor
            .commit(pr, timings)
            .and_then(|()| artifacts.put(repo, pr, &snapshots));
        match persisted {
            Ok(()) => {
                info!(repo, pr, elapsed_secs = started.elapsed().as_secs_f64(), "pull request completed");
                PullOutcome::Completed
            }
            Err(e) => {
                error!(repo, pr, error = %e, "analysis finished but results were not saved, will retry on next run");
                PullOutcome::Aborted(e.to_string())
            }
        }
    }

    /// Clean up after a failed analysis and classify the failure.
    async fn abandon(
        &self,
        repo: &str,
        pull: &PullRequest,
        err: PullError,
        ledger: &mut ExclusionLedger,
    ) -> PullOutcome {
        let pr = pull.number;
        let key = pull.project_key(repo);
        if let Err(cleanup) = self.service.delete_project(&key).await {
            warn!(repo, pr, project = %key, error = %cleanup, "failed to delete analysis project");
        }
        for line in err.output_tail() {
            error!(repo, pr, "{line}");
        }

        match err.ledger_reason() {
            Some(reason) => {
                error!(repo, pr, %reason, "pull request excluded");
                if let Err(e) = ledger.record(pr, reason.clone()) {
                    error!(repo, pr, error = %e, "failed to update exclusion ledger");
                }
                PullOutcome::Excluded(reason)
            }
            None => {
                error!(repo, pr, error = %err, "pull request aborted, will retry on next run");
                PullOutcome::Aborted(err.to_string())
            }
        }
    }

    /// Create the project for `target`, recreating it when earlier analyses
    /// are left over. The poller expects the counts to start at zero.
    async fn fresh_project(&self, repo: &str, pr: u64, target: &ScanTarget) -> Result<(), PullError> {
        self.service.create_project(&target.key, &target.name).await?;
        let analyses = self.service.analysis_count(&target.key).await?;
        let activities = self.service.activity_count(&target.key).await?;
        if analyses > 0 || activities > 0 {
            warn!(
                repo,
                pr,
                project = %target.key,
                analyses,
                activities,
                "analysis project holds earlier runs, recreating it"
            );
            self.service.delete_project(&target.key).await?;
            self.service.create_project(&target.key, &target.name).await?;
        }
        Ok(())
    }

    async fn analyze_pull(
        &self,
        repo: &str,
        pull: &PullRequest,
        build: &BuildHandler,
    ) -> Result<(Vec<CommitSnapshot>, PullTimings), PullError> {
        let mut timings = PullTimings::new();
        let target = ScanTarget {
            key: pull.project_key(repo),
            name: pull.project_key(repo),
        };
        self.fresh_project(repo, pull.number, &target).await?;

        let sequence = analyzable_sequence(pull)?;
        let mut snapshots = Vec::with_capacity(sequence.len());
        for (position, commit) in sequence.iter().enumerate() {
            let index = position + 1;
            let started = Instant::now();
            let snapshot = self
                .analyze_commit(repo, pull, &target, build, index, commit)
                .await?;
            snapshots.push(snapshot);
            timings.record(&commit.sha, started.elapsed());
        }
        Ok((snapshots, timings))
    }

    /// Fetch, build, scan, poll and collect one commit. The working copy is
    /// removed before returning, whatever the result.
    async fn analyze_commit(
        &self,
        repo: &str,
        pull: &PullRequest,
        target: &ScanTarget,
        build: &BuildHandler,
        index: usize,
        commit: &AnalyzableCommit,
    ) -> Result<CommitSnapshot, PullError> {
        let pr = pull.number;
        let sha = commit.sha.as_str();
        info!(repo, pr, commit = sha, index, "analyzing commit");

        let copy = self.snapshots.fetch(repo, sha).await?;
        let result = self
            .analyze_working_copy(copy.root(), pull, target, build, index, sha)
            .await;
        if let Err(e) = copy.remove() {
            warn!(repo, pr, commit = sha, error = %e, "failed to remove working copy");
        }
        result
    }

    async fn analyze_working_copy(
        &self,
        dir: &std::path::Path,
        pull: &PullRequest,
        target: &ScanTarget,
        build: &BuildHandler,
        index: usize,
        sha: &str,
    ) -> Result<CommitSnapshot, PullError> {
        build
            .check_descriptor(dir)
            .map_err(|e| PullError::from_build(index, sha, e))?;
        build
            .build(dir)
            .await
            .map_err(|e| PullError::from_build(index, sha, e))?;
        self.scanner
            .scan(dir, target)
            .await
            .map_err(|e| PullError::from_scan(index, sha, e))?;

        let attempts = self
            .poller
            .wait_for(self.service.as_ref(), &target.key, index as u64)
            .await
            .map_err(|e| PullError::from_poll(index, sha, e))?;
        debug!(pr = pull.number, commit = sha, attempts, "scan ingested");

        Ok(self
            .collector
            .collect(self.service.as_ref(), &target.key, sha, pull)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::ScanError;
    use crate::models::{Issue, LineageCommit, MetricsByPath};
    use crate::snapshot::{SnapshotError, WorkingCopy};
    use crate::sonar::AnalysisError;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::collections::BTreeSet;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts analyses as the scanner submits them.
    #[derive(Default)]
    struct FakeService {
        analyses: Arc<AtomicU64>,
        deleted: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnalysisService for FakeService {
        async fn create_project(&self, _key: &str, _name: &str) -> Result<(), AnalysisError> {
            Ok(())
        }
        async fn delete_project(&self, key: &str) -> Result<(), AnalysisError> {
            self.analyses.store(0, Ordering::SeqCst);
            self.deleted.lock().unwrap().push(key.to_string());
            Ok(())
        }
        async fn analysis_count(&self, _key: &str) -> Result<u64, AnalysisError> {
            Ok(self.analyses.load(Ordering::SeqCst))
        }
        async fn activity_count(&self, _key: &str) -> Result<u64, AnalysisError> {
            Ok(self.analyses.load(Ordering::SeqCst))
        }
        async fn issues(&self, _key: &str, _files: &BTreeSet<String>) -> Result<Vec<Issue>, AnalysisError> {
            Ok(vec![])
        }
        async fn metrics(&self, _key: &str) -> Result<MetricsByPath, AnalysisError> {
            Ok(MetricsByPath::new())
        }
    }

    struct FakeScanner {
        analyses: Arc<AtomicU64>,
        fail_at: Option<u64>,
    }

    #[async_trait]
    impl Scanner for FakeScanner {
        async fn scan(&self, _dir: &Path, _target: &ScanTarget) -> Result<(), ScanError> {
            let next = self.analyses.load(Ordering::SeqCst) + 1;
            if self.fail_at == Some(next) {
                return Err(ScanError::Failed {
                    code: Some(1),
                    tail: vec!["ERROR: boom".into()],
                });
            }
            self.analyses.store(next, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeSnapshots {
        work_dir: PathBuf,
        descriptor: bool,
        fetched: AtomicUsize,
    }

    #[async_trait]
    impl SnapshotSource for FakeSnapshots {
        async fn fetch(&self, _repo: &str, _sha: &str) -> Result<WorkingCopy, SnapshotError> {
            self.fetched.fetch_add(1, Ordering::SeqCst);
            let dir = tempfile::tempdir_in(&self.work_dir).unwrap();
            if self.descriptor {
                std::fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
            }
            Ok(WorkingCopy::new(dir))
        }
    }

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().unwrap()
    }

    fn pull(number: u64) -> PullRequest {
        PullRequest {
            number,
            created_at: ts("2023-01-10T00:00:00Z"),
            commits: vec![
                LineageCommit {
                    sha: "c1".into(),
                    created_at: ts("2023-01-01T00:00:00Z"),
                    is_merge_artifact: false,
                },
                LineageCommit {
                    sha: "c2".into(),
                    created_at: ts("2023-01-02T00:00:00Z"),
                    is_merge_artifact: false,
                },
            ],
            pr_commit: "c2".into(),
            start_commit: "c1".into(),
            is_pr_commit_first: false,
            changed_files: BTreeSet::from(["src/A.java".to_string()]),
            moved_files: vec![],
        }
    }

    struct Harness {
        orchestrator: Orchestrator,
        service: Arc<FakeService>,
        snapshots: Arc<FakeSnapshots>,
        layout: DataLayout,
        _root: tempfile::TempDir,
    }

    fn harness(descriptor: bool, fail_scan_at: Option<u64>) -> Harness {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("work");
        std::fs::create_dir_all(&work_dir).unwrap();
        let analyses = Arc::new(AtomicU64::new(0));
        let service = Arc::new(FakeService {
            analyses: analyses.clone(),
            ..FakeService::default()
        });
        let snapshots = Arc::new(FakeSnapshots {
            work_dir,
            descriptor,
            fetched: AtomicUsize::new(0),
        });
        let scanner = Arc::new(FakeScanner {
            analyses,
            fail_at: fail_scan_at,
        });
        let layout = DataLayout::new(root.path().join("data"));
        let orchestrator = Orchestrator::new(
            service.clone(),
            snapshots.clone(),
            scanner,
            AnalysisPoller::new(Duration::from_millis(1), Some(Duration::from_secs(5))),
            layout.clone(),
        );
        Harness {
            orchestrator,
            service,
            snapshots,
            layout,
            _root: root,
        }
    }

    fn work_dir_is_empty(h: &Harness) -> bool {
        std::fs::read_dir(&h.snapshots.work_dir).unwrap().next().is_none()
    }

    #[tokio::test]
    async fn completes_and_persists_artifact_and_timings() {
        let h = harness(true, None);
        let summary = h
            .orchestrator
            .run_repo("lang", &[pull(1)], &BuildHandler::new("echo mvn -q package"))
            .await
            .unwrap();

        assert_eq!(summary.completed, 1);
        let snapshots = h.layout.artifacts().get("lang", 1).unwrap().unwrap();
        let shas: Vec<&str> = snapshots.iter().map(|s| s.commit_sha.as_str()).collect();
        assert_eq!(shas, vec!["c1", "c2"]);

        let monitor = ProgressMonitor::load(h.layout.monitor_file("lang")).unwrap();
        assert_eq!(monitor.get(1).unwrap().len(), 2);
        assert!(work_dir_is_empty(&h));
        assert!(h.service.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_descriptor_is_excluded() {
        let h = harness(false, None);
        let summary = h
            .orchestrator
            .run_repo("lang", &[pull(2)], &BuildHandler::new("mvn package"))
            .await
            .unwrap();

        assert_eq!(summary.excluded, 1);
        let ledger = ExclusionLedger::load(h.layout.ledger_file("lang")).unwrap();
        assert_eq!(ledger.reason(2), Some("missing build descriptor (pom.xml) at commit 1"));
        assert_eq!(h.service.deleted.lock().unwrap().as_slice(), ["lang-2".to_string()]);
        assert!(work_dir_is_empty(&h));
        assert!(!ProgressMonitor::load(h.layout.monitor_file("lang")).unwrap().contains(2));
    }

    #[tokio::test]
    async fn scan_failure_at_second_commit_is_excluded() {
        let h = harness(true, Some(2));
        let outcome_summary = h
            .orchestrator
            .run_repo("lang", &[pull(3)], &BuildHandler::new("true"))
            .await
            .unwrap();

        assert_eq!(outcome_summary.excluded, 1);
        let ledger = ExclusionLedger::load(h.layout.ledger_file("lang")).unwrap();
        assert_eq!(ledger.reason(3), Some("scan failed at commit 2 (c2)"));
        assert!(!h.layout.artifacts().exists("lang", 3));
        assert_eq!(h.snapshots.fetched.load(Ordering::SeqCst), 2);
        assert!(work_dir_is_empty(&h));
    }

    #[tokio::test]
    async fn build_failure_is_excluded() {
        let h = harness(true, None);
        let summary = h
            .orchestrator
            .run_repo("lang", &[pull(4)], &BuildHandler::new("exit 3"))
            .await
            .unwrap();

        assert_eq!(summary.excluded, 1);
        let ledger = ExclusionLedger::load(h.layout.ledger_file("lang")).unwrap();
        assert_eq!(ledger.reason(4), Some("build failed at commit 1 (c1)"));
    }

    #[tokio::test]
    async fn excluded_and_completed_pulls_are_skipped() {
        let h = harness(true, None);
        let build = BuildHandler::new("true");
        let mut ledger = ExclusionLedger::load(h.layout.ledger_file("lang")).unwrap();
        ledger.record(5, "build failed at commit 1 (c1)").unwrap();

        let first = h
            .orchestrator
            .run_repo("lang", &[pull(5), pull(6)], &build)
            .await
            .unwrap();
        assert_eq!((first.skipped, first.completed), (1, 1));

        let fetched = h.snapshots.fetched.load(Ordering::SeqCst);
        let second = h
            .orchestrator
            .run_repo("lang", &[pull(5), pull(6)], &build)
            .await
            .unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.total(), 2);
        assert_eq!(h.snapshots.fetched.load(Ordering::SeqCst), fetched);
    }

    #[tokio::test]
    async fn unsaved_results_are_retried_without_an_artifact() {
        let h = harness(true, None);
        let build = BuildHandler::new("true");
        let artifacts = h.layout.artifacts();
        let mut ledger = ExclusionLedger::load(h.layout.ledger_file("lang")).unwrap();
        let mut monitor = ProgressMonitor::load(h.layout.monitor_file("lang")).unwrap();
        std::fs::create_dir_all(h.layout.monitor_file("lang")).unwrap();

        let outcome = h
            .orchestrator
            .run_pull("lang", &pull(11), &build, &artifacts, &mut ledger, &mut monitor)
            .await;
        assert!(matches!(&outcome, PullOutcome::Aborted(reason) if reason.contains("monitoring")));
        assert!(!artifacts.exists("lang", 11));
        assert!(!monitor.contains(11));
        assert!(ledger.is_empty());
        assert!(h.service.deleted.lock().unwrap().is_empty());

        std::fs::remove_dir(h.layout.monitor_file("lang")).unwrap();
        let retried = h
            .orchestrator
            .run_pull("lang", &pull(11), &build, &artifacts, &mut ledger, &mut monitor)
            .await;
        assert_eq!(retried, PullOutcome::Completed);
        assert!(artifacts.exists("lang", 11));
        assert_eq!(monitor.get(11).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn leftover_analyses_recreate_the_project() {
        let h = harness(true, None);
        h.service.analyses.store(3, Ordering::SeqCst);

        let summary = h
            .orchestrator
            .run_repo("lang", &[pull(12)], &BuildHandler::new("true"))
            .await
            .unwrap();

        assert_eq!(summary.completed, 1);
        assert_eq!(h.service.deleted.lock().unwrap().as_slice(), ["lang-12".to_string()]);
        assert_eq!(h.service.analyses.load(Ordering::SeqCst), 2);
    }
}
