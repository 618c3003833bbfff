//! Integration tests for resumable orchestration.
//!
//! Drives the orchestrator against fake analysis, snapshot and scanner
//! collaborators and a real shell build command, then re-runs it to check
//! what survives between runs.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pretty_assertions::assert_eq;

use prscan::execution::{AnalysisPoller, BuildHandler, ScanError, ScanTarget, Scanner};
use prscan::models::{FileMetrics, Issue, LineageCommit, MetricsByPath, Origin, PullRequest};
use prscan::orchestrator::{Orchestrator, RunSummary};
use prscan::pipeline::classify_repo;
use prscan::snapshot::{SnapshotError, SnapshotSource, WorkingCopy};
use prscan::sonar::{AnalysisError, AnalysisService};
use prscan::state::{DataLayout, ExclusionLedger, ProgressMonitor};

/// Analysis service whose per-project analysis count is advanced by
/// [`FakeScanner`].
#[derive(Default)]
struct FakeService {
    counts: Arc<Mutex<HashMap<String, u64>>>,
    deleted: Mutex<Vec<String>>,
}

impl FakeService {
    fn count(&self, key: &str) -> u64 {
        self.counts.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl AnalysisService for FakeService {
    async fn create_project(&self, key: &str, _name: &str) -> Result<(), AnalysisError> {
        self.counts.lock().unwrap().entry(key.to_string()).or_insert(0);
        Ok(())
    }

    async fn delete_project(&self, key: &str) -> Result<(), AnalysisError> {
        self.counts.lock().unwrap().remove(key);
        self.deleted.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn analysis_count(&self, key: &str) -> Result<u64, AnalysisError> {
        Ok(self.count(key))
    }

    async fn activity_count(&self, key: &str) -> Result<u64, AnalysisError> {
        Ok(self.count(key))
    }

    /// One issue on the baseline, a second one from the second analysis on.
    async fn issues(&self, key: &str, _files: &BTreeSet<String>) -> Result<Vec<Issue>, AnalysisError> {
        let keys: &[&str] = if self.count(key) >= 2 { &["k1", "k2"] } else { &["k1"] };
        Ok(keys
            .iter()
            .map(|k| Issue {
                key: format!("{key}-{k}"),
                rule: "java:S106".into(),
                severity: "MAJOR".into(),
                component: "src/App.java".into(),
                status: "OPEN".into(),
                debt: Some("10min".into()),
                issue_type: "CODE_SMELL".into(),
                text_range: None,
            })
            .collect())
    }

    async fn metrics(&self, _key: &str) -> Result<MetricsByPath, AnalysisError> {
        let mut metrics = MetricsByPath::new();
        metrics.insert(
            "src/App.java",
            FileMetrics {
                ncloc: Some(120),
                complexity: Some(14),
            },
        );
        metrics.insert("src/Unrelated.java", FileMetrics::default());
        Ok(metrics)
    }
}

/// Submits an analysis for the target project on every successful scan.
struct FakeScanner {
    counts: Arc<Mutex<HashMap<String, u64>>>,
    scans: AtomicUsize,
}

#[async_trait]
impl Scanner for FakeScanner {
    async fn scan(&self, _dir: &Path, target: &ScanTarget) -> Result<(), ScanError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        *self
            .counts
            .lock()
            .unwrap()
            .entry(target.key.clone())
            .or_insert(0) += 1;
        Ok(())
    }
}

/// Materializes a Maven project per commit. Commits in `broken` get a
/// marker file that makes the build fail; commits in `unavailable_once`
/// fail to download the first time they are requested.
struct FakeSnapshots {
    work_dir: PathBuf,
    broken: HashSet<String>,
    unavailable_once: Mutex<HashSet<String>>,
}

#[async_trait]
impl SnapshotSource for FakeSnapshots {
    async fn fetch(&self, repo: &str, commit_sha: &str) -> Result<WorkingCopy, SnapshotError> {
        if self.unavailable_once.lock().unwrap().remove(commit_sha) {
            return Err(SnapshotError::Unavailable {
                url: format!("https://example.invalid/{repo}/archive/{commit_sha}.tar.gz"),
                status: 502,
            });
        }
        let dir = tempfile::tempdir_in(&self.work_dir).unwrap();
        std::fs::write(dir.path().join("pom.xml"), "<project/>").unwrap();
        if self.broken.contains(commit_sha) {
            std::fs::write(dir.path().join("BROKEN"), "").unwrap();
        }
        Ok(WorkingCopy::new(dir))
    }
}

struct Fixture {
    root: tempfile::TempDir,
    layout: DataLayout,
    service: Arc<FakeService>,
    scanner: Arc<FakeScanner>,
    orchestrator: Orchestrator,
    build: BuildHandler,
}

impl Fixture {
    fn new(broken: &[&str], unavailable_once: &[&str]) -> Self {
        let root = tempfile::tempdir().unwrap();
        let work_dir = root.path().join("work");
        std::fs::create_dir_all(&work_dir).unwrap();
        let layout = DataLayout::new(root.path().join("data"));

        let counts = Arc::new(Mutex::new(HashMap::new()));
        let service = Arc::new(FakeService {
            counts: counts.clone(),
            ..FakeService::default()
        });
        let scanner = Arc::new(FakeScanner {
            counts,
            scans: AtomicUsize::new(0),
        });
        let snapshots = Arc::new(FakeSnapshots {
            work_dir,
            broken: broken.iter().map(|s| s.to_string()).collect(),
            unavailable_once: Mutex::new(unavailable_once.iter().map(|s| s.to_string()).collect()),
        });

        let builds_log = root.path().join("builds.log");
        let build = BuildHandler::new(format!(
            "echo mvn >> '{}' && test ! -f BROKEN",
            builds_log.display()
        ));

        let orchestrator = Orchestrator::new(
            service.clone(),
            snapshots,
            scanner.clone(),
            AnalysisPoller::new(Duration::from_millis(1), Some(Duration::from_secs(5))),
            layout.clone(),
        );
        Self {
            root,
            layout,
            service,
            scanner,
            orchestrator,
            build,
        }
    }

    async fn run(&self, pulls: &[PullRequest]) -> RunSummary {
        self.orchestrator
            .run_repo("lang", pulls, &self.build)
            .await
            .unwrap()
    }

    fn builds(&self) -> usize {
        std::fs::read_to_string(self.root.path().join("builds.log"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    fn scans(&self) -> usize {
        self.scanner.scans.load(Ordering::SeqCst)
    }

    fn work_dir_is_empty(&self) -> bool {
        std::fs::read_dir(self.root.path().join("work"))
            .unwrap()
            .next()
            .is_none()
    }
}

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

/// A PR with commits `{n}a`, `{n}b`, `{n}c`, defined by `{n}b`.
fn pull(number: u64) -> PullRequest {
    let commit = |suffix: &str, day: u32| LineageCommit {
        sha: format!("{number}{suffix}"),
        created_at: ts(&format!("2023-03-{day:02}T12:00:00Z")),
        is_merge_artifact: false,
    };
    PullRequest {
        number,
        created_at: ts("2023-03-10T00:00:00Z"),
        commits: vec![commit("a", 1), commit("b", 2), commit("c", 11)],
        pr_commit: format!("{number}b"),
        start_commit: format!("{number}a"),
        is_pr_commit_first: false,
        changed_files: BTreeSet::from(["src/App.java".to_string()]),
        moved_files: vec![],
    }
}

#[tokio::test]
async fn second_run_is_a_no_op_with_identical_artifacts() {
    let fx = Fixture::new(&[], &[]);
    let pulls = [pull(1), pull(2)];

    let first = fx.run(&pulls).await;
    assert_eq!(first.completed, 2);
    assert_eq!(fx.builds(), 6);
    assert_eq!(fx.scans(), 6);

    let artifacts = fx.layout.artifacts();
    let before: Vec<String> = [1, 2]
        .iter()
        .map(|n| std::fs::read_to_string(artifacts.path("lang", *n)).unwrap())
        .collect();

    let second = fx.run(&pulls).await;
    assert_eq!(
        second,
        RunSummary {
            skipped: 2,
            ..RunSummary::default()
        }
    );
    assert_eq!(fx.builds(), 6);
    assert_eq!(fx.scans(), 6);

    let after: Vec<String> = [1, 2]
        .iter()
        .map(|n| std::fs::read_to_string(artifacts.path("lang", *n)).unwrap())
        .collect();
    assert_eq!(before, after);
    assert!(fx.work_dir_is_empty());
}

#[tokio::test]
async fn artifacts_hold_the_ordered_sequence_and_changed_file_metrics() {
    let fx = Fixture::new(&[], &[]);
    fx.run(&[pull(7)]).await;

    let snapshots = fx.layout.artifacts().get("lang", 7).unwrap().unwrap();
    let shas: Vec<&str> = snapshots.iter().map(|s| s.commit_sha.as_str()).collect();
    assert_eq!(shas, vec!["7a", "7b", "7c"]);
    for snapshot in &snapshots {
        assert_eq!(snapshot.metrics.len(), 1);
        assert_eq!(snapshot.metrics.get("src/App.java").unwrap().ncloc, Some(120));
    }

    let monitor = ProgressMonitor::load(fx.layout.monitor_file("lang")).unwrap();
    let timings: Vec<&String> = monitor.get(7).unwrap().keys().collect();
    assert_eq!(timings, vec!["7a", "7b", "7c"]);
}

#[tokio::test]
async fn build_failure_is_never_retried() {
    let fx = Fixture::new(&["3b"], &[]);
    let pulls = [pull(3)];

    let first = fx.run(&pulls).await;
    assert_eq!(first.excluded, 1);
    assert_eq!(fx.builds(), 2);
    assert_eq!(fx.scans(), 1);

    let ledger = ExclusionLedger::load(fx.layout.ledger_file("lang")).unwrap();
    assert_eq!(ledger.reason(3), Some("build failed at commit 2 (3b)"));
    assert_eq!(*fx.service.deleted.lock().unwrap(), vec!["lang-3".to_string()]);
    assert!(!fx.layout.artifacts().exists("lang", 3));
    assert!(!ProgressMonitor::load(fx.layout.monitor_file("lang")).unwrap().contains(3));

    for _ in 0..2 {
        let again = fx.run(&pulls).await;
        assert_eq!(again.skipped, 1);
    }
    assert_eq!(fx.builds(), 2);
    assert!(fx.work_dir_is_empty());
}

#[tokio::test]
async fn transient_failure_is_retried_on_next_run() {
    let fx = Fixture::new(&[], &["4c"]);
    let pulls = [pull(4)];

    let first = fx.run(&pulls).await;
    assert_eq!(first.aborted, 1);
    assert!(ExclusionLedger::load(fx.layout.ledger_file("lang")).unwrap().is_empty());
    assert_eq!(*fx.service.deleted.lock().unwrap(), vec!["lang-4".to_string()]);
    assert!(!fx.layout.artifacts().exists("lang", 4));
    assert!(!ProgressMonitor::load(fx.layout.monitor_file("lang")).unwrap().contains(4));

    let second = fx.run(&pulls).await;
    assert_eq!(second.completed, 1);
    assert_eq!(fx.builds(), 2 + 3);
    assert!(fx.layout.artifacts().exists("lang", 4));
    assert!(fx.work_dir_is_empty());
}

#[tokio::test]
async fn completed_artifacts_classify_into_pre_existing_and_new() {
    let fx = Fixture::new(&[], &[]);
    let pulls = [pull(5)];
    fx.run(&pulls).await;

    let records = classify_repo(&fx.layout, "lang", &pulls).unwrap();
    let labelled: Vec<(&str, Origin)> = records.iter().map(|r| (r.key.as_str(), r.origin)).collect();
    assert_eq!(
        labelled,
        vec![("lang-5-k1", Origin::PreExisting), ("lang-5-k2", Origin::New)]
    );
    assert!(records.iter().all(|r| r.debt_minutes == Some(10) && r.complexity_of_file == Some(14)));
}
