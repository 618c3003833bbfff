//! CLI command definitions and terminal reporting.

pub mod args;

use colored::Colorize;

use prscan::orchestrator::RunSummary;
use prscan::pipeline::{RepoStatus, StageOutcome};

/// One line per repository for a file-producing stage.
pub fn print_stage(stage: &str, outcomes: &[(String, StageOutcome)]) {
    for (repo, outcome) in outcomes {
        let detail = match outcome {
            StageOutcome::Written(n) => format!("{n} records").green(),
            StageOutcome::Skipped => "already done".dimmed(),
            StageOutcome::MissingInput => "missing input".yellow(),
        };
        println!("{} {} {}", stage.bold(), repo, detail);
    }
}

/// Colored summary of an orchestrator run.
pub fn print_run_summary(summaries: &[(String, RunSummary)]) {
    for (repo, s) in summaries {
        println!(
            "{}  {} completed  {} excluded  {} aborted  {} skipped",
            repo.bold(),
            s.completed.to_string().green(),
            s.excluded.to_string().red(),
            s.aborted.to_string().yellow(),
            s.skipped.to_string().dimmed(),
        );
    }
}

pub fn print_status(statuses: &[RepoStatus]) {
    let count = |n: Option<usize>| n.map_or_else(|| "-".to_string(), |n| n.to_string());
    for s in statuses {
        println!(
            "{}  mined {}  prepared {}  completed {}  excluded {}  remaining {}",
            s.repo.bold(),
            count(s.mined),
            count(s.prepared),
            s.completed.to_string().green(),
            s.excluded.to_string().red(),
            count(s.remaining()),
        );
    }
}
