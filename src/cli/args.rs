//! Clap argument types.

use clap::Parser;
use std::path::PathBuf;

/// Mine merged pull requests and measure the static-analysis issues each one
/// introduces.
#[derive(Parser, Debug)]
#[command(name = "prscan", version = prscan::constants::VERSION)]
pub struct Cli {
    /// Path to a config file (defaults to ./.prscan.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Fetch merged pull requests with their commit history.
    Mine(RepoArgs),

    /// Resolve commit lineage and changed files of mined pull requests.
    Prepare(RepoArgs),

    /// Build, scan and collect issues for every prepared pull request.
    Run(RepoArgs),

    /// Label collected issues as pre-existing or new.
    Classify(RepoArgs),

    /// Characterize completed pull requests and export their timings.
    Report(RepoArgs),

    /// Show per-repository progress.
    Status(RepoArgs),

    /// Print version information.
    Version,
}

/// Repository selection shared by the pipeline commands.
#[derive(Parser, Debug, Default)]
pub struct RepoArgs {
    /// Repository to process (repeatable). Defaults to every configured
    /// repository.
    #[arg(long = "repo", value_name = "REPO")]
    pub repos: Vec<String>,
}
