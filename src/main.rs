//! prscan: pull-request static-analysis mining CLI.
//!
//! Entry point and error handling boundary. Uses `anyhow` for
//! ergonomic error propagation and user-facing messages.

mod cli;

use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use cli::args::{Cli, Command};
use prscan::config::Config;
use prscan::constants;
use prscan::env::Env;
use prscan::logging;
use prscan::pipeline::Pipeline;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Command::Version = cli.command {
        return run_version();
    }

    let cwd = std::env::current_dir().context("failed to determine working directory")?;
    let config = Config::load(cli.config.as_deref(), Some(cwd.as_path()), &Env::real())
        .context("failed to load configuration")?;
    let pipeline = Pipeline::new(config);
    logging::init(cli.verbose, Some(pipeline.layout().log_file().as_path()))
        .context("failed to open log file")?;

    match cli.command {
        Command::Mine(args) => {
            let repos = pipeline.repos(&args.repos);
            let outcomes = pipeline.mine(&repos).await.context("mining failed")?;
            cli::print_stage("mine", &outcomes);
        }
        Command::Prepare(args) => {
            let repos = pipeline.repos(&args.repos);
            let outcomes = pipeline.prepare(&repos).await.context("preparation failed")?;
            cli::print_stage("prepare", &outcomes);
        }
        Command::Run(args) => {
            let repos = pipeline.repos(&args.repos);
            let summaries = pipeline.run(&repos).await.context("analysis run failed")?;
            cli::print_run_summary(&summaries);
        }
        Command::Classify(args) => {
            let repos = pipeline.repos(&args.repos);
            let outcomes = pipeline.classify(&repos).context("classification failed")?;
            cli::print_stage("classify", &outcomes);
        }
        Command::Report(args) => {
            let repos = pipeline.repos(&args.repos);
            let outcomes = pipeline.report(&repos).context("report failed")?;
            cli::print_stage("report", &outcomes);
        }
        Command::Status(args) => {
            let repos = pipeline.repos(&args.repos);
            cli::print_status(&pipeline.status(&repos)?);
        }
        Command::Version => run_version()?,
    }
    Ok(())
}

/// Print version information.
fn run_version() -> Result<()> {
    use colored::Colorize;

    println!("{} {}", constants::APP_NAME.bold(), constants::VERSION.green().bold());
    Ok(())
}
