//! Static-analysis scan invocation.

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::command::{CommandError, run_program};
use crate::config::SonarConfig;

/// The separator line the scanner prints around its summary block.
const SCANNER_SEPARATOR: &str =
    "------------------------------------------------------------------------";

/// Lines of context kept before the last separator.
const SCAN_TAIL_LINES: usize = 10;

/// Errors from the scan step.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error("scanner exited with {}", .code.map_or("signal".to_string(), |c| format!("code {c}")))]
    Failed {
        code: Option<i32>,
        /// Failure-relevant tail of the scanner output.
        tail: Vec<String>,
    },

    #[error(transparent)]
    Command(#[from] CommandError),
}

/// Identity of the remote project a scan reports into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanTarget {
    pub key: String,
    pub name: String,
}

/// Runs a static-analysis scan over a working copy.
#[async_trait]
pub trait Scanner: Send + Sync {
    async fn scan(&self, dir: &Path, target: &ScanTarget) -> Result<(), ScanError>;
}

/// `sonar-scanner` invocation parameterized by project and working directory.
pub struct SonarScanner {
    program: String,
    base_args: Vec<String>,
    host: String,
    token: Option<String>,
    language: String,
    binaries: String,
    exclusions: Vec<String>,
}

impl SonarScanner {
    pub fn new(config: &SonarConfig) -> Self {
        let mut parts = config.scanner_command.split_whitespace().map(str::to_string);
        let program = parts.next().unwrap_or_else(|| "sonar-scanner".to_string());
        Self {
            program,
            base_args: parts.collect(),
            host: config.host.clone(),
            token: config.token.clone(),
            language: config.language.clone(),
            binaries: config.binaries.clone(),
            exclusions: config.exclusions.clone(),
        }
    }

    /// Command-line arguments for a scan of `target`.
    pub fn arguments(&self, target: &ScanTarget) -> Vec<String> {
        let mut args = self.base_args.clone();
        if let Some(token) = &self.token {
            args.push(format!("-Dsonar.token={token}"));
        }
        args.extend([
            format!("-Dsonar.projectKey={}", target.key),
            format!("-Dsonar.projectName={}", target.name),
            "-Dsonar.projectBaseDir=.".to_string(),
            format!("-Dsonar.host.url={}", self.host),
            "-Dsonar.scm.disabled=true".to_string(),
            format!("-Dsonar.language={}", self.language),
            format!("-Dsonar.java.binaries={}", self.binaries),
        ]);
        if !self.exclusions.is_empty() {
            args.push(format!("-Dsonar.exclusions={}", self.exclusions.join(",")));
        }
        args
    }
}

#[async_trait]
impl Scanner for SonarScanner {
    async fn scan(&self, dir: &Path, target: &ScanTarget) -> Result<(), ScanError> {
        debug!(program = %self.program, project = %target.key, "running scanner");
        let output = run_program(&self.program, &self.arguments(target), dir, None).await?;
        if output.success {
            return Ok(());
        }
        Err(ScanError::Failed {
            code: output.code,
            tail: scan_failure_tail(&output.lines()),
        })
    }
}

/// The lines preceding the last separator line, where the scanner prints
/// its error summary. Empty when no separator is present.
pub fn scan_failure_tail(lines: &[&str]) -> Vec<String> {
    let Some(last_separator) = lines.iter().rposition(|l| l.contains(SCANNER_SEPARATOR)) else {
        return Vec::new();
    };
    let start = last_separator.saturating_sub(SCAN_TAIL_LINES);
    lines[start..last_separator]
        .iter()
        .map(|l| l.to_string())
        .collect()
}
