//! Per-commit execution steps: build, scan, ingestion poll and collection.

pub mod build;
pub mod collector;
pub mod command;
pub mod poller;
pub mod scanner;

pub use build::{BuildError, BuildHandler, BuildSystem};
pub use collector::IssueCollector;
pub use command::{CommandError, CommandOutput};
pub use poller::{AnalysisPoller, PollError};
pub use scanner::{ScanError, ScanTarget, Scanner, SonarScanner};
