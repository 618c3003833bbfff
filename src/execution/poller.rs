//! Waiting for the analysis service to ingest a scan.

use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::debug;

use crate::sonar::{AnalysisError, AnalysisService};

/// Errors while waiting for ingestion.
#[derive(Error, Debug)]
pub enum PollError {
    #[error(
        "ingestion not complete after {}s (expected {expected}, analyses {analyses}, activities {activities})",
        .waited.as_secs()
    )]
    TimedOut {
        expected: u64,
        analyses: u64,
        activities: u64,
        waited: Duration,
    },

    #[error(transparent)]
    Service(#[from] AnalysisError),
}

/// Polls the analysis and background-activity counts of a project.
#[derive(Debug, Clone)]
pub struct AnalysisPoller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl AnalysisPoller {
    /// `timeout` of `None` polls until the counts match, however long that
    /// takes.
    pub fn new(interval: Duration, timeout: Option<Duration>) -> Self {
        Self { interval, timeout }
    }

    /// Block until both counts for `key` equal `expected`.
    ///
    /// Returns the number of checks performed.
    pub async fn wait_for(
        &self,
        service: &dyn AnalysisService,
        key: &str,
        expected: u64,
    ) -> Result<u32, PollError> {
        let started = Instant::now();
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let analyses = service.analysis_count(key).await?;
            let activities = service.activity_count(key).await?;
            if analyses == expected && activities == expected {
                debug!(key, expected, attempts, "analysis ingested");
                return Ok(attempts);
            }

            if let Some(limit) = self.timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    return Err(PollError::TimedOut {
                        expected,
                        analyses,
                        activities,
                        waited,
                    });
                }
            }

            debug!(key, expected, analyses, activities, "waiting for ingestion");
            tokio::time::sleep(self.interval).await;
        }
    }
}
