//! Analysis-service abstraction.
//!
//! The orchestrator only talks to the service through [`AnalysisService`],
//! which lets tests substitute an in-memory fake. [`SonarClient`] is the
//! production implementation over the SonarQube Web API.

pub mod client;

use std::collections::BTreeSet;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Issue, MetricsByPath};

pub use client::SonarClient;

/// Errors talking to the analysis service.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("request to {endpoint} failed: {message}")]
    Request { endpoint: String, message: String },

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[error("unexpected response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("analysis service not configured: {0}")]
    NotConfigured(String),
}

/// Remote project lifecycle and result retrieval.
///
/// Every method is keyed by the project key (`{repo}-{pr}`).
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Create the project unless it already exists.
    async fn create_project(&self, key: &str, name: &str) -> Result<(), AnalysisError>;

    async fn delete_project(&self, key: &str) -> Result<(), AnalysisError>;

    /// Number of analyses recorded in the project history.
    async fn analysis_count(&self, key: &str) -> Result<u64, AnalysisError>;

    /// Number of background ingestion tasks recorded for the project.
    async fn activity_count(&self, key: &str) -> Result<u64, AnalysisError>;

    /// Issues currently reported for the given repository-relative files.
    async fn issues(&self, key: &str, files: &BTreeSet<String>) -> Result<Vec<Issue>, AnalysisError>;

    /// Size and complexity of every file in the project.
    async fn metrics(&self, key: &str) -> Result<MetricsByPath, AnalysisError>;
}
