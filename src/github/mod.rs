//! GitHub API clients.
//!
//! [`GraphQlClient`] mines merged pull requests with their commit history and
//! [`RestClient`] lists the files a pull request changed. Both compose a
//! [`RequestSigner`] that carries the token and user agent.

pub mod graphql;
pub mod rest;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use thiserror::Error;
use tracing::debug;

pub use graphql::GraphQlClient;
pub use rest::RestClient;

use crate::constants::USER_AGENT;
use crate::models::PullFile;

/// Errors from the GitHub API.
#[derive(Error, Debug)]
pub enum GitHubError {
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

    #[error("GraphQL query failed: {0}")]
    Query(String),

    #[error("repository {0} not found")]
    RepositoryNotFound(String),

    #[error("GitHub client not configured: {0}")]
    NotConfigured(String),
}

/// Lists the files changed by a pull request.
#[async_trait]
pub trait PullFileSource: Send + Sync {
    async fn pull_files(&self, repo: &str, number: u64) -> Result<Vec<PullFile>, GitHubError>;
}

/// Shared HTTP client that attaches credentials and GitHub headers to every
/// request.
#[derive(Clone)]
pub struct RequestSigner {
    http: reqwest::Client,
    token: Option<String>,
}

impl std::fmt::Debug for RequestSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSigner")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl RequestSigner {
    pub fn new(token: Option<String>) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| GitHubError::NotConfigured(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, token })
    }

    pub fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json");
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send `builder` and require a 2xx status.
    pub async fn send_ok(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response, GitHubError> {
        let response = builder.send().await.map_err(|e| GitHubError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(endpoint, status = status.as_u16(), %body, "GitHub API error");
        Err(GitHubError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }
}
