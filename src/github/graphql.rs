//! GraphQL mining of merged pull requests.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{GitHubError, RequestSigner};
use crate::config::GitHubConfig;
use crate::models::{RawCommit, RawPullRequest};

const MERGED_PULLS_QUERY: &str = r#"
query ($owner: String!, $name: String!, $after: String) {
  repository(owner: $owner, name: $name) {
    pullRequests(first: 100, after: $after, orderBy: {field: CREATED_AT, direction: DESC}, states: MERGED) {
      totalCount
      nodes {
        number
        createdAt
        mergedAt
        additions
        deletions
        changedFiles
        commits(first: 100) {
          totalCount
          nodes {
            commit {
              oid
              committer { date }
              parents(first: 2) { nodes { oid } }
            }
          }
        }
      }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<QueryData>,
    #[serde(default)]
    errors: Vec<GraphQlErrorMessage>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorMessage {
    message: String,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    repository: Option<Repository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Repository {
    pull_requests: PullConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullConnection {
    total_count: u64,
    nodes: Vec<PullNode>,
    page_info: PageInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PullNode {
    number: u64,
    created_at: DateTime<Utc>,
    merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changed_files: u64,
    commits: CommitConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommitConnection {
    total_count: u64,
    nodes: Vec<CommitNode>,
}

#[derive(Debug, Deserialize)]
struct CommitNode {
    commit: WireCommit,
}

#[derive(Debug, Deserialize)]
struct WireCommit {
    oid: String,
    committer: Committer,
    parents: ParentConnection,
}

#[derive(Debug, Deserialize)]
struct Committer {
    date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ParentConnection {
    nodes: Vec<ParentNode>,
}

#[derive(Debug, Deserialize)]
struct ParentNode {
    oid: String,
}

impl From<PullNode> for RawPullRequest {
    fn from(node: PullNode) -> Self {
        Self {
            number: node.number,
            created_at: node.created_at,
            merged_at: node.merged_at,
            additions: node.additions,
            deletions: node.deletions,
            changed_files: node.changed_files,
            commits_total: node.commits.total_count,
            commits: node
                .commits
                .nodes
                .into_iter()
                .map(|n| RawCommit {
                    sha: n.commit.oid,
                    committed_at: n.commit.committer.date,
                    parent_shas: n.commit.parents.nodes.into_iter().map(|p| p.oid).collect(),
                })
                .collect(),
        }
    }
}

/// Client for the GitHub GraphQL endpoint.
pub struct GraphQlClient {
    signer: RequestSigner,
    endpoint_url: String,
    owner: String,
    page_delay: Duration,
}

impl GraphQlClient {
    pub fn new(config: &GitHubConfig, owner: &str) -> Result<Self, GitHubError> {
        if config.token.is_none() {
            return Err(GitHubError::NotConfigured(
                "the GraphQL API requires a token (set GITHUB_TOKEN)".into(),
            ));
        }
        Ok(Self {
            signer: RequestSigner::new(config.token.clone())?,
            endpoint_url: format!("{}/graphql", config.api_url.trim_end_matches('/')),
            owner: owner.to_string(),
            page_delay: Duration::from_secs(config.page_delay_secs),
        })
    }

    /// Use a different delay between result pages.
    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    async fn query_page(&self, repo: &str, after: Option<&str>) -> Result<PullConnection, GitHubError> {
        let body = json!({
            "query": MERGED_PULLS_QUERY,
            "variables": {"owner": self.owner, "name": repo, "after": after},
        });
        let builder = self.signer.request(Method::POST, &self.endpoint_url).json(&body);
        let response = self.signer.send_ok("graphql", builder).await?;
        let parsed: GraphQlResponse = response.json().await.map_err(|e| GitHubError::Decode {
            endpoint: "graphql".into(),
            message: e.to_string(),
        })?;

        if !parsed.errors.is_empty() {
            let messages: Vec<String> = parsed.errors.into_iter().map(|e| e.message).collect();
            return Err(GitHubError::Query(messages.join("; ")));
        }
        parsed
            .data
            .and_then(|d| d.repository)
            .map(|r| r.pull_requests)
            .ok_or_else(|| GitHubError::RepositoryNotFound(format!("{}/{repo}", self.owner)))
    }

    /// All merged pull requests of `repo`, newest first.
    pub async fn merged_pulls(&self, repo: &str) -> Result<Vec<RawPullRequest>, GitHubError> {
        let mut pulls = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.query_page(repo, cursor.as_deref()).await?;
            debug!(repo, fetched = pulls.len() + page.nodes.len(), total = page.total_count, "fetched pull request page");
            pulls.extend(page.nodes.into_iter().map(RawPullRequest::from));

            if !page.page_info.has_next_page {
                break;
            }
            cursor = page.page_info.end_cursor;
            if !self.page_delay.is_zero() {
                info!(repo, delay_secs = self.page_delay.as_secs(), "waiting before next page");
                tokio::time::sleep(self.page_delay).await;
            }
        }
        Ok(pulls)
    }
}
