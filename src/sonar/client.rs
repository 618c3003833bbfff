//! SonarQube Web API client.

use std::collections::BTreeSet;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::{AnalysisError, AnalysisService};
use crate::config::SonarConfig;
use crate::constants::USER_AGENT;
use crate::models::{FileMetrics, Issue, MetricsByPath, TextRange};

/// Page size for issue and measure queries.
const PAGE_SIZE: u64 = 500;

/// The service refuses to page past 10 000 results.
const MAX_ISSUE_PAGES: u64 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Paging {
    total: u64,
}

#[derive(Debug, Deserialize)]
struct PagedResponse {
    paging: Paging,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireIssue {
    key: String,
    #[serde(default)]
    rule: String,
    #[serde(default)]
    severity: String,
    component: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    debt: Option<String>,
    #[serde(default, rename = "type")]
    issue_type: String,
    #[serde(default)]
    text_range: Option<TextRange>,
}

#[derive(Debug, Deserialize)]
struct IssuesPage {
    #[serde(default)]
    issues: Vec<WireIssue>,
    total: u64,
}

#[derive(Debug, Deserialize)]
struct Measure {
    metric: String,
    #[serde(default)]
    value: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TreeComponent {
    key: String,
    #[serde(default)]
    measures: Vec<Measure>,
}

#[derive(Debug, Deserialize)]
struct ComponentTreePage {
    #[serde(default)]
    components: Vec<TreeComponent>,
    paging: Paging,
}

/// HTTP client for a SonarQube server, authenticated with a bearer token.
pub struct SonarClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
    language: String,
}

impl SonarClient {
    pub fn new(config: &SonarConfig) -> Result<Self, AnalysisError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| AnalysisError::NotConfigured(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: config.host.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            language: config.language.clone(),
        })
    }

    fn request(&self, method: Method, endpoint: &str) -> RequestBuilder {
        let builder = self
            .http
            .request(method, format!("{}/api/{endpoint}", self.base_url));
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn send(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response, AnalysisError> {
        builder.send().await.map_err(|e| AnalysisError::Request {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    /// Send and require a 2xx status.
    async fn send_ok(&self, endpoint: &str, builder: RequestBuilder) -> Result<Response, AnalysisError> {
        let response = self.send(endpoint, builder).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(endpoint, status = status.as_u16(), %body, "analysis service error");
        Err(AnalysisError::Status {
            endpoint: endpoint.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, AnalysisError> {
        let builder = self.request(Method::GET, endpoint).query(query);
        let response = self.send_ok(endpoint, builder).await?;
        response.json().await.map_err(|e| AnalysisError::Decode {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })
    }

    async fn project_exists(&self, key: &str) -> Result<bool, AnalysisError> {
        let endpoint = "components/show";
        let builder = self
            .request(Method::GET, endpoint)
            .query(&[("component", key)]);
        let response = self.send(endpoint, builder).await?;
        Ok(response.status().is_success())
    }

    async fn file_issues(&self, key: &str, file: &str) -> Result<Vec<Issue>, AnalysisError> {
        let prefix = format!("{key}:");
        let mut issues = Vec::new();
        let mut page = 1;
        loop {
            let data: IssuesPage = self
                .get_json(
                    "issues/search",
                    &[
                        ("componentKeys", key.to_string()),
                        ("languages", self.language.clone()),
                        ("files", file.to_string()),
                        ("p", page.to_string()),
                        ("ps", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;

            issues.extend(data.issues.into_iter().map(|wire| Issue {
                key: wire.key,
                rule: wire.rule,
                severity: wire.severity,
                component: strip_project(&wire.component, &prefix),
                status: wire.status,
                debt: wire.debt,
                issue_type: wire.issue_type,
                text_range: wire.text_range,
            }));

            debug!(file, page, total = data.total, "fetched issue page");
            if data.total == 0 || page * PAGE_SIZE >= data.total || page >= MAX_ISSUE_PAGES {
                break;
            }
            page += 1;
        }
        Ok(issues)
    }
}

fn strip_project(component: &str, prefix: &str) -> String {
    component
        .strip_prefix(prefix)
        .unwrap_or(component)
        .to_string()
}

fn measure(measures: &[Measure], name: &str) -> Option<u64> {
    measures
        .iter()
        .find(|m| m.metric == name)
        .and_then(|m| m.value.as_deref())
        .and_then(|v| v.parse().ok())
}

#[async_trait]
impl AnalysisService for SonarClient {
    async fn create_project(&self, key: &str, name: &str) -> Result<(), AnalysisError> {
        if self.project_exists(key).await? {
            debug!(key, "analysis project already exists");
            return Ok(());
        }
        let endpoint = "projects/create";
        let builder = self
            .request(Method::POST, endpoint)
            .query(&[("name", name), ("project", key)]);
        self.send_ok(endpoint, builder).await?;
        Ok(())
    }

    async fn delete_project(&self, key: &str) -> Result<(), AnalysisError> {
        let endpoint = "projects/delete";
        let builder = self
            .request(Method::POST, endpoint)
            .query(&[("project", key)]);
        self.send_ok(endpoint, builder).await?;
        Ok(())
    }

    async fn analysis_count(&self, key: &str) -> Result<u64, AnalysisError> {
        let data: PagedResponse = self
            .get_json("project_analyses/search", &[("project", key.to_string())])
            .await?;
        Ok(data.paging.total)
    }

    async fn activity_count(&self, key: &str) -> Result<u64, AnalysisError> {
        let data: PagedResponse = self
            .get_json("ce/activity", &[("component", key.to_string())])
            .await?;
        Ok(data.paging.total)
    }

    async fn issues(&self, key: &str, files: &BTreeSet<String>) -> Result<Vec<Issue>, AnalysisError> {
        let mut issues = Vec::new();
        for file in files {
            issues.extend(self.file_issues(key, file).await?);
        }
        Ok(issues)
    }

    async fn metrics(&self, key: &str) -> Result<MetricsByPath, AnalysisError> {
        let prefix = format!("{key}:");
        let mut metrics = MetricsByPath::new();
        let mut page = 1;
        loop {
            let data: ComponentTreePage = self
                .get_json(
                    "measures/component_tree",
                    &[
                        ("component", key.to_string()),
                        ("metricKeys", "ncloc,complexity".to_string()),
                        ("p", page.to_string()),
                        ("ps", PAGE_SIZE.to_string()),
                    ],
                )
                .await?;

            for component in data.components {
                metrics.insert(
                    strip_project(&component.key, &prefix),
                    FileMetrics {
                        ncloc: measure(&component.measures, "ncloc"),
                        complexity: measure(&component.measures, "complexity"),
                    },
                );
            }

            if data.paging.total <= page * PAGE_SIZE {
                break;
            }
            page += 1;
        }
        Ok(metrics)
    }
}
