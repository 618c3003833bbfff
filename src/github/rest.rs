//! REST client for pull-request file listings.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use tracing::debug;

use super::{GitHubError, PullFileSource, RequestSigner};
use crate::config::GitHubConfig;
use crate::models::PullFile;

const PER_PAGE: u32 = 100;

pub struct RestClient {
    signer: RequestSigner,
    api_url: String,
    owner: String,
    page_delay: Duration,
}

impl RestClient {
    pub fn new(config: &GitHubConfig, owner: &str) -> Result<Self, GitHubError> {
        Ok(Self {
            signer: RequestSigner::new(config.token.clone())?,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            page_delay: Duration::from_millis(config.files_page_delay_ms),
        })
    }

    async fn files_page(&self, repo: &str, number: u64, page: u32) -> Result<Vec<PullFile>, GitHubError> {
        let endpoint = format!("repos/{}/{repo}/pulls/{number}/files", self.owner);
        let url = format!("{}/{endpoint}", self.api_url);
        let builder = self
            .signer
            .request(Method::GET, &url)
            .query(&[("per_page", PER_PAGE.to_string()), ("page", page.to_string())]);
        let response = self.signer.send_ok(&endpoint, builder).await?;
        response.json().await.map_err(|e| GitHubError::Decode {
            endpoint,
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PullFileSource for RestClient {
    /// Every file of the pull request, paging until an empty page.
    async fn pull_files(&self, repo: &str, number: u64) -> Result<Vec<PullFile>, GitHubError> {
        let mut files = Vec::new();
        let mut page = 1;
        loop {
            let batch = self.files_page(repo, number, page).await?;
            if batch.is_empty() {
                break;
            }
            debug!(repo, pr = number, page, count = batch.len(), "fetched file page");
            files.extend(batch);
            page += 1;
            if !self.page_delay.is_zero() {
                tokio::time::sleep(self.page_delay).await;
            }
        }
        Ok(files)
    }
}
