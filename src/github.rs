use reqwest::{Client, StatusCode, Url};
use std::fmt;
use thiserror::Error;
use tracing::info;

use crate::model::SourceOrg;

const GITHUB_API_BASE: &str = "https://api.github.com/";
const PER_PAGE: u32 = 100;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("GitHub authentication failed ({status}): {body}")]
    Auth { status: StatusCode, body: String },
    #[error("failed to reach GitHub: {0}")]
    Network(String),
    #[error("GitHub API error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("invalid GitHub API URL: {0}")]
    Url(String),
}

#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    pub fn new(token: String) -> Self {
        let base_url = Url::parse(GITHUB_API_BASE).expect("valid default GitHub URL");
        Self::with_base_url(token, base_url)
    }

    pub fn with_base_url(token: String, base_url: Url) -> Self {
        let http = Client::builder()
            .user_agent("snyk-bulk-import/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url,
            token,
        }
    }

    /// List every organization the token's user belongs to, walking page
    /// numbers until an empty page comes back.
    pub async fn list_organizations(&self) -> Result<Vec<SourceOrg>, GithubError> {
        info!("collecting GitHub organizations");
        let mut orgs = Vec::new();
        let mut page = 1u32;
        loop {
            let url = self
                .base_url
                .join(&format!("user/orgs?per_page={}&page={}", PER_PAGE, page))
                .map_err(|e| GithubError::Url(e.to_string()))?;
            let res = self
                .http
                .get(url)
                .header("Authorization", format!("Bearer {}", self.token))
                .header("Accept", "application/vnd.github+json")
                .send()
                .await
                .map_err(|e| GithubError::Network(e.to_string()))?;

            let status = res.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                let body = res.text().await.unwrap_or_default();
                return Err(GithubError::Auth { status, body });
            }
            if !status.is_success() {
                let body = res.text().await.unwrap_or_default();
                return Err(GithubError::Api { status, body });
            }

            let batch: Vec<SourceOrg> = res
                .json()
                .await
                .map_err(|e| GithubError::Network(e.to_string()))?;
            if batch.is_empty() {
                break;
            }
            orgs.extend(batch);
            page += 1;
        }
        Ok(orgs)
    }
}
