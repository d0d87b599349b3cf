use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::model::Integrations;
use crate::retry::{RetryClass, RetryPolicy, Sleeper, TokioSleeper};
use crate::snyk::model::{Paginated, SnykOrg, SnykTarget, V1OrgResp};

pub mod model;

pub const REST_VERSION: &str = "2024-10-15";
const PAGE_LIMIT: u32 = 100;

#[derive(Debug, Error)]
pub enum SnykError {
    #[error("Snyk authentication failed ({status}): {body}")]
    Auth { status: StatusCode, body: String },
    #[error("rate limited by Snyk")]
    RateLimited,
    #[error("transient Snyk API failure: {0}")]
    Transient(String),
    #[error("Snyk API error {status}: {body}")]
    Api { status: StatusCode, body: String },
    #[error("invalid Snyk API URL: {0}")]
    Url(String),
    #[error("invalid Snyk response JSON: {0}")]
    Decode(#[from] serde_json::Error),
}

fn classify(err: &SnykError) -> RetryClass {
    match err {
        SnykError::RateLimited => RetryClass::RateLimited,
        SnykError::Transient(_) => RetryClass::Transient,
        _ => RetryClass::Fatal,
    }
}

/// The Snyk operations the pipeline goes through. Faked in tests.
#[async_trait]
pub trait SnykApi: Send + Sync {
    async fn list_orgs(&self, group_id: &str) -> Result<Vec<SnykOrg>, SnykError>;

    async fn org_integrations(&self, org_id: &str) -> Result<Integrations, SnykError>;

    async fn create_org(
        &self,
        template: &SnykOrg,
        source_org_id: &str,
        suffix: u32,
        group_id: &str,
    ) -> Result<SnykOrg, SnykError>;
}

#[derive(Clone)]
pub struct SnykClient {
    http: Client,
    base_url: Url,
    token: String,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for SnykClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnykClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SnykClient {
    /// Build a client for one of the Snyk API tenant hostnames.
    pub fn new(tenant: &str, token: String) -> Result<Self, SnykError> {
        let base_url = Url::parse(&format!("https://{}/", tenant))
            .map_err(|e| SnykError::Url(e.to_string()))?;
        Ok(Self::with_base_url(token, base_url))
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
            policy: RetryPolicy::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy, sleeper: Arc<dyn Sleeper>) -> Self {
        self.policy = policy;
        self.sleeper = sleeper;
        self
    }

    fn auth_header(&self) -> String {
        format!("token {}", self.token)
    }

    fn join_url(&self, path: &str) -> Result<Url, SnykError> {
        self.base_url
            .join(path)
            .map_err(|e| SnykError::Url(e.to_string()))
    }

    /// Resolve a `links.next` cursor (usually a relative path) against the
    /// tenant base URL.
    fn next_page_url(&self, next: &str) -> Result<Url, SnykError> {
        self.join_url(next)
    }

    async fn get_rest_page<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
    ) -> Result<Paginated<T>, SnykError> {
        let res = self
            .http
            .get(url)
            .header("Content-Type", "application/vnd.api+json")
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| SnykError::Transient(e.to_string()))?;

        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SnykError::RateLimited);
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = res.text().await.unwrap_or_default();
            return Err(SnykError::Auth { status, body });
        }
        if status.is_server_error() {
            let body = res.text().await.unwrap_or_default();
            return Err(SnykError::Transient(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SnykError::Api { status, body });
        }

        let body = res
            .text()
            .await
            .map_err(|e| SnykError::Transient(e.to_string()))?;
        Ok(serde_json::from_str(&body)?)
    }

    /// List every org in the group, following `links.next` until absent.
    pub async fn list_group_orgs(&self, group_id: &str) -> Result<Vec<SnykOrg>, SnykError> {
        info!(group_id, "collecting Snyk organizations");
        let mut url = self.join_url(&format!(
            "rest/groups/{}/orgs?version={}&limit={}",
            group_id, REST_VERSION, PAGE_LIMIT
        ))?;
        let mut orgs = Vec::new();
        loop {
            let page: Paginated<SnykOrg> = self.get_rest_page(url).await?;
            orgs.extend(page.data);
            match page.links.next.as_deref() {
                Some(next) => url = self.next_page_url(next)?,
                None => break,
            }
        }
        Ok(orgs)
    }

    /// List every target in an org. Each page is fetched under the retry
    /// policy: 429 waits out the rate limit and retries the same page,
    /// transient failures get a bounded number of fixed-delay attempts.
    pub async fn list_org_targets(&self, org_id: &str) -> Result<Vec<SnykTarget>, SnykError> {
        let mut url = self.join_url(&format!(
            "rest/orgs/{}/targets?version={}&limit={}",
            org_id, REST_VERSION, PAGE_LIMIT
        ))?;
        let mut targets = Vec::new();
        loop {
            let page_url = url.clone();
            let page: Paginated<SnykTarget> = self
                .policy
                .run(self.sleeper.as_ref(), classify, || {
                    self.get_rest_page(page_url.clone())
                })
                .await?;
            targets.extend(page.data);
            match page.links.next.as_deref() {
                Some(next) => url = self.next_page_url(next)?,
                None => break,
            }
        }
        Ok(targets)
    }

    /// Housekeeping primitive; not part of the import pipeline.
    pub async fn delete_target(&self, org_id: &str, target_id: &str) -> Result<(), SnykError> {
        let url = self.join_url(&format!(
            "rest/orgs/{}/targets/{}?version={}",
            org_id, target_id, REST_VERSION
        ))?;
        let res = self
            .http
            .delete(url)
            .header("Content-Type", "application/vnd.api+json")
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| SnykError::Transient(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SnykError::Api { status, body });
        }
        Ok(())
    }

    async fn get_v1_integrations(&self, org_id: &str) -> Result<Integrations, SnykError> {
        let url = self.join_url(&format!("v1/org/{}/integrations", org_id))?;
        let res = self
            .http
            .get(url)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Authorization", self.auth_header())
            .send()
            .await
            .map_err(|e| SnykError::Transient(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SnykError::Api { status, body });
        }
        let value: Value = res
            .json()
            .await
            .map_err(|e| SnykError::Transient(e.to_string()))?;
        let mut integrations = Integrations::new();
        if let Value::Object(map) = value {
            for (name, id) in map {
                if let Value::String(id) = id {
                    integrations.insert(name, id);
                }
            }
        }
        Ok(integrations)
    }

    async fn post_create_org(
        &self,
        template: &SnykOrg,
        source_org_id: &str,
        suffix: u32,
        group_id: &str,
    ) -> Result<SnykOrg, SnykError> {
        let name = format!("{}-{}", template.attributes.name, suffix);
        info!(%name, group_id, "creating Snyk organization");
        let url = self.join_url("v1/org")?;
        let body = json!({
            "name": name,
            "groupId": group_id,
            "sourceOrgId": source_org_id,
        });
        let res = self
            .http
            .post(url)
            .header("Content-Type", "application/json; charset=utf-8")
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .map_err(|e| SnykError::Transient(e.to_string()))?;
        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(SnykError::Api { status, body });
        }
        let created: V1OrgResp = res
            .json()
            .await
            .map_err(|e| SnykError::Transient(e.to_string()))?;
        Ok(created.into())
    }
}

#[async_trait]
impl SnykApi for SnykClient {
    async fn list_orgs(&self, group_id: &str) -> Result<Vec<SnykOrg>, SnykError> {
        self.list_group_orgs(group_id).await
    }

    async fn org_integrations(&self, org_id: &str) -> Result<Integrations, SnykError> {
        self.get_v1_integrations(org_id).await
    }

    async fn create_org(
        &self,
        template: &SnykOrg,
        source_org_id: &str,
        suffix: u32,
        group_id: &str,
    ) -> Result<SnykOrg, SnykError> {
        self.post_create_org(template, source_org_id, suffix, group_id)
            .await
    }
}
