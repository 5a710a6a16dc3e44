//! GitHub REST lookups for template repositories.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::errors::{ServiceError, ServiceResult};

const USER_AGENT: &str = "open-hackathon-server";

#[async_trait]
pub trait GitHubClient: Send + Sync {
    /// Bytes of code per language.
    async fn repo_languages(&self, owner: &str, repo: &str) -> ServiceResult<BTreeMap<String, u64>>;
    async fn repo_topics(&self, owner: &str, repo: &str) -> ServiceResult<Vec<String>>;
}

pub struct RestGitHubClient {
    client: reqwest::Client,
    api_base: String,
    token: Option<String>,
}

#[derive(Deserialize)]
struct TopicsResponse {
    #[serde(default)]
    names: Vec<String>,
}

impl RestGitHubClient {
    pub fn new(cfg: &configs::GitHubConfig) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
            token: cfg.token.clone().filter(|t| !t.trim().is_empty()),
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> ServiceResult<T> {
        let url = format!("{}{}", self.api_base, path);
        let mut req = self.client.get(&url).header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ServiceError::Upstream(format!("GET {url} returned {status}")));
        }
        debug!(url = %url, "github_fetched");
        Ok(resp.json::<T>().await?)
    }
}

#[async_trait]
impl GitHubClient for RestGitHubClient {
    async fn repo_languages(&self, owner: &str, repo: &str) -> ServiceResult<BTreeMap<String, u64>> {
        self.get_json(&format!("/repos/{owner}/{repo}/languages")).await
    }

    async fn repo_topics(&self, owner: &str, repo: &str) -> ServiceResult<Vec<String>> {
        let topics: TopicsResponse = self.get_json(&format!("/repos/{owner}/{repo}/topics")).await?;
        Ok(topics.names)
    }
}

pub mod mock {
    use super::*;
    use dashmap::DashMap;

    /// Serves canned answers keyed by `owner/repo`; unknown repos fail.
    #[derive(Default)]
    pub struct MockGitHubClient {
        languages: DashMap<String, BTreeMap<String, u64>>,
        topics: DashMap<String, Vec<String>>,
    }

    impl MockGitHubClient {
        pub fn with_repo(self, owner: &str, repo: &str, languages: &[(&str, u64)], topics: &[&str]) -> Self {
            let key = format!("{owner}/{repo}");
            self.languages
                .insert(key.clone(), languages.iter().map(|(l, n)| (l.to_string(), *n)).collect());
            self.topics.insert(key, topics.iter().map(|t| t.to_string()).collect());
            self
        }
    }

    #[async_trait]
    impl GitHubClient for MockGitHubClient {
        async fn repo_languages(&self, owner: &str, repo: &str) -> ServiceResult<BTreeMap<String, u64>> {
            self.languages
                .get(&format!("{owner}/{repo}"))
                .map(|l| l.clone())
                .ok_or_else(|| ServiceError::Upstream(format!("{owner}/{repo} not found")))
        }

        async fn repo_topics(&self, owner: &str, repo: &str) -> ServiceResult<Vec<String>> {
            self.topics
                .get(&format!("{owner}/{repo}"))
                .map(|t| t.clone())
                .ok_or_else(|| ServiceError::Upstream(format!("{owner}/{repo} not found")))
        }
    }
}
