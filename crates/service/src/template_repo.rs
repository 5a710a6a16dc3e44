//! GitHub repositories offered as starting points for a hackathon.

use std::sync::Arc;

use chrono::Utc;
use models::entities::TemplateRepoEntity;
use models::query::partition_key_filter;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::github::GitHubClient;
use crate::pagination::{paginate_by_created_at, PagedResult, Pagination};

static GITHUB_REPO_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https://github\.com/([A-Za-z0-9_.\-]+)/([A-Za-z0-9_.\-]+)$").expect("valid github url pattern")
});

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRepoRequest {
    pub url: String,
}

/// `(owner, repo)` of a `https://github.com/{owner}/{repo}` url. Trailing slashes are ignored.
pub fn parse_github_url(url: &str) -> Option<(String, String)> {
    let caps = GITHUB_REPO_URL.captures(url.trim().trim_end_matches('/'))?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

#[derive(Clone)]
pub struct TemplateRepoManagement {
    ctx: ManagementContext,
    github: Arc<dyn GitHubClient>,
}

impl TemplateRepoManagement {
    pub fn new(ctx: ManagementContext, github: Arc<dyn GitHubClient>) -> Self { Self { ctx, github } }

    #[instrument(skip(self, request), fields(hackathon = %hackathon_name, url = %request.url))]
    pub async fn create_template_repo(&self, hackathon_name: &str, request: &TemplateRepoRequest) -> ServiceResult<TemplateRepoEntity> {
        let url = normalize_url(&request.url)?;
        let mut entity = TemplateRepoEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            url,
            ..Default::default()
        };
        self.fetch_repo_info(&mut entity).await;
        let saved = self.ctx.storage.template_repos.insert(&entity).await?;
        info!(repo_id = %saved.id(), fetched = saved.is_fetched, "template_repo_created");
        Ok(saved)
    }

    /// Refetches languages and topics when the url changes.
    pub async fn update_template_repo(&self, existing: &TemplateRepoEntity, request: &TemplateRepoRequest) -> ServiceResult<TemplateRepoEntity> {
        let url = normalize_url(&request.url)?;
        if url == existing.url && existing.is_fetched {
            return Ok(existing.clone());
        }
        let mut entity = existing.clone();
        entity.url = url;
        entity.is_fetched = false;
        entity.repo_languages = None;
        entity.repo_topics = None;
        self.fetch_repo_info(&mut entity).await;
        Ok(self.ctx.storage.template_repos.replace(&entity).await?)
    }

    pub async fn get_template_repo(&self, hackathon_name: &str, repo_id: &str) -> ServiceResult<Option<TemplateRepoEntity>> {
        if hackathon_name.trim().is_empty() || repo_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.template_repos.retrieve(&hackathon_name.to_lowercase(), repo_id).await?)
    }

    pub async fn list_paginated_template_repos(
        &self,
        hackathon_name: &str,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<TemplateRepoEntity>> {
        let filter = partition_key_filter(&hackathon_name.to_lowercase());
        let all = self.ctx.storage.template_repos.query_entities(Some(&filter)).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    pub async fn delete_template_repo(&self, hackathon_name: &str, repo_id: &str) -> ServiceResult<()> {
        self.ctx.storage.template_repos.delete(&hackathon_name.to_lowercase(), repo_id).await?;
        info!(hackathon = %hackathon_name, repo_id = %repo_id, "template_repo_deleted");
        Ok(())
    }

    /// Failures leave `is_fetched` false.
    async fn fetch_repo_info(&self, entity: &mut TemplateRepoEntity) {
        let Some((owner, repo)) = parse_github_url(&entity.url) else {
            return;
        };
        let languages = self.github.repo_languages(&owner, &repo).await;
        let topics = self.github.repo_topics(&owner, &repo).await;
        match (languages, topics) {
            (Ok(languages), Ok(topics)) => {
                entity.repo_languages = Some(languages);
                entity.repo_topics = Some(topics);
                entity.is_fetched = true;
            }
            (Err(e), _) | (_, Err(e)) => warn!(url = %entity.url, error = %e, "template_repo_fetch_failed"),
        }
    }
}

fn normalize_url(url: &str) -> ServiceResult<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if parse_github_url(trimmed).is_none() {
        return Err(ServiceError::Validation(format!("not a github repository url: {url}")));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::mock::MockGitHubClient;

    fn mgmt() -> TemplateRepoManagement {
        let github = MockGitHubClient::default().with_repo("kaiyuanshe", "demo", &[("Rust", 1200)], &["hackathon"]);
        TemplateRepoManagement::new(ManagementContext::in_memory(), Arc::new(github))
    }

    #[test]
    fn parses_github_urls() {
        assert_eq!(parse_github_url("https://github.com/a/b/"), Some(("a".into(), "b".into())));
        assert!(parse_github_url("https://gitlab.com/a/b").is_none());
        assert!(parse_github_url("https://github.com/a").is_none());
    }

    #[tokio::test]
    async fn fetches_repo_info() -> anyhow::Result<()> {
        let mgmt = mgmt();
        let req = TemplateRepoRequest { url: "https://github.com/kaiyuanshe/demo/".into() };
        let repo = mgmt.create_template_repo("hack", &req).await?;
        assert_eq!(repo.url, "https://github.com/kaiyuanshe/demo");
        assert!(repo.is_fetched);
        assert_eq!(repo.repo_languages.as_ref().and_then(|l| l.get("Rust")), Some(&1200));

        let moved = mgmt.update_template_repo(&repo, &TemplateRepoRequest { url: "https://github.com/x/y".into() }).await?;
        assert!(!moved.is_fetched);
        assert!(moved.repo_topics.is_none());

        assert_eq!(mgmt.list_paginated_template_repos("hack", &Pagination::default()).await?.value.len(), 1);
        mgmt.delete_template_repo("hack", repo.id()).await?;
        assert!(mgmt.get_template_repo("hack", repo.id()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn rejects_non_github_urls() -> anyhow::Result<()> {
        let err = mgmt().create_template_repo("hack", &TemplateRepoRequest { url: "ftp://x".into() }).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        Ok(())
    }
}
