//! Judges of a hackathon.

use std::time::Duration;

use models::entities::JudgeEntity;
use models::query::partition_key_filter;
use tracing::{info, instrument};

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::pagination::{paginate_by_created_at, PagedResult, Pagination};

pub const MAX_JUDGES_PER_HACKATHON: usize = 100;
const JUDGE_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Clone)]
pub struct JudgeManagement {
    ctx: ManagementContext,
}

impl JudgeManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    #[instrument(skip(self, description), fields(hackathon = %hackathon_name, user_id = %user_id))]
    pub async fn create_judge(&self, hackathon_name: &str, user_id: &str, description: Option<String>) -> ServiceResult<JudgeEntity> {
        let existing = self.list_judges(hackathon_name).await?;
        if existing.len() >= MAX_JUDGES_PER_HACKATHON && !existing.iter().any(|j| j.user_id() == user_id) {
            return Err(ServiceError::PreconditionFailed(format!(
                "a hackathon can have at most {MAX_JUDGES_PER_HACKATHON} judges"
            )));
        }
        let entity = JudgeEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: user_id.to_string(),
            created_at: chrono::Utc::now(),
            description,
            ..Default::default()
        };
        let saved = self.ctx.storage.judges.insert_or_replace(&entity).await?;
        self.invalidate(hackathon_name).await;
        info!("judge_created");
        Ok(saved)
    }

    /// Keeps the old description when none is given.
    pub async fn update_judge(&self, existing: &JudgeEntity, description: Option<String>) -> ServiceResult<JudgeEntity> {
        let mut entity = existing.clone();
        entity.description = description.or_else(|| existing.description.clone());
        let saved = self.ctx.storage.judges.insert_or_replace(&entity).await?;
        self.invalidate(existing.hackathon_name()).await;
        Ok(saved)
    }

    pub async fn get_judge(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<Option<JudgeEntity>> {
        if hackathon_name.trim().is_empty() || user_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.judges.retrieve(&hackathon_name.to_lowercase(), user_id).await?)
    }

    /// Judges of a hackathon, cached for six hours.
    pub async fn list_judges(&self, hackathon_name: &str) -> ServiceResult<Vec<JudgeEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::Judge, &name),
                JUDGE_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move { storage.judges.query_entities(Some(&partition_key_filter(&name))).await.map_err(ServiceError::from) }
                },
                false,
            )
            .await
    }

    pub async fn is_judge(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<bool> {
        if user_id.trim().is_empty() {
            return Ok(false);
        }
        Ok(self.list_judges(hackathon_name).await?.iter().any(|j| j.user_id() == user_id))
    }

    pub async fn list_paginated_judges(&self, hackathon_name: &str, pagination: &Pagination) -> ServiceResult<PagedResult<JudgeEntity>> {
        let all = self.list_judges(hackathon_name).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    #[instrument(skip(self), fields(hackathon = %hackathon_name, user_id = %user_id))]
    pub async fn delete_judge(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<()> {
        self.ctx.storage.judges.delete(&hackathon_name.to_lowercase(), user_id).await?;
        self.invalidate(hackathon_name).await;
        info!("judge_deleted");
        Ok(())
    }

    async fn invalidate(&self, hackathon_name: &str) {
        self.ctx.cache.remove(&cache_key(CacheEntryType::Judge, &hackathon_name.to_lowercase())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn judge_crud() -> anyhow::Result<()> {
        let mgmt = JudgeManagement::new(ManagementContext::in_memory());
        let j = mgmt.create_judge("Hack", "u1", Some("expert".into())).await?;
        assert_eq!(j.hackathon_name(), "hack");
        assert!(mgmt.is_judge("hack", "u1").await?);

        let updated = mgmt.update_judge(&j, None).await?;
        assert_eq!(updated.description.as_deref(), Some("expert"));
        let updated = mgmt.update_judge(&j, Some("new".into())).await?;
        assert_eq!(updated.description.as_deref(), Some("new"));

        assert_eq!(mgmt.list_paginated_judges("hack", &Pagination::default()).await?.value.len(), 1);
        mgmt.delete_judge("hack", "u1").await?;
        assert!(!mgmt.is_judge("hack", "u1").await?);
        assert!(mgmt.get_judge("hack", "u1").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn judge_limit_is_enforced() -> anyhow::Result<()> {
        let mgmt = JudgeManagement::new(ManagementContext::in_memory());
        for i in 0..MAX_JUDGES_PER_HACKATHON {
            mgmt.create_judge("hack", &format!("u{i}"), None).await?;
        }
        let err = mgmt.create_judge("hack", "extra", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::PreconditionFailed(_)));
        mgmt.create_judge("hack", "u0", Some("again".into())).await?;
        Ok(())
    }
}
