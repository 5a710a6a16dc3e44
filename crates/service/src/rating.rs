//! Rating kinds and judges' ratings of teams.

use std::time::Duration;

use chrono::Utc;
use common::digest::string_to_guid;
use models::entities::{RatingEntity, RatingKindEntity};
use models::query::{and, filter_for_string, partition_key_filter, ComparisonOperator, Filter};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::pagination::{from_page, paginate_by_created_at, PagedResult, Pagination};

pub const MAX_RATING_KINDS_PER_HACKATHON: usize = 100;
pub const DEFAULT_MAXIMUM_SCORE: i32 = 10;
const RATING_KIND_CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingKindRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub maximum_score: Option<i32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingRequest {
    pub team_id: String,
    pub kind_id: String,
    pub score: Option<i32>,
    pub description: Option<String>,
}

/// Filters for rating listings; absent fields match everything.
#[derive(Debug, Clone, Default)]
pub struct RatingQueryOptions {
    pub pagination: Pagination,
    pub judge_id: Option<String>,
    pub kind_id: Option<String>,
    pub team_id: Option<String>,
}

/// Row key of the rating a judge gives a team for one kind.
pub fn rating_id(judge_id: &str, team_id: &str, kind_id: &str) -> String {
    string_to_guid(&format!("{judge_id}-{team_id}-{kind_id}").to_lowercase()).to_string()
}

#[derive(Clone)]
pub struct RatingManagement {
    ctx: ManagementContext,
}

impl RatingManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    pub async fn can_create_rating_kind(&self, hackathon_name: &str) -> ServiceResult<bool> {
        Ok(self.list_rating_kinds(hackathon_name).await?.len() < MAX_RATING_KINDS_PER_HACKATHON)
    }

    #[instrument(skip(self, request), fields(hackathon = %hackathon_name))]
    pub async fn create_rating_kind(&self, hackathon_name: &str, request: &RatingKindRequest) -> ServiceResult<RatingKindEntity> {
        if !self.can_create_rating_kind(hackathon_name).await? {
            return Err(ServiceError::PreconditionFailed(format!(
                "a hackathon can have at most {MAX_RATING_KINDS_PER_HACKATHON} rating kinds"
            )));
        }
        let entity = RatingKindEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            name: request.name.clone().unwrap_or_default(),
            description: request.description.clone(),
            maximum_score: request.maximum_score.unwrap_or(DEFAULT_MAXIMUM_SCORE),
            ..Default::default()
        };
        let saved = self.ctx.storage.rating_kinds.insert(&entity).await?;
        self.invalidate_kinds(hackathon_name).await;
        info!(kind_id = %saved.id(), "rating_kind_created");
        Ok(saved)
    }

    pub async fn update_rating_kind(&self, existing: &RatingKindEntity, request: &RatingKindRequest) -> ServiceResult<RatingKindEntity> {
        let mut entity = existing.clone();
        if let Some(v) = &request.name {
            entity.name = v.clone();
        }
        if let Some(v) = &request.description {
            entity.description = Some(v.clone());
        }
        if let Some(v) = request.maximum_score {
            entity.maximum_score = v;
        }
        let saved = self.ctx.storage.rating_kinds.merge(&entity).await?;
        self.invalidate_kinds(existing.hackathon_name()).await;
        Ok(saved)
    }

    /// Served from the cached kind list.
    pub async fn get_cached_rating_kind(&self, hackathon_name: &str, kind_id: &str) -> ServiceResult<Option<RatingKindEntity>> {
        let kinds = self.list_rating_kinds(hackathon_name).await?;
        Ok(kinds.into_iter().find(|k| k.id() == kind_id))
    }

    pub async fn get_rating_kind(&self, hackathon_name: &str, kind_id: &str) -> ServiceResult<Option<RatingKindEntity>> {
        if hackathon_name.trim().is_empty() || kind_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.rating_kinds.retrieve(&hackathon_name.to_lowercase(), kind_id).await?)
    }

    /// Kinds of a hackathon, cached for four hours.
    pub async fn list_rating_kinds(&self, hackathon_name: &str) -> ServiceResult<Vec<RatingKindEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::RatingKind, &name),
                RATING_KIND_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move {
                        storage.rating_kinds.query_entities(Some(&partition_key_filter(&name))).await.map_err(ServiceError::from)
                    }
                },
                false,
            )
            .await
    }

    pub async fn list_paginated_rating_kinds(
        &self,
        hackathon_name: &str,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<RatingKindEntity>> {
        let all = self.list_rating_kinds(hackathon_name).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    pub async fn delete_rating_kind(&self, hackathon_name: &str, kind_id: &str) -> ServiceResult<()> {
        self.ctx.storage.rating_kinds.delete(&hackathon_name.to_lowercase(), kind_id).await?;
        self.invalidate_kinds(hackathon_name).await;
        info!(hackathon = %hackathon_name, kind_id = %kind_id, "rating_kind_deleted");
        Ok(())
    }

    /// Insert or merge the rating identified by judge, team and kind.
    #[instrument(skip(self, request), fields(hackathon = %hackathon_name, judge_id = %judge_id, team_id = %request.team_id))]
    pub async fn create_rating(&self, hackathon_name: &str, judge_id: &str, request: &RatingRequest) -> ServiceResult<RatingEntity> {
        let entity = RatingEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: rating_id(judge_id, &request.team_id, &request.kind_id),
            created_at: Utc::now(),
            judge_id: judge_id.to_string(),
            team_id: request.team_id.clone(),
            kind_id: request.kind_id.clone(),
            score: request.score.unwrap_or(0),
            description: request.description.clone(),
            ..Default::default()
        };
        let saved = self.ctx.storage.ratings.insert_or_merge(&entity).await?;
        info!(rating_id = %saved.id(), "rating_created");
        Ok(saved)
    }

    pub async fn update_rating(&self, existing: &RatingEntity, score: Option<i32>, description: Option<String>) -> ServiceResult<RatingEntity> {
        let mut entity = existing.clone();
        if let Some(score) = score {
            entity.score = score;
        }
        if let Some(description) = description {
            entity.description = Some(description);
        }
        Ok(self.ctx.storage.ratings.merge(&entity).await?)
    }

    pub async fn get_rating(&self, hackathon_name: &str, judge_id: &str, team_id: &str, kind_id: &str) -> ServiceResult<Option<RatingEntity>> {
        self.get_rating_by_id(hackathon_name, &rating_id(judge_id, team_id, kind_id)).await
    }

    pub async fn get_rating_by_id(&self, hackathon_name: &str, rating_id: &str) -> ServiceResult<Option<RatingEntity>> {
        if hackathon_name.trim().is_empty() || rating_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.ratings.retrieve(&hackathon_name.to_lowercase(), rating_id).await?)
    }

    pub async fn is_rating_count_greater_than_zero(&self, hackathon_name: &str, options: &RatingQueryOptions) -> ServiceResult<bool> {
        let filter = rating_filter(hackathon_name, options);
        let page = self.ctx.storage.ratings.query_segmented(Some(&filter), None, Some(1)).await?;
        Ok(!page.values.is_empty())
    }

    pub async fn list_paginated_ratings(&self, hackathon_name: &str, options: &RatingQueryOptions) -> ServiceResult<PagedResult<RatingEntity>> {
        let filter = rating_filter(hackathon_name, options);
        let top = options.pagination.top();
        let token = options.pagination.to_continuation_token();
        let page = self.ctx.storage.ratings.query_segmented(Some(&filter), token.as_deref(), Some(top)).await?;
        Ok(from_page(page, top))
    }

    pub async fn delete_rating(&self, hackathon_name: &str, rating_id: &str) -> ServiceResult<()> {
        self.ctx.storage.ratings.delete(&hackathon_name.to_lowercase(), rating_id).await?;
        info!(hackathon = %hackathon_name, rating_id = %rating_id, "rating_deleted");
        Ok(())
    }

    async fn invalidate_kinds(&self, hackathon_name: &str) {
        self.ctx.cache.remove(&cache_key(CacheEntryType::RatingKind, &hackathon_name.to_lowercase())).await;
    }
}

fn rating_filter(hackathon_name: &str, options: &RatingQueryOptions) -> Filter {
    let mut filters = vec![partition_key_filter(&hackathon_name.to_lowercase())];
    let optional = [("JudgeId", &options.judge_id), ("KindId", &options.kind_id), ("TeamId", &options.team_id)];
    for (property, value) in optional {
        if let Some(v) = value.as_deref().filter(|v| !v.trim().is_empty()) {
            filters.push(filter_for_string(property, ComparisonOperator::Equal, v));
        }
    }
    and(filters).unwrap_or_else(|| partition_key_filter(&hackathon_name.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_id_ignores_case() {
        assert_eq!(rating_id("J", "T", "K"), rating_id("j", "t", "k"));
        assert_ne!(rating_id("j", "t", "k"), rating_id("j", "t", "k2"));
    }

    #[tokio::test]
    async fn rating_kind_crud() -> anyhow::Result<()> {
        let mgmt = RatingManagement::new(ManagementContext::in_memory());
        let kind = mgmt.create_rating_kind("hack", &RatingKindRequest { name: Some("design".into()), ..Default::default() }).await?;
        assert_eq!(kind.maximum_score, DEFAULT_MAXIMUM_SCORE);
        assert!(mgmt.get_cached_rating_kind("hack", kind.id()).await?.is_some());

        let req = RatingKindRequest { maximum_score: Some(5), ..Default::default() };
        let kind = mgmt.update_rating_kind(&kind, &req).await?;
        assert_eq!(kind.name, "design");
        assert_eq!(kind.maximum_score, 5);
        assert_eq!(mgmt.list_paginated_rating_kinds("hack", &Pagination::default()).await?.value.len(), 1);

        mgmt.delete_rating_kind("hack", kind.id()).await?;
        assert!(mgmt.get_rating_kind("hack", kind.id()).await?.is_none());
        assert!(mgmt.get_cached_rating_kind("hack", kind.id()).await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn ratings_merge_on_same_key() -> anyhow::Result<()> {
        let mgmt = RatingManagement::new(ManagementContext::in_memory());
        let req = RatingRequest { team_id: "t1".into(), kind_id: "k1".into(), score: Some(7), description: None };
        let first = mgmt.create_rating("hack", "judge", &req).await?;
        let again = mgmt.create_rating("hack", "judge", &RatingRequest { score: Some(9), ..req.clone() }).await?;
        assert_eq!(first.id(), again.id());
        assert_eq!(mgmt.get_rating("hack", "judge", "t1", "k1").await?.unwrap().score, 9);

        mgmt.create_rating("hack", "other", &RatingRequest { team_id: "t2".into(), ..req }).await?;
        let by_judge = RatingQueryOptions { judge_id: Some("judge".into()), ..Default::default() };
        assert_eq!(mgmt.list_paginated_ratings("hack", &by_judge).await?.value.len(), 1);
        assert_eq!(mgmt.list_paginated_ratings("hack", &RatingQueryOptions::default()).await?.value.len(), 2);
        let none = RatingQueryOptions { team_id: Some("t9".into()), ..Default::default() };
        assert!(!mgmt.is_rating_count_greater_than_zero("hack", &none).await?);

        let updated = mgmt.update_rating(&first, None, Some("nice".into())).await?;
        assert_eq!(updated.description.as_deref(), Some("nice"));
        mgmt.delete_rating("hack", first.id()).await?;
        assert!(mgmt.get_rating_by_id("hack", first.id()).await?.is_none());
        Ok(())
    }
}
