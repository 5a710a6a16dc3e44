//! Hackathon announcements.

use std::time::Duration;

use chrono::Utc;
use models::entities::AnnouncementEntity;
use models::query::partition_key_filter;
use serde::{Deserialize, Serialize};
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::pagination::{paginate_by_created_at, PagedResult, Pagination};

const ANNOUNCEMENT_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnnouncementRequest {
    pub title: Option<String>,
    pub content: Option<String>,
}

#[derive(Clone)]
pub struct AnnouncementManagement {
    ctx: ManagementContext,
}

impl AnnouncementManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    pub async fn create_announcement(&self, hackathon_name: &str, request: &AnnouncementRequest) -> ServiceResult<AnnouncementEntity> {
        let entity = AnnouncementEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            title: request.title.clone().unwrap_or_default(),
            content: request.content.clone().unwrap_or_default(),
            ..Default::default()
        };
        let saved = self.ctx.storage.announcements.insert(&entity).await?;
        self.invalidate(hackathon_name).await;
        info!(hackathon = %hackathon_name, announcement_id = %saved.id(), "announcement_created");
        Ok(saved)
    }

    pub async fn update_announcement(&self, existing: &AnnouncementEntity, request: &AnnouncementRequest) -> ServiceResult<AnnouncementEntity> {
        let mut entity = existing.clone();
        if let Some(v) = &request.title {
            entity.title = v.clone();
        }
        if let Some(v) = &request.content {
            entity.content = v.clone();
        }
        let saved = self.ctx.storage.announcements.merge(&entity).await?;
        self.invalidate(existing.hackathon_name()).await;
        Ok(saved)
    }

    pub async fn get_announcement(&self, hackathon_name: &str, announcement_id: &str) -> ServiceResult<Option<AnnouncementEntity>> {
        if hackathon_name.trim().is_empty() || announcement_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.announcements.retrieve(&hackathon_name.to_lowercase(), announcement_id).await?)
    }

    pub async fn list_paginated_announcements(
        &self,
        hackathon_name: &str,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<AnnouncementEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        let all = self
            .ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::Announcement, &name),
                ANNOUNCEMENT_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move {
                        storage.announcements.query_entities(Some(&partition_key_filter(&name))).await.map_err(ServiceError::from)
                    }
                },
                false,
            )
            .await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    pub async fn delete_announcement(&self, hackathon_name: &str, announcement_id: &str) -> ServiceResult<()> {
        self.ctx.storage.announcements.delete(&hackathon_name.to_lowercase(), announcement_id).await?;
        self.invalidate(hackathon_name).await;
        Ok(())
    }

    async fn invalidate(&self, hackathon_name: &str) {
        self.ctx.cache.remove(&cache_key(CacheEntryType::Announcement, &hackathon_name.to_lowercase())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn announcement_crud() -> anyhow::Result<()> {
        let mgmt = AnnouncementManagement::new(ManagementContext::in_memory());
        let req = AnnouncementRequest { title: Some("Welcome".into()), content: Some("hello".into()) };
        let a = mgmt.create_announcement("Hack", &req).await?;
        let a = mgmt.update_announcement(&a, &AnnouncementRequest { content: Some("hi".into()), ..Default::default() }).await?;
        assert_eq!(a.title, "Welcome");
        assert_eq!(a.content, "hi");
        assert_eq!(mgmt.list_paginated_announcements("hack", &Pagination::default()).await?.value.len(), 1);
        mgmt.delete_announcement("hack", a.id()).await?;
        assert!(mgmt.get_announcement("hack", a.id()).await?.is_none());
        assert!(mgmt.list_paginated_announcements("hack", &Pagination::default()).await?.value.is_empty());
        Ok(())
    }
}
