//! Hackathon admins and platform admins.
//!
//! A platform admin is an admin row with an empty hackathon name and may
//! manage every hackathon.

use std::time::Duration;

use models::entities::HackathonAdminEntity;
use models::query::partition_key_filter;
use tracing::{info, instrument};

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::pagination::{paginate_by_created_at, PagedResult, Pagination};

const ADMIN_CACHE_TTL: Duration = Duration::from_secs(60 * 60);
const PLATFORM: &str = "";

#[derive(Clone)]
pub struct HackathonAdminManagement {
    ctx: ManagementContext,
}

impl HackathonAdminManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    #[instrument(skip(self), fields(hackathon = %hackathon_name, user_id = %user_id))]
    pub async fn create_admin(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<HackathonAdminEntity> {
        let entity = HackathonAdminEntity::new(&hackathon_name.to_lowercase(), user_id);
        let saved = self.ctx.storage.hackathon_admins.insert_or_merge(&entity).await?;
        self.invalidate(hackathon_name).await;
        info!("hackathon_admin_created");
        Ok(saved)
    }

    /// Admins of one hackathon, cached for an hour.
    pub async fn list_hackathon_admin(&self, hackathon_name: &str) -> ServiceResult<Vec<HackathonAdminEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::HackathonAdmin, &name),
                ADMIN_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move {
                        storage
                            .hackathon_admins
                            .query_entities(Some(&partition_key_filter(&name)))
                            .await
                            .map_err(ServiceError::from)
                    }
                },
                false,
            )
            .await
    }

    pub async fn list_paginated_hackathon_admin(
        &self,
        hackathon_name: &str,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<HackathonAdminEntity>> {
        let all = self.list_hackathon_admin(hackathon_name).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    pub async fn get_admin(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<Option<HackathonAdminEntity>> {
        if hackathon_name.trim().is_empty() || user_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.hackathon_admins.retrieve(&hackathon_name.to_lowercase(), user_id).await?)
    }

    #[instrument(skip(self), fields(hackathon = %hackathon_name, user_id = %user_id))]
    pub async fn delete_admin(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<()> {
        if hackathon_name.trim().is_empty() || user_id.trim().is_empty() {
            return Ok(());
        }
        self.ctx.storage.hackathon_admins.delete(&hackathon_name.to_lowercase(), user_id).await?;
        self.invalidate(hackathon_name).await;
        info!("hackathon_admin_deleted");
        Ok(())
    }

    /// Platform admins and listed admins of the hackathon.
    pub async fn is_hackathon_admin(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<bool> {
        if user_id.trim().is_empty() {
            return Ok(false);
        }
        if self.is_platform_admin(user_id).await? {
            return Ok(true);
        }
        let admins = self.list_hackathon_admin(hackathon_name).await?;
        Ok(admins.iter().any(|a| a.user_id() == user_id))
    }

    pub async fn is_platform_admin(&self, user_id: &str) -> ServiceResult<bool> {
        if user_id.trim().is_empty() {
            return Ok(false);
        }
        let admins = self.list_hackathon_admin(PLATFORM).await?;
        Ok(admins.iter().any(|a| a.user_id() == user_id))
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_platform_admin(&self, user_id: &str) -> ServiceResult<HackathonAdminEntity> {
        let entity = HackathonAdminEntity::new(PLATFORM, user_id);
        let saved = self.ctx.storage.hackathon_admins.insert_or_merge(&entity).await?;
        self.invalidate(PLATFORM).await;
        info!("platform_admin_created");
        Ok(saved)
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn delete_platform_admin(&self, user_id: &str) -> ServiceResult<()> {
        self.ctx.storage.hackathon_admins.delete(PLATFORM, user_id).await?;
        self.invalidate(PLATFORM).await;
        info!("platform_admin_deleted");
        Ok(())
    }

    pub async fn list_paginated_platform_admins(&self, pagination: &Pagination) -> ServiceResult<PagedResult<HackathonAdminEntity>> {
        self.list_paginated_hackathon_admin(PLATFORM, pagination).await
    }

    async fn invalidate(&self, hackathon_name: &str) {
        let key = cache_key(CacheEntryType::HackathonAdmin, &hackathon_name.to_lowercase());
        self.ctx.cache.remove(&key).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admin_lifecycle() -> anyhow::Result<()> {
        let mgmt = HackathonAdminManagement::new(ManagementContext::in_memory());
        assert!(!mgmt.is_hackathon_admin("Hack", "u1").await?);

        mgmt.create_admin("Hack", "u1").await?;
        assert!(mgmt.is_hackathon_admin("hack", "u1").await?);
        assert_eq!(mgmt.list_hackathon_admin("hack").await?.len(), 1);
        assert!(mgmt.get_admin("hack", "u1").await?.is_some());
        assert!(mgmt.get_admin("", "u1").await?.is_none());

        mgmt.delete_admin("hack", "u1").await?;
        assert!(!mgmt.is_hackathon_admin("hack", "u1").await?);
        mgmt.delete_admin("", "u1").await?;
        Ok(())
    }

    #[tokio::test]
    async fn platform_admin_manages_everything() -> anyhow::Result<()> {
        let mgmt = HackathonAdminManagement::new(ManagementContext::in_memory());
        mgmt.create_platform_admin("root").await?;
        assert!(mgmt.is_platform_admin("root").await?);
        assert!(mgmt.is_hackathon_admin("any", "root").await?);
        assert!(!mgmt.is_platform_admin("").await?);

        let page = mgmt.list_paginated_platform_admins(&Pagination::default()).await?;
        assert_eq!(page.value.len(), 1);
        assert!(page.value[0].is_platform_admin());

        mgmt.delete_platform_admin("root").await?;
        assert!(!mgmt.is_platform_admin("root").await?);
        Ok(())
    }
}
