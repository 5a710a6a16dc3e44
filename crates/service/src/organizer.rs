//! Organizers shown on a hackathon page.

use std::time::Duration;

use chrono::Utc;
use models::entities::{OrganizerEntity, OrganizerType, PictureInfo};
use models::query::partition_key_filter;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::pagination::{paginate_by_created_at, PagedResult, Pagination};

const ORGANIZER_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrganizerRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub organizer_type: Option<OrganizerType>,
    pub logo: Option<PictureInfo>,
}

#[derive(Clone)]
pub struct OrganizerManagement {
    ctx: ManagementContext,
}

impl OrganizerManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    #[instrument(skip(self, request), fields(hackathon = %hackathon_name))]
    pub async fn create_organizer(&self, hackathon_name: &str, request: &OrganizerRequest) -> ServiceResult<OrganizerEntity> {
        let entity = OrganizerEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            name: request.name.clone().unwrap_or_default(),
            description: request.description.clone(),
            organizer_type: request.organizer_type.unwrap_or(OrganizerType::Host),
            logo: request.logo.clone(),
            ..Default::default()
        };
        let saved = self.ctx.storage.organizers.insert(&entity).await?;
        self.invalidate(hackathon_name).await;
        info!(organizer_id = %saved.id(), "organizer_created");
        Ok(saved)
    }

    /// Field-wise merge; logo fields are merged individually.
    pub async fn update_organizer(&self, existing: &OrganizerEntity, request: &OrganizerRequest) -> ServiceResult<OrganizerEntity> {
        let mut entity = existing.clone();
        if let Some(v) = &request.name {
            entity.name = v.clone();
        }
        if let Some(v) = &request.description {
            entity.description = Some(v.clone());
        }
        if let Some(v) = request.organizer_type {
            entity.organizer_type = v;
        }
        if let Some(logo) = &request.logo {
            entity.logo = Some(match entity.logo.take() {
                Some(old) => PictureInfo {
                    name: if logo.name.is_empty() { old.name } else { logo.name.clone() },
                    description: logo.description.clone().or(old.description),
                    uri: if logo.uri.is_empty() { old.uri } else { logo.uri.clone() },
                },
                None => logo.clone(),
            });
        }
        let saved = self.ctx.storage.organizers.merge(&entity).await?;
        self.invalidate(existing.hackathon_name()).await;
        Ok(saved)
    }

    pub async fn get_organizer(&self, hackathon_name: &str, organizer_id: &str) -> ServiceResult<Option<OrganizerEntity>> {
        if hackathon_name.trim().is_empty() || organizer_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.organizers.retrieve(&hackathon_name.to_lowercase(), organizer_id).await?)
    }

    /// Organizers of a hackathon, cached for six hours.
    pub async fn list_organizers(&self, hackathon_name: &str) -> ServiceResult<Vec<OrganizerEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::Organizer, &name),
                ORGANIZER_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move { storage.organizers.query_entities(Some(&partition_key_filter(&name))).await.map_err(ServiceError::from) }
                },
                false,
            )
            .await
    }

    pub async fn list_paginated_organizers(&self, hackathon_name: &str, pagination: &Pagination) -> ServiceResult<PagedResult<OrganizerEntity>> {
        let all = self.list_organizers(hackathon_name).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    pub async fn delete_organizer(&self, hackathon_name: &str, organizer_id: &str) -> ServiceResult<()> {
        self.ctx.storage.organizers.delete(&hackathon_name.to_lowercase(), organizer_id).await?;
        self.invalidate(hackathon_name).await;
        info!(hackathon = %hackathon_name, organizer_id = %organizer_id, "organizer_deleted");
        Ok(())
    }

    async fn invalidate(&self, hackathon_name: &str) {
        self.ctx.cache.remove(&cache_key(CacheEntryType::Organizer, &hackathon_name.to_lowercase())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn organizer_crud() -> anyhow::Result<()> {
        let mgmt = OrganizerManagement::new(ManagementContext::in_memory());
        let logo = PictureInfo { name: "logo".into(), description: Some("old".into()), uri: "https://a/logo.png".into() };
        let req = OrganizerRequest { name: Some("ks".into()), logo: Some(logo), ..Default::default() };
        let org = mgmt.create_organizer("hack", &req).await?;
        assert_eq!(org.organizer_type, OrganizerType::Host);

        let patch = OrganizerRequest {
            organizer_type: Some(OrganizerType::Sponsor),
            logo: Some(PictureInfo { uri: "https://b/logo.png".into(), ..Default::default() }),
            ..Default::default()
        };
        let org = mgmt.update_organizer(&org, &patch).await?;
        let logo = org.logo.clone().unwrap();
        assert_eq!(logo.name, "logo");
        assert_eq!(logo.description.as_deref(), Some("old"));
        assert_eq!(logo.uri, "https://b/logo.png");
        assert_eq!(org.organizer_type, OrganizerType::Sponsor);

        assert_eq!(mgmt.list_paginated_organizers("hack", &Pagination::default()).await?.value.len(), 1);
        mgmt.delete_organizer("hack", org.id()).await?;
        assert!(mgmt.get_organizer("hack", org.id()).await?.is_none());
        assert!(mgmt.list_organizers("hack").await?.is_empty());
        Ok(())
    }
}
