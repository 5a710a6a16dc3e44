//! Awards and their assignment to teams or individuals.

use std::time::Duration;

use chrono::Utc;
use common::digest::string_to_guid;
use models::entities::{AwardAssignmentEntity, AwardEntity, AwardTarget, PictureInfo};
use models::query::{and, filter_for_string, partition_key_filter, ComparisonOperator};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::pagination::{from_page, paginate_by_created_at, PagedResult, Pagination};

pub const MAX_AWARDS_PER_HACKATHON: usize = 100;
const AWARD_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i32>,
    pub target: Option<AwardTarget>,
    pub pictures: Option<Vec<PictureInfo>>,
}

/// Which assignments to list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignmentScope {
    Hackathon,
    Award(String),
    Assignee(String),
}

/// Row key of the assignment of `award_id` to `assignee_id`.
pub fn assignment_id(hackathon_name: &str, award_id: &str, assignee_id: &str) -> String {
    string_to_guid(&format!("{hackathon_name}-{award_id}-{assignee_id}").to_lowercase()).to_string()
}

#[derive(Clone)]
pub struct AwardManagement {
    ctx: ManagementContext,
}

impl AwardManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    pub async fn can_create_award(&self, hackathon_name: &str) -> ServiceResult<bool> {
        Ok(self.list_awards(hackathon_name).await?.len() < MAX_AWARDS_PER_HACKATHON)
    }

    #[instrument(skip(self, request), fields(hackathon = %hackathon_name))]
    pub async fn create_award(&self, hackathon_name: &str, request: &AwardRequest) -> ServiceResult<AwardEntity> {
        if !self.can_create_award(hackathon_name).await? {
            return Err(ServiceError::PreconditionFailed(format!(
                "a hackathon can have at most {MAX_AWARDS_PER_HACKATHON} awards"
            )));
        }
        let entity = AwardEntity {
            partition_key: hackathon_name.to_lowercase(),
            row_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            name: request.name.clone().unwrap_or_default(),
            description: request.description.clone(),
            quantity: request.quantity.unwrap_or(1),
            target: request.target.unwrap_or_default(),
            pictures: request.pictures.clone(),
            ..Default::default()
        };
        let saved = self.ctx.storage.awards.insert(&entity).await?;
        self.invalidate(hackathon_name).await;
        info!(award_id = %saved.id(), "award_created");
        Ok(saved)
    }

    pub async fn update_award(&self, existing: &AwardEntity, request: &AwardRequest) -> ServiceResult<AwardEntity> {
        let mut entity = existing.clone();
        if let Some(v) = &request.name {
            entity.name = v.clone();
        }
        if let Some(v) = &request.description {
            entity.description = Some(v.clone());
        }
        if let Some(v) = request.quantity {
            entity.quantity = v;
        }
        if let Some(v) = request.target {
            entity.target = v;
        }
        if let Some(v) = &request.pictures {
            entity.pictures = Some(v.clone());
        }
        let saved = self.ctx.storage.awards.merge(&entity).await?;
        self.invalidate(existing.hackathon_name()).await;
        Ok(saved)
    }

    pub async fn get_award(&self, hackathon_name: &str, award_id: &str) -> ServiceResult<Option<AwardEntity>> {
        if hackathon_name.trim().is_empty() || award_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.awards.retrieve(&hackathon_name.to_lowercase(), award_id).await?)
    }

    /// Awards of a hackathon, cached for an hour.
    pub async fn list_awards(&self, hackathon_name: &str) -> ServiceResult<Vec<AwardEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::Award, &name),
                AWARD_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move { storage.awards.query_entities(Some(&partition_key_filter(&name))).await.map_err(ServiceError::from) }
                },
                false,
            )
            .await
    }

    pub async fn list_paginated_awards(&self, hackathon_name: &str, pagination: &Pagination) -> ServiceResult<PagedResult<AwardEntity>> {
        let all = self.list_awards(hackathon_name).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    pub async fn delete_award(&self, award: &AwardEntity) -> ServiceResult<()> {
        self.ctx.storage.awards.delete(award.hackathon_name(), award.id()).await?;
        self.invalidate(award.hackathon_name()).await;
        info!(hackathon = %award.hackathon_name(), award_id = %award.id(), "award_deleted");
        Ok(())
    }

    /// Insert or merge; a new assignment must fit in the award's quantity.
    #[instrument(skip(self, award, description), fields(hackathon = %award.hackathon_name(), award_id = %award.id(), assignee_id = %assignee_id))]
    pub async fn create_or_update_assignment(
        &self,
        award: &AwardEntity,
        assignee_id: &str,
        description: Option<String>,
    ) -> ServiceResult<AwardAssignmentEntity> {
        let id = assignment_id(award.hackathon_name(), award.id(), assignee_id);
        let existing = self.ctx.storage.award_assignments.retrieve(award.hackathon_name(), &id).await?;
        if existing.is_none() {
            let assigned = self.count_assignments_by_award(award.hackathon_name(), award.id()).await?;
            if assigned >= award.quantity.max(0) as usize {
                return Err(ServiceError::PreconditionFailed(format!(
                    "award {} can be assigned at most {} times",
                    award.name, award.quantity
                )));
            }
        }
        let entity = AwardAssignmentEntity {
            partition_key: award.hackathon_name().to_string(),
            row_key: id,
            created_at: existing.as_ref().map(|e| e.created_at).unwrap_or_else(Utc::now),
            award_id: award.id().to_string(),
            assignee_id: assignee_id.to_string(),
            description: description.or_else(|| existing.and_then(|e| e.description)),
            ..Default::default()
        };
        let saved = self.ctx.storage.award_assignments.insert_or_merge(&entity).await?;
        info!(assignment_id = %saved.id(), "award_assigned");
        Ok(saved)
    }

    pub async fn update_assignment(&self, existing: &AwardAssignmentEntity, description: Option<String>) -> ServiceResult<AwardAssignmentEntity> {
        let Some(description) = description else {
            return Ok(existing.clone());
        };
        let mut entity = existing.clone();
        entity.description = Some(description);
        Ok(self.ctx.storage.award_assignments.merge(&entity).await?)
    }

    pub async fn get_assignment(&self, hackathon_name: &str, assignment_id: &str) -> ServiceResult<Option<AwardAssignmentEntity>> {
        if hackathon_name.trim().is_empty() || assignment_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.award_assignments.retrieve(&hackathon_name.to_lowercase(), assignment_id).await?)
    }

    pub async fn count_assignments_by_hackathon(&self, hackathon_name: &str) -> ServiceResult<usize> {
        let filter = partition_key_filter(&hackathon_name.to_lowercase());
        Ok(self.ctx.storage.award_assignments.query_entities(Some(&filter)).await?.len())
    }

    pub async fn count_assignments_by_award(&self, hackathon_name: &str, award_id: &str) -> ServiceResult<usize> {
        let filter = assignment_filter(hackathon_name, &AssignmentScope::Award(award_id.to_string()));
        Ok(self.ctx.storage.award_assignments.query_entities(filter.as_ref()).await?.len())
    }

    pub async fn list_paginated_assignments(
        &self,
        hackathon_name: &str,
        scope: &AssignmentScope,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<AwardAssignmentEntity>> {
        let filter = assignment_filter(hackathon_name, scope);
        let top = pagination.top();
        let token = pagination.to_continuation_token();
        let page = self.ctx.storage.award_assignments.query_segmented(filter.as_ref(), token.as_deref(), Some(top)).await?;
        Ok(from_page(page, top))
    }

    pub async fn list_assignments_by_team(&self, hackathon_name: &str, team_id: &str) -> ServiceResult<Vec<AwardAssignmentEntity>> {
        let filter = assignment_filter(hackathon_name, &AssignmentScope::Assignee(team_id.to_string()));
        Ok(self.ctx.storage.award_assignments.query_entities(filter.as_ref()).await?)
    }

    pub async fn delete_assignment(&self, hackathon_name: &str, assignment_id: &str) -> ServiceResult<()> {
        self.ctx.storage.award_assignments.delete(&hackathon_name.to_lowercase(), assignment_id).await?;
        info!(hackathon = %hackathon_name, assignment_id = %assignment_id, "award_assignment_deleted");
        Ok(())
    }

    async fn invalidate(&self, hackathon_name: &str) {
        self.ctx.cache.remove(&cache_key(CacheEntryType::Award, &hackathon_name.to_lowercase())).await;
    }
}

fn assignment_filter(hackathon_name: &str, scope: &AssignmentScope) -> Option<models::query::Filter> {
    let mut filters = vec![partition_key_filter(&hackathon_name.to_lowercase())];
    match scope {
        AssignmentScope::Hackathon => {}
        AssignmentScope::Award(id) => filters.push(filter_for_string("AwardId", ComparisonOperator::Equal, id)),
        AssignmentScope::Assignee(id) => filters.push(filter_for_string("AssigneeId", ComparisonOperator::Equal, id)),
    }
    and(filters)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn award(mgmt: &AwardManagement, quantity: i32) -> anyhow::Result<AwardEntity> {
        let req = AwardRequest { name: Some("first".into()), quantity: Some(quantity), ..Default::default() };
        Ok(mgmt.create_award("hack", &req).await?)
    }

    #[tokio::test]
    async fn award_crud() -> anyhow::Result<()> {
        let mgmt = AwardManagement::new(ManagementContext::in_memory());
        let a = award(&mgmt, 2).await?;
        assert_eq!(a.target, AwardTarget::Team);
        let a = mgmt.update_award(&a, &AwardRequest { target: Some(AwardTarget::Individual), ..Default::default() }).await?;
        assert_eq!(a.name, "first");
        assert_eq!(a.target, AwardTarget::Individual);
        assert_eq!(mgmt.list_paginated_awards("hack", &Pagination::default()).await?.value.len(), 1);
        mgmt.delete_award(&a).await?;
        assert!(mgmt.get_award("hack", a.id()).await?.is_none());
        assert!(mgmt.list_awards("hack").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn assignments_respect_quantity() -> anyhow::Result<()> {
        let mgmt = AwardManagement::new(ManagementContext::in_memory());
        let a = award(&mgmt, 1).await?;
        let first = mgmt.create_or_update_assignment(&a, "team1", Some("winner".into())).await?;
        assert_eq!(first.id(), assignment_id("HACK", a.id(), "TEAM1"));

        let again = mgmt.create_or_update_assignment(&a, "team1", None).await?;
        assert_eq!(again.description.as_deref(), Some("winner"));

        let err = mgmt.create_or_update_assignment(&a, "team2", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::PreconditionFailed(_)));

        assert_eq!(mgmt.count_assignments_by_hackathon("hack").await?, 1);
        assert_eq!(mgmt.count_assignments_by_award("hack", a.id()).await?, 1);
        assert_eq!(mgmt.list_assignments_by_team("hack", "team1").await?.len(), 1);
        let page = mgmt.list_paginated_assignments("hack", &AssignmentScope::Award(a.id().into()), &Pagination::default()).await?;
        assert_eq!(page.value.len(), 1);

        let updated = mgmt.update_assignment(&first, Some("gold".into())).await?;
        assert_eq!(updated.description.as_deref(), Some("gold"));
        mgmt.delete_assignment("hack", first.id()).await?;
        assert!(mgmt.get_assignment("hack", first.id()).await?.is_none());
        Ok(())
    }
}
