//! Teams, their members and submitted works.

use std::time::Duration;

use chrono::Utc;
use models::entities::{TeamEntity, TeamMemberEntity, TeamMemberRole, TeamMemberStatus, TeamWorkEntity, TeamWorkType};
use models::query::{and, filter_for_string, partition_key_filter, ComparisonOperator};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::pagination::{from_page, paginate_by_created_at, PagedResult, Pagination};

pub const MAX_WORKS_PER_TEAM: usize = 100;
const TEAM_CACHE_TTL: Duration = Duration::from_secs(12 * 60 * 60);
const TEAM_LIST_CACHE_TTL: Duration = Duration::from_secs(6 * 60 * 60);
const TEAM_MEMBER_CACHE_TTL: Duration = Duration::from_secs(60);
const TEAM_WORK_CACHE_TTL: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamRequest {
    pub display_name: Option<String>,
    pub description: Option<String>,
    pub auto_approve: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamWorkRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub work_type: Option<TeamWorkType>,
    pub url: Option<String>,
}

/// Filters for [`TeamManagement::list_paginated_team_members`].
#[derive(Debug, Clone, Default)]
pub struct TeamMemberQueryOptions {
    pub pagination: Pagination,
    pub status: Option<TeamMemberStatus>,
    pub role: Option<TeamMemberRole>,
}

#[derive(Clone)]
pub struct TeamManagement {
    ctx: ManagementContext,
}

impl TeamManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    /// New team with the creator as its approved admin.
    #[instrument(skip(self, request), fields(hackathon = %hackathon_name, creator_id = %creator_id))]
    pub async fn create_team(&self, hackathon_name: &str, request: &TeamRequest, creator_id: &str) -> ServiceResult<TeamEntity> {
        let hackathon_name = hackathon_name.to_lowercase();
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let team = TeamEntity {
            partition_key: hackathon_name.clone(),
            row_key: id.clone(),
            created_at: now,
            display_name: request.display_name.clone().filter(|d| !d.trim().is_empty()).unwrap_or_else(|| id.clone()),
            description: request.description.clone(),
            auto_approve: request.auto_approve.unwrap_or(false),
            creator_id: creator_id.to_string(),
            members_count: 1,
            ..Default::default()
        };
        let saved = self.ctx.storage.teams.insert(&team).await?;
        let creator = TeamMemberEntity {
            partition_key: hackathon_name.clone(),
            row_key: creator_id.to_string(),
            created_at: now,
            team_id: id.clone(),
            description: Some("Creator".to_string()),
            role: TeamMemberRole::Admin,
            status: TeamMemberStatus::Approved,
            ..Default::default()
        };
        self.ctx.storage.team_members.insert_or_replace(&creator).await?;
        self.invalidate_team(&hackathon_name, &id).await;
        self.invalidate_members(&hackathon_name, &id).await;
        info!(team_id = %id, "team_created");
        Ok(saved)
    }

    pub async fn update_team(&self, team: &TeamEntity, request: &TeamRequest) -> ServiceResult<TeamEntity> {
        let mut entity = team.clone();
        if let Some(v) = request.auto_approve {
            entity.auto_approve = v;
        }
        if let Some(v) = &request.description {
            entity.description = Some(v.clone());
        }
        if let Some(v) = &request.display_name {
            entity.display_name = v.clone();
        }
        let saved = self.ctx.storage.teams.merge(&entity).await?;
        self.invalidate_team(team.hackathon_name(), team.id()).await;
        Ok(saved)
    }

    /// Recount members of a team. Missing teams are ignored.
    pub async fn update_team_members_count(&self, hackathon_name: &str, team_id: &str) -> ServiceResult<()> {
        let hackathon_name = hackathon_name.to_lowercase();
        let Some(mut team) = self.ctx.storage.teams.retrieve(&hackathon_name, team_id).await? else {
            return Ok(());
        };
        let filter = team_filter(&hackathon_name, team_id);
        let count = self.ctx.storage.team_members.query_entities(Some(&filter)).await?.len();
        team.members_count = count as i32;
        self.ctx.storage.teams.merge(&team).await?;
        self.invalidate_team(&hackathon_name, team_id).await;
        Ok(())
    }

    /// Cached for twelve hours.
    pub async fn get_team_by_id(&self, hackathon_name: &str, team_id: &str) -> ServiceResult<Option<TeamEntity>> {
        if hackathon_name.trim().is_empty() || team_id.trim().is_empty() {
            return Ok(None);
        }
        let storage = self.ctx.storage.clone();
        let name = hackathon_name.to_lowercase();
        let key = team_key(&name, team_id);
        let id = team_id.to_string();
        let team = self
            .ctx
            .cache
            .get_or_add_opt(&key, TEAM_CACHE_TTL, || async move {
                storage.teams.retrieve(&name, &id).await.map_err(ServiceError::from)
            })
            .await?;
        Ok(team.filter(|t| t.hackathon_name().eq_ignore_ascii_case(hackathon_name)))
    }

    pub async fn get_team_by_name(&self, hackathon_name: &str, team_name: &str) -> ServiceResult<Vec<TeamEntity>> {
        let filter = and([
            partition_key_filter(&hackathon_name.to_lowercase()),
            filter_for_string("DisplayName", ComparisonOperator::Equal, team_name),
        ]);
        Ok(self.ctx.storage.teams.query_entities(filter.as_ref()).await?)
    }

    /// Teams of a hackathon, cached for six hours.
    pub async fn list_teams(&self, hackathon_name: &str) -> ServiceResult<Vec<TeamEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::Team, &name),
                TEAM_LIST_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move { storage.teams.query_entities(Some(&partition_key_filter(&name))).await.map_err(ServiceError::from) }
                },
                false,
            )
            .await
    }

    pub async fn list_paginated_teams(&self, hackathon_name: &str, pagination: &Pagination) -> ServiceResult<PagedResult<TeamEntity>> {
        let all = self.list_teams(hackathon_name).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    #[instrument(skip(self, team), fields(hackathon = %team.hackathon_name(), team_id = %team.id()))]
    pub async fn delete_team(&self, team: &TeamEntity) -> ServiceResult<()> {
        self.ctx.storage.teams.delete(team.hackathon_name(), team.id()).await?;
        self.invalidate_team(team.hackathon_name(), team.id()).await;
        info!("team_deleted");
        Ok(())
    }

    #[instrument(skip(self, team, description), fields(hackathon = %team.hackathon_name(), team_id = %team.id(), user_id = %user_id))]
    pub async fn create_team_member(
        &self,
        team: &TeamEntity,
        user_id: &str,
        description: Option<String>,
        role: Option<TeamMemberRole>,
        status: TeamMemberStatus,
    ) -> ServiceResult<TeamMemberEntity> {
        let member = TeamMemberEntity {
            partition_key: team.hackathon_name().to_string(),
            row_key: user_id.to_string(),
            created_at: Utc::now(),
            team_id: team.id().to_string(),
            description,
            role: role.unwrap_or_default(),
            status,
            ..Default::default()
        };
        let saved = self.ctx.storage.team_members.insert_or_merge(&member).await?;
        self.update_team_members_count(team.hackathon_name(), team.id()).await?;
        self.invalidate_members(team.hackathon_name(), team.id()).await;
        info!(status = %status, "team_member_created");
        Ok(saved)
    }

    pub async fn update_team_member(&self, member: &TeamMemberEntity, description: Option<String>) -> ServiceResult<TeamMemberEntity> {
        let Some(description) = description else {
            return Ok(member.clone());
        };
        let mut entity = member.clone();
        entity.description = Some(description);
        let saved = self.ctx.storage.team_members.merge(&entity).await?;
        self.invalidate_members(member.hackathon_name(), &member.team_id).await;
        Ok(saved)
    }

    pub async fn update_team_member_status(&self, member: &TeamMemberEntity, status: TeamMemberStatus) -> ServiceResult<TeamMemberEntity> {
        if member.status == status {
            return Ok(member.clone());
        }
        let mut entity = member.clone();
        entity.status = status;
        let saved = self.ctx.storage.team_members.merge(&entity).await?;
        self.invalidate_members(member.hackathon_name(), &member.team_id).await;
        info!(hackathon = %member.hackathon_name(), user_id = %member.user_id(), status = %status, "team_member_status_updated");
        Ok(saved)
    }

    pub async fn update_team_member_role(&self, member: &TeamMemberEntity, role: TeamMemberRole) -> ServiceResult<TeamMemberEntity> {
        if member.role == role {
            return Ok(member.clone());
        }
        let mut entity = member.clone();
        entity.role = role;
        let saved = self.ctx.storage.team_members.merge(&entity).await?;
        self.invalidate_members(member.hackathon_name(), &member.team_id).await;
        info!(hackathon = %member.hackathon_name(), user_id = %member.user_id(), role = %role, "team_member_role_updated");
        Ok(saved)
    }

    #[instrument(skip(self, member), fields(hackathon = %member.hackathon_name(), user_id = %member.user_id()))]
    pub async fn delete_team_member(&self, member: &TeamMemberEntity) -> ServiceResult<()> {
        self.ctx.storage.team_members.delete(member.hackathon_name(), member.user_id()).await?;
        self.update_team_members_count(member.hackathon_name(), &member.team_id).await?;
        self.invalidate_members(member.hackathon_name(), &member.team_id).await;
        info!("team_member_deleted");
        Ok(())
    }

    pub async fn get_team_member(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<Option<TeamMemberEntity>> {
        if hackathon_name.trim().is_empty() || user_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.team_members.retrieve(&hackathon_name.to_lowercase(), user_id).await?)
    }

    /// Members of one team, cached for a minute.
    pub async fn list_team_members(&self, hackathon_name: &str, team_id: &str) -> ServiceResult<Vec<TeamMemberEntity>> {
        let name = hackathon_name.to_lowercase();
        let team_id = team_id.to_string();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &members_key(&name, &team_id),
                TEAM_MEMBER_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let filter = team_filter(&name, &team_id);
                    async move { storage.team_members.query_entities(Some(&filter)).await.map_err(ServiceError::from) }
                },
                false,
            )
            .await
    }

    pub async fn list_paginated_team_members(
        &self,
        hackathon_name: &str,
        team_id: &str,
        options: &TeamMemberQueryOptions,
    ) -> ServiceResult<PagedResult<TeamMemberEntity>> {
        let mut filters = vec![team_filter(&hackathon_name.to_lowercase(), team_id)];
        if let Some(status) = options.status {
            filters.push(filter_for_string("Status", ComparisonOperator::Equal, status.as_str()));
        }
        if let Some(role) = options.role {
            filters.push(filter_for_string("Role", ComparisonOperator::Equal, role.as_str()));
        }
        let filter = and(filters);
        let top = options.pagination.top();
        let token = options.pagination.to_continuation_token();
        let page = self.ctx.storage.team_members.query_segmented(filter.as_ref(), token.as_deref(), Some(top)).await?;
        Ok(from_page(page, top))
    }

    pub async fn can_create_team_work(&self, hackathon_name: &str, team_id: &str) -> ServiceResult<bool> {
        Ok(self.list_team_works(hackathon_name, team_id).await?.len() < MAX_WORKS_PER_TEAM)
    }

    #[instrument(skip(self, team, request), fields(hackathon = %team.hackathon_name(), team_id = %team.id()))]
    pub async fn create_team_work(&self, team: &TeamEntity, request: &TeamWorkRequest) -> ServiceResult<TeamWorkEntity> {
        if !self.can_create_team_work(team.hackathon_name(), team.id()).await? {
            return Err(ServiceError::PreconditionFailed(format!(
                "a team can have at most {MAX_WORKS_PER_TEAM} works"
            )));
        }
        let work = TeamWorkEntity {
            partition_key: team.hackathon_name().to_string(),
            row_key: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            team_id: team.id().to_string(),
            title: request.title.clone().unwrap_or_default(),
            description: request.description.clone(),
            work_type: request.work_type.unwrap_or_default(),
            url: request.url.clone().unwrap_or_default(),
            ..Default::default()
        };
        let saved = self.ctx.storage.team_works.insert(&work).await?;
        self.invalidate_works(team.hackathon_name(), team.id()).await;
        info!(work_id = %saved.id(), "team_work_created");
        Ok(saved)
    }

    pub async fn update_team_work(&self, work: &TeamWorkEntity, request: &TeamWorkRequest) -> ServiceResult<TeamWorkEntity> {
        let mut entity = work.clone();
        if let Some(v) = &request.title {
            entity.title = v.clone();
        }
        if let Some(v) = &request.description {
            entity.description = Some(v.clone());
        }
        if let Some(v) = request.work_type {
            entity.work_type = v;
        }
        if let Some(v) = &request.url {
            entity.url = v.clone();
        }
        let saved = self.ctx.storage.team_works.merge(&entity).await?;
        self.invalidate_works(work.hackathon_name(), &work.team_id).await;
        Ok(saved)
    }

    pub async fn get_team_work(&self, hackathon_name: &str, work_id: &str) -> ServiceResult<Option<TeamWorkEntity>> {
        if hackathon_name.trim().is_empty() || work_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.team_works.retrieve(&hackathon_name.to_lowercase(), work_id).await?)
    }

    /// Works of one team, cached for an hour.
    pub async fn list_team_works(&self, hackathon_name: &str, team_id: &str) -> ServiceResult<Vec<TeamWorkEntity>> {
        let name = hackathon_name.to_lowercase();
        let team_id = team_id.to_string();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &works_key(&name, &team_id),
                TEAM_WORK_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let filter = team_filter(&name, &team_id);
                    async move { storage.team_works.query_entities(Some(&filter)).await.map_err(ServiceError::from) }
                },
                false,
            )
            .await
    }

    pub async fn list_paginated_team_works(
        &self,
        hackathon_name: &str,
        team_id: &str,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<TeamWorkEntity>> {
        let all = self.list_team_works(hackathon_name, team_id).await?;
        Ok(paginate_by_created_at(all, pagination))
    }

    pub async fn delete_team_work(&self, work: &TeamWorkEntity) -> ServiceResult<()> {
        self.ctx.storage.team_works.delete(work.hackathon_name(), work.id()).await?;
        self.invalidate_works(work.hackathon_name(), &work.team_id).await;
        info!(hackathon = %work.hackathon_name(), work_id = %work.id(), "team_work_deleted");
        Ok(())
    }

    async fn invalidate_team(&self, hackathon_name: &str, team_id: &str) {
        self.ctx.cache.remove(&cache_key(CacheEntryType::Team, hackathon_name)).await;
        self.ctx.cache.remove(&team_key(&hackathon_name.to_lowercase(), team_id)).await;
    }

    async fn invalidate_members(&self, hackathon_name: &str, team_id: &str) {
        self.ctx.cache.remove(&members_key(hackathon_name, team_id)).await;
    }

    async fn invalidate_works(&self, hackathon_name: &str, team_id: &str) {
        self.ctx.cache.remove(&works_key(hackathon_name, team_id)).await;
    }
}

fn team_filter(hackathon_name: &str, team_id: &str) -> models::query::Filter {
    models::query::Filter::And(vec![
        partition_key_filter(hackathon_name),
        filter_for_string("TeamId", ComparisonOperator::Equal, team_id),
    ])
}

/// Hackathon names never contain `/`, so this cannot collide with the list key.
fn team_key(hackathon_name: &str, team_id: &str) -> String {
    cache_key(CacheEntryType::Team, &format!("{hackathon_name}/{team_id}"))
}

fn members_key(hackathon_name: &str, team_id: &str) -> String {
    cache_key(CacheEntryType::TeamMember, &format!("{hackathon_name}-{team_id}"))
}

fn works_key(hackathon_name: &str, team_id: &str) -> String {
    cache_key(CacheEntryType::TeamWork, &format!("{hackathon_name}-{team_id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_team_adds_creator() -> anyhow::Result<()> {
        let mgmt = TeamManagement::new(ManagementContext::in_memory());
        let team = mgmt.create_team("Hack", &TeamRequest::default(), "alice").await?;
        assert_eq!(team.hackathon_name(), "hack");
        assert_eq!(team.display_name, team.id());
        assert_eq!(team.members_count, 1);

        let creator = mgmt.get_team_member("hack", "alice").await?.unwrap();
        assert_eq!(creator.team_id, team.id());
        assert_eq!(creator.role, TeamMemberRole::Admin);
        assert_eq!(creator.status, TeamMemberStatus::Approved);
        assert_eq!(creator.description.as_deref(), Some("Creator"));
        Ok(())
    }

    #[tokio::test]
    async fn team_lookup_is_scoped_to_its_hackathon() -> anyhow::Result<()> {
        let mgmt = TeamManagement::new(ManagementContext::in_memory());
        let team = mgmt.create_team("a", &TeamRequest::default(), "alice").await?;
        assert!(mgmt.get_team_by_id("a", team.id()).await?.is_some());
        assert!(mgmt.get_team_by_id("b", team.id()).await?.is_none());
        // the miss under "b" must not poison the entry for "a"
        assert_eq!(mgmt.get_team_by_id("A", team.id()).await?.map(|t| t.hackathon_name().to_string()).as_deref(), Some("a"));
        Ok(())
    }

    #[tokio::test]
    async fn members_update_count() -> anyhow::Result<()> {
        let mgmt = TeamManagement::new(ManagementContext::in_memory());
        let req = TeamRequest { display_name: Some("Rustaceans".into()), ..Default::default() };
        let team = mgmt.create_team("hack", &req, "alice").await?;
        let bob = mgmt.create_team_member(&team, "bob", None, None, TeamMemberStatus::PendingApproval).await?;
        assert_eq!(bob.role, TeamMemberRole::Member);
        assert_eq!(mgmt.get_team_by_id("hack", team.id()).await?.unwrap().members_count, 2);

        let bob = mgmt.update_team_member_status(&bob, TeamMemberStatus::Approved).await?;
        let bob = mgmt.update_team_member_role(&bob, TeamMemberRole::Admin).await?;
        assert_eq!(bob.role, TeamMemberRole::Admin);

        let opts = TeamMemberQueryOptions { role: Some(TeamMemberRole::Admin), ..Default::default() };
        assert_eq!(mgmt.list_paginated_team_members("hack", team.id(), &opts).await?.value.len(), 2);
        let opts = TeamMemberQueryOptions { status: Some(TeamMemberStatus::PendingApproval), ..Default::default() };
        assert!(mgmt.list_paginated_team_members("hack", team.id(), &opts).await?.value.is_empty());

        mgmt.delete_team_member(&bob).await?;
        assert_eq!(mgmt.get_team_by_id("hack", team.id()).await?.unwrap().members_count, 1);
        assert_eq!(mgmt.list_team_members("hack", team.id()).await?.len(), 1);
        assert_eq!(mgmt.get_team_by_name("hack", "Rustaceans").await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn update_and_delete_team() -> anyhow::Result<()> {
        let mgmt = TeamManagement::new(ManagementContext::in_memory());
        let team = mgmt.create_team("hack", &TeamRequest::default(), "alice").await?;
        let req = TeamRequest { auto_approve: Some(true), description: Some("d".into()), ..Default::default() };
        let updated = mgmt.update_team(&team, &req).await?;
        assert!(updated.auto_approve);
        assert_eq!(updated.display_name, team.display_name);
        assert_eq!(mgmt.list_paginated_teams("hack", &Pagination::default()).await?.value.len(), 1);

        mgmt.delete_team(&updated).await?;
        assert!(mgmt.get_team_by_id("hack", team.id()).await?.is_none());
        assert!(mgmt.list_teams("hack").await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn team_works() -> anyhow::Result<()> {
        let mgmt = TeamManagement::new(ManagementContext::in_memory());
        let team = mgmt.create_team("hack", &TeamRequest::default(), "alice").await?;
        let req = TeamWorkRequest {
            title: Some("demo".into()),
            work_type: Some(TeamWorkType::Website),
            url: Some("https://example.com".into()),
            ..Default::default()
        };
        let work = mgmt.create_team_work(&team, &req).await?;
        assert_eq!(work.work_type, TeamWorkType::Website);

        let patch = TeamWorkRequest { description: Some("updated".into()), ..Default::default() };
        let work = mgmt.update_team_work(&work, &patch).await?;
        assert_eq!(work.title, "demo");
        assert_eq!(work.description.as_deref(), Some("updated"));

        let page = mgmt.list_paginated_team_works("hack", team.id(), &Pagination::default()).await?;
        assert_eq!(page.value.len(), 1);
        mgmt.delete_team_work(&work).await?;
        assert!(mgmt.get_team_work("hack", work.id()).await?.is_none());
        Ok(())
    }
}
