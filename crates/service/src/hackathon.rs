//! Hackathon lifecycle, listing and per-user roles.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use models::entities::{HackathonEntity, HackathonStatus, PictureInfo};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::enrollment::EnrollmentManagement;
use crate::errors::{ServiceError, ServiceResult};
use crate::hackathon_admin::HackathonAdminManagement;
use crate::judge::JudgeManagement;
use crate::pagination::{paginate, PagedResult, Pagination};

const ALL_HACKATHONS_TTL: Duration = Duration::from_secs(10 * 60);
const MAX_CREATED_PER_DAY: usize = 3;
const MAX_CREATED_PER_MONTH: usize = 10;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-z0-9\-]{1,100}$").expect("valid hackathon name pattern"));

fn all_hackathons_key() -> String { cache_key(CacheEntryType::Hackathon, "all") }

pub(crate) async fn invalidate_hackathons(ctx: &ManagementContext) {
    ctx.cache.remove(&all_hackathons_key()).await;
}

/// Create or update payload. Absent fields are left untouched on update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HackathonRequest {
    #[serde(default)]
    pub name: String,
    pub display_name: Option<String>,
    pub ribbon: Option<String>,
    pub summary: Option<String>,
    pub detail: Option<String>,
    pub location: Option<String>,
    pub banners: Option<Vec<PictureInfo>>,
    pub max_enrollment: Option<i32>,
    pub auto_approve: Option<bool>,
    pub tags: Option<Vec<String>>,
    pub event_start_time: Option<DateTime<Utc>>,
    pub event_end_time: Option<DateTime<Utc>>,
    pub enrollment_start_time: Option<DateTime<Utc>>,
    pub enrollment_end_time: Option<DateTime<Utc>>,
    pub judge_start_time: Option<DateTime<Utc>>,
    pub judge_end_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum HackathonListType {
    #[default]
    Online,
    Admin,
    Enrolled,
    Fresh,
    Created,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum HackathonOrderBy {
    #[default]
    CreatedAt,
    UpdatedAt,
    Hot,
}

#[derive(Debug, Clone, Default)]
pub struct HackathonQueryOptions {
    pub pagination: Pagination,
    pub search: Option<String>,
    pub user_id: Option<String>,
    pub list_type: HackathonListType,
    pub order_by: HackathonOrderBy,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HackathonRoles {
    pub is_admin: bool,
    pub is_enrolled: bool,
    pub is_judge: bool,
}

#[derive(Clone)]
pub struct HackathonManagement {
    ctx: ManagementContext,
    admins: HackathonAdminManagement,
    enrollments: EnrollmentManagement,
    judges: JudgeManagement,
}

impl HackathonManagement {
    pub fn new(ctx: ManagementContext) -> Self {
        Self {
            admins: HackathonAdminManagement::new(ctx.clone()),
            enrollments: EnrollmentManagement::new(ctx.clone()),
            judges: JudgeManagement::new(ctx.clone()),
            ctx,
        }
    }

    /// Lowercase letters, digits and dashes only.
    pub fn is_valid_name(name: &str) -> bool { NAME_PATTERN.is_match(name) }

    pub async fn check_name_availability(&self, name: &str) -> ServiceResult<bool> {
        let name = name.to_lowercase();
        if !Self::is_valid_name(&name) {
            return Ok(false);
        }
        Ok(self.ctx.storage.hackathons.retrieve(&name, "").await?.is_none())
    }

    /// At most three hackathons a day and ten a month per creator.
    pub async fn can_create_hackathon(&self, user_id: &str) -> ServiceResult<bool> {
        let now = Utc::now();
        let all = self.list_all_hackathons().await?;
        let mine: Vec<&HackathonEntity> = all.values().filter(|h| h.creator_id == user_id).collect();
        let last_day = mine.iter().filter(|h| h.created_at > now - chrono::Duration::days(1)).count();
        let last_month = mine.iter().filter(|h| h.created_at > now - chrono::Duration::days(30)).count();
        Ok(last_day < MAX_CREATED_PER_DAY && last_month < MAX_CREATED_PER_MONTH)
    }

    /// Create a hackathon in planning status; the creator becomes its admin.
    ///
    /// # Examples
    /// ```
    /// use service::context::ManagementContext;
    /// use service::hackathon::{HackathonManagement, HackathonRequest};
    /// let mgmt = HackathonManagement::new(ManagementContext::in_memory());
    /// let req = HackathonRequest { name: "Demo".into(), ..Default::default() };
    /// let h = tokio_test::block_on(mgmt.create_hackathon(&req, "alice")).unwrap();
    /// assert_eq!(h.name(), "demo");
    /// assert_eq!(h.display_name, "demo");
    /// ```
    #[instrument(skip(self, request), fields(hackathon = %request.name, creator_id = %creator_id))]
    pub async fn create_hackathon(&self, request: &HackathonRequest, creator_id: &str) -> ServiceResult<HackathonEntity> {
        let name = request.name.to_lowercase();
        if !Self::is_valid_name(&name) {
            return Err(ServiceError::Validation(format!("invalid hackathon name: {}", request.name)));
        }
        let entity = HackathonEntity {
            partition_key: name.clone(),
            row_key: String::new(),
            created_at: Utc::now(),
            display_name: request.display_name.clone().filter(|d| !d.trim().is_empty()).unwrap_or_else(|| name.clone()),
            ribbon: request.ribbon.clone(),
            summary: request.summary.clone(),
            detail: request.detail.clone(),
            location: request.location.clone(),
            banners: request.banners.clone(),
            status: HackathonStatus::Planning,
            max_enrollment: request.max_enrollment.unwrap_or(0),
            auto_approve: request.auto_approve.unwrap_or(false),
            read_only: false,
            tags: request.tags.clone(),
            creator_id: creator_id.to_string(),
            event_start_time: request.event_start_time,
            event_end_time: request.event_end_time,
            enrollment_start_time: request.enrollment_start_time,
            enrollment_end_time: request.enrollment_end_time,
            judge_start_time: request.judge_start_time,
            judge_end_time: request.judge_end_time,
            ..Default::default()
        };
        let saved = self.ctx.storage.hackathons.insert(&entity).await.map_err(|e| match e {
            models::ModelError::Conflict(_) => ServiceError::Conflict(format!("hackathon {name} already exists")),
            other => other.into(),
        })?;
        self.admins.create_admin(&name, creator_id).await?;
        invalidate_hackathons(&self.ctx).await;
        info!("hackathon_created");
        Ok(saved)
    }

    /// Merge present fields and return the stored entity.
    #[instrument(skip(self, request), fields(hackathon = %request.name))]
    pub async fn update_hackathon(&self, request: &HackathonRequest) -> ServiceResult<HackathonEntity> {
        let name = request.name.to_lowercase();
        let updated = self
            .ctx
            .storage
            .hackathons
            .retrieve_and_merge(&name, "", |e| {
                if let Some(v) = &request.display_name { e.display_name = v.clone(); }
                if let Some(v) = &request.ribbon { e.ribbon = Some(v.clone()); }
                if let Some(v) = &request.summary { e.summary = Some(v.clone()); }
                if let Some(v) = &request.detail { e.detail = Some(v.clone()); }
                if let Some(v) = &request.location { e.location = Some(v.clone()); }
                if let Some(v) = &request.banners { e.banners = Some(v.clone()); }
                if let Some(v) = request.max_enrollment { e.max_enrollment = v; }
                if let Some(v) = request.auto_approve { e.auto_approve = v; }
                if let Some(v) = &request.tags { e.tags = Some(v.clone()); }
                if request.event_start_time.is_some() { e.event_start_time = request.event_start_time; }
                if request.event_end_time.is_some() { e.event_end_time = request.event_end_time; }
                if request.enrollment_start_time.is_some() { e.enrollment_start_time = request.enrollment_start_time; }
                if request.enrollment_end_time.is_some() { e.enrollment_end_time = request.enrollment_end_time; }
                if request.judge_start_time.is_some() { e.judge_start_time = request.judge_start_time; }
                if request.judge_end_time.is_some() { e.judge_end_time = request.judge_end_time; }
            })
            .await?
            .ok_or_else(|| ServiceError::not_found("hackathon"))?;
        invalidate_hackathons(&self.ctx).await;
        info!("hackathon_updated");
        Ok(updated)
    }

    #[instrument(skip(self, hackathon), fields(hackathon = %hackathon.name(), status = %status))]
    pub async fn update_hackathon_status(&self, hackathon: &HackathonEntity, status: HackathonStatus) -> ServiceResult<HackathonEntity> {
        if hackathon.status == status {
            return Ok(hackathon.clone());
        }
        let mut entity = hackathon.clone();
        entity.status = status;
        let saved = self.ctx.storage.hackathons.merge(&entity).await?;
        invalidate_hackathons(&self.ctx).await;
        info!("hackathon_status_updated");
        Ok(saved)
    }

    /// Planning to pendingApproval, awaiting a platform admin.
    pub async fn request_publish(&self, hackathon: &HackathonEntity) -> ServiceResult<HackathonEntity> {
        self.update_hackathon_status(hackathon, HackathonStatus::PendingApproval).await
    }

    pub async fn publish(&self, hackathon: &HackathonEntity) -> ServiceResult<HackathonEntity> {
        self.update_hackathon_status(hackathon, HackathonStatus::Online).await
    }

    #[instrument(skip(self, hackathon), fields(hackathon = %hackathon.name(), read_only = read_only))]
    pub async fn update_hackathon_read_only(&self, hackathon: &HackathonEntity, read_only: bool) -> ServiceResult<HackathonEntity> {
        let mut entity = hackathon.clone();
        entity.read_only = read_only;
        let saved = self.ctx.storage.hackathons.merge(&entity).await?;
        invalidate_hackathons(&self.ctx).await;
        info!("hackathon_read_only_updated");
        Ok(saved)
    }

    /// Mark deleted and take offline; the row stays.
    #[instrument(skip(self), fields(hackathon = %name))]
    pub async fn delete_hackathon_logically(&self, name: &str) -> ServiceResult<()> {
        self.ctx
            .storage
            .hackathons
            .retrieve_and_merge(&name.to_lowercase(), "", |e| {
                e.is_deleted = true;
                e.status = HackathonStatus::Offline;
            })
            .await?;
        invalidate_hackathons(&self.ctx).await;
        info!("hackathon_deleted");
        Ok(())
    }

    /// `None` for missing or offline hackathons. Names are case-insensitive.
    pub async fn get_hackathon_entity_by_name(&self, name: &str) -> ServiceResult<Option<HackathonEntity>> {
        if name.trim().is_empty() {
            return Ok(None);
        }
        let entity = self.ctx.storage.hackathons.retrieve(&name.to_lowercase(), "").await?;
        Ok(entity.filter(|h| h.status != HackathonStatus::Offline))
    }

    /// Every hackathon keyed by name, cached for ten minutes and refreshed in the background.
    pub async fn list_all_hackathons(&self) -> ServiceResult<HashMap<String, HackathonEntity>> {
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &all_hackathons_key(),
                ALL_HACKATHONS_TTL,
                move || {
                    let storage = storage.clone();
                    async move {
                        storage
                            .hackathons
                            .query_entities(None)
                            .await
                            .map(|all| all.into_iter().map(|h| (h.partition_key.clone(), h)).collect::<HashMap<_, _>>())
                            .map_err(ServiceError::from)
                    }
                },
                true,
            )
            .await
    }

    pub async fn list_paginated_hackathons(&self, options: &HackathonQueryOptions) -> ServiceResult<PagedResult<HackathonEntity>> {
        let user_id = options.user_id.as_deref().unwrap_or_default();
        let all = self.list_all_hackathons().await?;
        let live = all.into_values().filter(|h| !h.is_deleted);

        let mut selected: Vec<HackathonEntity> = match options.list_type {
            HackathonListType::Online => {
                let search = options.search.as_deref().map(str::to_lowercase).filter(|s| !s.trim().is_empty());
                live.filter(|h| h.is_online())
                    .filter(|h| search.as_deref().map_or(true, |s| matches_search(h, s)))
                    .collect()
            }
            HackathonListType::Admin => {
                if user_id.is_empty() {
                    Vec::new()
                } else if self.admins.is_platform_admin(user_id).await? {
                    live.collect()
                } else {
                    let mut out = Vec::new();
                    for h in live {
                        let admins = self.admins.list_hackathon_admin(h.name()).await?;
                        if admins.iter().any(|a| a.user_id() == user_id) {
                            out.push(h);
                        }
                    }
                    out
                }
            }
            HackathonListType::Enrolled => {
                let mut out = Vec::new();
                if !user_id.is_empty() {
                    for h in live {
                        if self.enrollments.is_user_enrolled(&h, user_id).await? {
                            out.push(h);
                        }
                    }
                }
                out
            }
            HackathonListType::Fresh => {
                let now = Utc::now();
                live.filter(|h| h.is_online() && h.event_start_time.is_some_and(|t| t > now)).collect()
            }
            HackathonListType::Created => {
                if user_id.is_empty() {
                    Vec::new()
                } else {
                    live.filter(|h| h.creator_id == user_id).collect()
                }
            }
        };

        match options.order_by {
            HackathonOrderBy::CreatedAt => selected.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            HackathonOrderBy::UpdatedAt => selected.sort_by(|a, b| b.timestamp.cmp(&a.timestamp)),
            HackathonOrderBy::Hot => selected.sort_by(|a, b| b.enrollment.cmp(&a.enrollment)),
        }
        Ok(paginate(selected, &options.pagination))
    }

    /// `None` without a user.
    pub async fn get_hackathon_roles(&self, hackathon: &HackathonEntity, user_id: Option<&str>) -> ServiceResult<Option<HackathonRoles>> {
        let Some(user_id) = user_id.filter(|u| !u.trim().is_empty()) else {
            return Ok(None);
        };
        Ok(Some(HackathonRoles {
            is_admin: self.admins.is_hackathon_admin(hackathon.name(), user_id).await?,
            is_enrolled: self.enrollments.is_user_enrolled(hackathon, user_id).await?,
            is_judge: self.judges.is_judge(hackathon.name(), user_id).await?,
        }))
    }

    pub async fn list_hackathon_roles(
        &self,
        hackathons: Vec<HackathonEntity>,
        user_id: Option<&str>,
    ) -> ServiceResult<Vec<(HackathonEntity, Option<HackathonRoles>)>> {
        let mut out = Vec::with_capacity(hackathons.len());
        for h in hackathons {
            let roles = self.get_hackathon_roles(&h, user_id).await?;
            out.push((h, roles));
        }
        Ok(out)
    }
}

fn matches_search(h: &HackathonEntity, search: &str) -> bool {
    h.name().to_lowercase().contains(search)
        || h.display_name.to_lowercase().contains(search)
        || h.detail.as_deref().is_some_and(|d| d.to_lowercase().contains(search))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str) -> HackathonRequest {
        HackathonRequest { name: name.into(), ..Default::default() }
    }

    async fn online(mgmt: &HackathonManagement, name: &str, creator: &str) -> anyhow::Result<HackathonEntity> {
        let h = mgmt.create_hackathon(&request(name), creator).await?;
        Ok(mgmt.publish(&h).await?)
    }

    #[tokio::test]
    async fn create_sets_defaults_and_admin() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let mgmt = HackathonManagement::new(ctx.clone());
        let h = mgmt.create_hackathon(&request("Hack1"), "alice").await?;
        assert_eq!(h.name(), "hack1");
        assert_eq!(h.display_name, "hack1");
        assert_eq!(h.status, HackathonStatus::Planning);
        assert!(!h.read_only);
        assert!(HackathonAdminManagement::new(ctx).is_hackathon_admin("hack1", "alice").await?);

        let dup = mgmt.create_hackathon(&request("hack1"), "bob").await.unwrap_err();
        assert!(matches!(dup, ServiceError::Conflict(_)));
        assert!(!mgmt.check_name_availability("HACK1").await?);
        assert!(!mgmt.check_name_availability("bad name").await?);
        assert!(mgmt.check_name_availability("fresh").await?);
        Ok(())
    }

    #[tokio::test]
    async fn update_merges_present_fields() -> anyhow::Result<()> {
        let mgmt = HackathonManagement::new(ManagementContext::in_memory());
        let mut req = request("hack");
        req.summary = Some("first".into());
        mgmt.create_hackathon(&req, "alice").await?;

        let update = HackathonRequest { name: "hack".into(), detail: Some("details".into()), max_enrollment: Some(50), ..Default::default() };
        let h = mgmt.update_hackathon(&update).await?;
        assert_eq!(h.summary.as_deref(), Some("first"));
        assert_eq!(h.detail.as_deref(), Some("details"));
        assert_eq!(h.max_enrollment, 50);

        let missing = mgmt.update_hackathon(&request("nope")).await.unwrap_err();
        assert!(matches!(missing, ServiceError::NotFound(_)));
        Ok(())
    }

    #[tokio::test]
    async fn offline_hackathons_are_hidden() -> anyhow::Result<()> {
        let mgmt = HackathonManagement::new(ManagementContext::in_memory());
        online(&mgmt, "hack", "alice").await?;
        assert!(mgmt.get_hackathon_entity_by_name("HACK").await?.is_some());
        mgmt.delete_hackathon_logically("hack").await?;
        assert!(mgmt.get_hackathon_entity_by_name("hack").await?.is_none());
        let list = mgmt.list_paginated_hackathons(&HackathonQueryOptions::default()).await?;
        assert!(list.value.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn list_types_filter_by_user() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let mgmt = HackathonManagement::new(ctx.clone());
        online(&mgmt, "a", "alice").await?;
        online(&mgmt, "b", "bob").await?;
        mgmt.create_hackathon(&request("c"), "alice").await?;

        let opts = |list_type, user: Option<&str>| HackathonQueryOptions {
            list_type,
            user_id: user.map(str::to_string),
            ..Default::default()
        };
        assert_eq!(mgmt.list_paginated_hackathons(&opts(HackathonListType::Online, None)).await?.value.len(), 2);
        assert_eq!(mgmt.list_paginated_hackathons(&opts(HackathonListType::Created, Some("alice"))).await?.value.len(), 2);
        assert!(mgmt.list_paginated_hackathons(&opts(HackathonListType::Created, None)).await?.value.is_empty());
        assert_eq!(mgmt.list_paginated_hackathons(&opts(HackathonListType::Admin, Some("bob"))).await?.value.len(), 1);
        assert!(mgmt.list_paginated_hackathons(&opts(HackathonListType::Admin, None)).await?.value.is_empty());
        assert!(mgmt.list_paginated_hackathons(&opts(HackathonListType::Enrolled, None)).await?.value.is_empty());

        HackathonAdminManagement::new(ctx).create_platform_admin("root").await?;
        assert_eq!(mgmt.list_paginated_hackathons(&opts(HackathonListType::Admin, Some("root"))).await?.value.len(), 3);

        let search = HackathonQueryOptions { search: Some("B".into()), ..Default::default() };
        assert_eq!(mgmt.list_paginated_hackathons(&search).await?.value.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn creation_is_rate_limited() -> anyhow::Result<()> {
        let mgmt = HackathonManagement::new(ManagementContext::in_memory());
        for i in 0..MAX_CREATED_PER_DAY {
            assert!(mgmt.can_create_hackathon("alice").await?);
            mgmt.create_hackathon(&request(&format!("h{i}")), "alice").await?;
        }
        assert!(!mgmt.can_create_hackathon("alice").await?);
        assert!(mgmt.can_create_hackathon("bob").await?);
        Ok(())
    }

    #[tokio::test]
    async fn roles_require_a_user() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let mgmt = HackathonManagement::new(ctx.clone());
        let h = online(&mgmt, "hack", "alice").await?;
        assert!(mgmt.get_hackathon_roles(&h, None).await?.is_none());
        let roles = mgmt.get_hackathon_roles(&h, Some("alice")).await?.unwrap();
        assert_eq!(roles, HackathonRoles { is_admin: true, is_enrolled: false, is_judge: false });

        JudgeManagement::new(ctx).create_judge("hack", "jane", None).await?;
        let all = mgmt.list_hackathon_roles(vec![h], Some("jane")).await?;
        assert!(all[0].1.is_some_and(|r| r.is_judge && !r.is_admin));
        Ok(())
    }

    #[tokio::test]
    async fn publish_flow() -> anyhow::Result<()> {
        let mgmt = HackathonManagement::new(ManagementContext::in_memory());
        let h = mgmt.create_hackathon(&request("hack"), "alice").await?;
        let h = mgmt.request_publish(&h).await?;
        assert_eq!(h.status, HackathonStatus::PendingApproval);
        let h = mgmt.publish(&h).await?;
        assert_eq!(h.status, HackathonStatus::Online);
        let h = mgmt.update_hackathon_read_only(&h, true).await?;
        assert!(h.read_only);
        Ok(())
    }
}
