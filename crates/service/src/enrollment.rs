//! Enrollment of users into hackathons.

use std::time::Duration;

use models::entities::{EnrollmentEntity, EnrollmentStatus, Extension, HackathonEntity};
use models::query::{and, filter_for_string, partition_key_filter, ComparisonOperator};
use tracing::{info, instrument};

use crate::cache::{cache_key, CacheEntryType};
use crate::context::ManagementContext;
use crate::errors::{ServiceError, ServiceResult};
use crate::hackathon::invalidate_hackathons;
use crate::pagination::{from_page, PagedResult, Pagination};

const ENROLLMENT_CACHE_TTL: Duration = Duration::from_secs(4 * 60 * 60);
/// Above this many enrollments, lookups go to storage instead of the cached list.
const CACHED_ENROLLMENT_LIMIT: i32 = 1000;

#[derive(Clone)]
pub struct EnrollmentManagement {
    ctx: ManagementContext,
}

impl EnrollmentManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    #[instrument(skip(self, hackathon, extensions), fields(hackathon = %hackathon.name(), user_id = %user_id))]
    pub async fn create_enrollment(
        &self,
        hackathon: &HackathonEntity,
        user_id: &str,
        extensions: Option<Vec<Extension>>,
    ) -> ServiceResult<EnrollmentEntity> {
        let status = if hackathon.auto_approve { EnrollmentStatus::Approved } else { EnrollmentStatus::PendingApproval };
        let entity = EnrollmentEntity {
            partition_key: hackathon.name().to_string(),
            row_key: user_id.to_string(),
            created_at: chrono::Utc::now(),
            status,
            extensions,
            ..Default::default()
        };
        let saved = self.ctx.storage.enrollments.insert_or_replace(&entity).await?;
        if status == EnrollmentStatus::Approved {
            self.adjust_enrollment_count(hackathon.name(), 1).await?;
        }
        self.invalidate(hackathon.name()).await;
        info!(status = %status, "enrollment_created");
        Ok(saved)
    }

    pub async fn update_enrollment(
        &self,
        existing: &EnrollmentEntity,
        extensions: Option<Vec<Extension>>,
    ) -> ServiceResult<EnrollmentEntity> {
        let Some(extensions) = extensions else {
            return Ok(existing.clone());
        };
        let mut entity = existing.clone();
        entity.extensions = Some(extensions);
        let saved = self.ctx.storage.enrollments.merge(&entity).await?;
        self.invalidate(existing.hackathon_name()).await;
        Ok(saved)
    }

    /// Keeps the hackathon's approved-enrollment counter in step with the status change.
    #[instrument(skip(self, hackathon, enrollment), fields(hackathon = %hackathon.name(), user_id = %enrollment.user_id(), status = %status))]
    pub async fn update_enrollment_status(
        &self,
        hackathon: &HackathonEntity,
        enrollment: &EnrollmentEntity,
        status: EnrollmentStatus,
    ) -> ServiceResult<EnrollmentEntity> {
        if enrollment.status == status {
            return Ok(enrollment.clone());
        }
        let mut delta = 0;
        if status == EnrollmentStatus::Approved {
            delta = 1;
        } else if enrollment.status == EnrollmentStatus::Approved && hackathon.enrollment >= 1 {
            delta = -1;
        }

        let mut entity = enrollment.clone();
        entity.status = status;
        let saved = self.ctx.storage.enrollments.merge(&entity).await?;
        if delta != 0 {
            self.adjust_enrollment_count(hackathon.name(), delta).await?;
        }
        self.invalidate(hackathon.name()).await;
        info!(delta, "enrollment_status_updated");
        Ok(saved)
    }

    async fn adjust_enrollment_count(&self, hackathon_name: &str, delta: i32) -> ServiceResult<()> {
        self.ctx
            .storage
            .hackathons
            .retrieve_and_merge(hackathon_name, "", |h| h.enrollment = (h.enrollment + delta).max(0))
            .await?;
        invalidate_hackathons(&self.ctx).await;
        Ok(())
    }

    pub async fn list_paginated_enrollments(
        &self,
        hackathon_name: &str,
        status: Option<EnrollmentStatus>,
        pagination: &Pagination,
    ) -> ServiceResult<PagedResult<EnrollmentEntity>> {
        let mut filters = vec![partition_key_filter(&hackathon_name.to_lowercase())];
        if let Some(status) = status {
            filters.push(filter_for_string("Status", ComparisonOperator::Equal, status.as_str()));
        }
        let filter = and(filters);
        let top = pagination.top();
        let token = pagination.to_continuation_token();
        let page = self.ctx.storage.enrollments.query_segmented(filter.as_ref(), token.as_deref(), Some(top)).await?;
        Ok(from_page(page, top))
    }

    /// All enrollments of a hackathon, cached for four hours.
    pub async fn list_enrollments(&self, hackathon_name: &str) -> ServiceResult<Vec<EnrollmentEntity>> {
        let name = hackathon_name.to_lowercase();
        let storage = self.ctx.storage.clone();
        self.ctx
            .cache
            .get_or_add(
                &cache_key(CacheEntryType::Enrollment, &name),
                ENROLLMENT_CACHE_TTL,
                move || {
                    let storage = storage.clone();
                    let name = name.clone();
                    async move {
                        storage.enrollments.query_entities(Some(&partition_key_filter(&name))).await.map_err(ServiceError::from)
                    }
                },
                false,
            )
            .await
    }

    pub async fn get_enrollment(&self, hackathon_name: &str, user_id: &str) -> ServiceResult<Option<EnrollmentEntity>> {
        if hackathon_name.trim().is_empty() || user_id.trim().is_empty() {
            return Ok(None);
        }
        Ok(self.ctx.storage.enrollments.retrieve(&hackathon_name.to_lowercase(), user_id).await?)
    }

    /// True only for an approved enrollment.
    pub async fn is_user_enrolled(&self, hackathon: &HackathonEntity, user_id: &str) -> ServiceResult<bool> {
        if user_id.trim().is_empty() {
            return Ok(false);
        }
        if hackathon.max_enrollment > 0 && hackathon.max_enrollment <= CACHED_ENROLLMENT_LIMIT {
            let all = self.list_enrollments(hackathon.name()).await?;
            return Ok(all.iter().any(|e| e.user_id() == user_id && e.status == EnrollmentStatus::Approved));
        }
        let enrollment = self.get_enrollment(hackathon.name(), user_id).await?;
        Ok(enrollment.is_some_and(|e| e.status == EnrollmentStatus::Approved))
    }

    async fn invalidate(&self, hackathon_name: &str) {
        self.ctx.cache.remove(&cache_key(CacheEntryType::Enrollment, &hackathon_name.to_lowercase())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seed_hackathon(ctx: &ManagementContext, auto_approve: bool, max_enrollment: i32) -> anyhow::Result<HackathonEntity> {
        let entity = HackathonEntity {
            partition_key: "hack".into(),
            auto_approve,
            max_enrollment,
            ..Default::default()
        };
        Ok(ctx.storage.hackathons.insert(&entity).await?)
    }

    #[tokio::test]
    async fn auto_approve_counts_enrollment() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let hackathon = seed_hackathon(&ctx, true, 10).await?;
        let mgmt = EnrollmentManagement::new(ctx.clone());

        let e = mgmt.create_enrollment(&hackathon, "u1", None).await?;
        assert_eq!(e.status, EnrollmentStatus::Approved);
        let stored = ctx.storage.hackathons.retrieve("hack", "").await?.unwrap();
        assert_eq!(stored.enrollment, 1);
        assert!(mgmt.is_user_enrolled(&stored, "u1").await?);
        Ok(())
    }

    #[tokio::test]
    async fn status_changes_move_counter() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let hackathon = seed_hackathon(&ctx, false, 0).await?;
        let mgmt = EnrollmentManagement::new(ctx.clone());

        let e = mgmt.create_enrollment(&hackathon, "u1", None).await?;
        assert_eq!(e.status, EnrollmentStatus::PendingApproval);
        assert!(!mgmt.is_user_enrolled(&hackathon, "u1").await?);

        let approved = mgmt.update_enrollment_status(&hackathon, &e, EnrollmentStatus::Approved).await?;
        let h = ctx.storage.hackathons.retrieve("hack", "").await?.unwrap();
        assert_eq!(h.enrollment, 1);
        assert!(mgmt.is_user_enrolled(&h, "u1").await?);

        let same = mgmt.update_enrollment_status(&h, &approved, EnrollmentStatus::Approved).await?;
        assert_eq!(same.status, EnrollmentStatus::Approved);

        mgmt.update_enrollment_status(&h, &approved, EnrollmentStatus::Rejected).await?;
        let h = ctx.storage.hackathons.retrieve("hack", "").await?.unwrap();
        assert_eq!(h.enrollment, 0);
        Ok(())
    }

    #[tokio::test]
    async fn lists_by_status() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let hackathon = seed_hackathon(&ctx, false, 0).await?;
        let mgmt = EnrollmentManagement::new(ctx.clone());
        let e1 = mgmt.create_enrollment(&hackathon, "u1", None).await?;
        mgmt.create_enrollment(&hackathon, "u2", None).await?;
        mgmt.create_enrollment(&hackathon, "u3", None).await?;
        mgmt.update_enrollment_status(&hackathon, &e1, EnrollmentStatus::Approved).await?;

        let approved = mgmt
            .list_paginated_enrollments("hack", Some(EnrollmentStatus::Approved), &Pagination::default())
            .await?;
        assert_eq!(approved.value.len(), 1);

        let first = mgmt.list_paginated_enrollments("hack", None, &Pagination::with_top(Some(2))).await?;
        assert_eq!(first.value.len(), 2);
        let next = first.next_page.unwrap();
        assert_eq!(next.to_continuation_token().as_deref(), Some("hack u3"));
        let rest = mgmt.list_paginated_enrollments("hack", None, &next).await?;
        assert_eq!(rest.value.len(), 1);
        assert!(rest.next_page.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn blank_lookups_return_none() -> anyhow::Result<()> {
        let mgmt = EnrollmentManagement::new(ManagementContext::in_memory());
        assert!(mgmt.get_enrollment("", "u").await?.is_none());
        assert!(mgmt.get_enrollment("h", " ").await?.is_none());
        Ok(())
    }
}
