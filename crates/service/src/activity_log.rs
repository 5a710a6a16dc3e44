//! Activity feed of hackathons and users.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use common::metrics::ACTIVITY_LOGS_TOTAL;
use models::entities::{ActivityLogCategory, ActivityLogEntity};
use models::query::{and, filter_for_date, filter_for_string, partition_key_filter, ComparisonOperator};
use models::storage_utils::inversed_time_key;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::context::ManagementContext;
use crate::errors::ServiceResult;
use crate::pagination::{from_page, PagedResult, Pagination};

#[derive(Debug, Clone, Default)]
pub struct ActivityLogQueryOptions {
    pub pagination: Pagination,
    pub hackathon_name: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Clone)]
pub struct ActivityLogManagement {
    ctx: ManagementContext,
}

impl ActivityLogManagement {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }

    /// Store one copy per user and per hackathon named in `entity`.
    ///
    /// Keys and `created_at` are assigned here; entries without a type are dropped
    /// and storage failures are only logged.
    pub async fn log_activity(&self, entity: ActivityLogEntity) {
        if entity.activity_log_type.is_empty() {
            return;
        }
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let row_key = format!("{}-{}", inversed_time_key(&now), &id[..8]);

        if let Some(user_id) = entity.user_id.clone().filter(|u| !u.is_empty()) {
            self.save_copy(&entity, user_id, &row_key, ActivityLogCategory::User).await;
        }
        if let Some(hackathon) = entity.hackathon_name.clone().filter(|h| !h.is_empty()) {
            self.save_copy(&entity, hackathon, &row_key, ActivityLogCategory::Hackathon).await;
        }
    }

    /// Entry for an action on a hackathon by `user_id`.
    pub async fn log_hackathon_activity(&self, hackathon_name: &str, user_id: &str, log_type: &str, message: Option<String>) {
        self.log_activity(ActivityLogEntity {
            hackathon_name: Some(hackathon_name.to_lowercase()),
            user_id: Some(user_id.to_string()),
            activity_log_type: log_type.to_string(),
            message,
            ..Default::default()
        })
        .await
    }

    pub async fn log_user_activity(&self, user_id: &str, log_type: &str, message: Option<String>) {
        self.log_activity(ActivityLogEntity {
            user_id: Some(user_id.to_string()),
            activity_log_type: log_type.to_string(),
            message,
            ..Default::default()
        })
        .await
    }

    async fn save_copy(&self, entity: &ActivityLogEntity, partition_key: String, row_key: &str, category: ActivityLogCategory) {
        let copy = ActivityLogEntity {
            partition_key,
            row_key: row_key.to_string(),
            created_at: Utc::now(),
            category,
            timestamp: None,
            etag: None,
            ..entity.clone()
        };
        match self.ctx.storage.activity_logs.insert(&copy).await {
            Ok(_) => {
                ACTIVITY_LOGS_TOTAL.inc();
                debug!(partition_key = %copy.partition_key, category = %category, log_type = %copy.activity_log_type, "activity_logged");
            }
            Err(e) => warn!(partition_key = %copy.partition_key, error = %e, "activity_log_failed"),
        }
    }

    /// Newest first. Hackathon logs optionally narrowed to a user, else a user's
    /// own logs, else every user log.
    pub async fn list_activity_logs(&self, options: &ActivityLogQueryOptions) -> ServiceResult<PagedResult<ActivityLogEntity>> {
        let hackathon = options.hackathon_name.as_deref().filter(|h| !h.trim().is_empty());
        let user = options.user_id.as_deref().filter(|u| !u.trim().is_empty());
        let category = |c: ActivityLogCategory| filter_for_string("Category", ComparisonOperator::Equal, c.as_str());

        let filters = match (hackathon, user) {
            (Some(h), Some(u)) => vec![
                partition_key_filter(&h.to_lowercase()),
                category(ActivityLogCategory::Hackathon),
                filter_for_string("UserId", ComparisonOperator::Equal, u),
            ],
            (Some(h), None) => vec![partition_key_filter(&h.to_lowercase()), category(ActivityLogCategory::Hackathon)],
            (None, Some(u)) => vec![partition_key_filter(u), category(ActivityLogCategory::User)],
            (None, None) => vec![category(ActivityLogCategory::User)],
        };
        let filter = and(filters);
        let top = options.pagination.top();
        let token = options.pagination.to_continuation_token();
        let page = self.ctx.storage.activity_logs.query_segmented(filter.as_ref(), token.as_deref(), Some(top)).await?;
        Ok(from_page(page, top))
    }

    /// Number of user activities per user over the last `days` days.
    pub async fn count_activity_by_user(&self, days: i64) -> ServiceResult<HashMap<String, usize>> {
        let since = Utc::now() - Duration::days(days);
        let filter = and([
            filter_for_string("Category", ComparisonOperator::Equal, ActivityLogCategory::User.as_str()),
            filter_for_date("CreatedAt", ComparisonOperator::GreaterThanOrEqual, since),
        ]);
        let mut counts: HashMap<String, usize> = HashMap::new();
        for log in self.ctx.storage.activity_logs.query_entities(filter.as_ref()).await? {
            *counts.entry(log.partition_key).or_default() += 1;
        }
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn logs_are_copied_per_partition() -> anyhow::Result<()> {
        let mgmt = ActivityLogManagement::new(ManagementContext::in_memory());
        mgmt.log_hackathon_activity("Hack", "alice", "createHackathon", None).await;
        mgmt.log_user_activity("bob", "login", Some("hi".into())).await;
        mgmt.log_activity(ActivityLogEntity { user_id: Some("carol".into()), ..Default::default() }).await;

        let hack = ActivityLogQueryOptions { hackathon_name: Some("hack".into()), ..Default::default() };
        let logs = mgmt.list_activity_logs(&hack).await?;
        assert_eq!(logs.value.len(), 1);
        assert_eq!(logs.value[0].category, ActivityLogCategory::Hackathon);

        let alice = ActivityLogQueryOptions { user_id: Some("alice".into()), ..Default::default() };
        assert_eq!(mgmt.list_activity_logs(&alice).await?.value.len(), 1);
        let both = ActivityLogQueryOptions { user_id: Some("bob".into()), ..hack };
        assert!(mgmt.list_activity_logs(&both).await?.value.is_empty());

        assert_eq!(mgmt.list_activity_logs(&ActivityLogQueryOptions::default()).await?.value.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn newest_first_and_counted() -> anyhow::Result<()> {
        let mgmt = ActivityLogManagement::new(ManagementContext::in_memory());
        mgmt.log_user_activity("alice", "first", None).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        mgmt.log_user_activity("alice", "second", None).await;
        mgmt.log_user_activity("bob", "only", None).await;

        let alice = ActivityLogQueryOptions { user_id: Some("alice".into()), ..Default::default() };
        let logs = mgmt.list_activity_logs(&alice).await?;
        assert_eq!(logs.value[0].activity_log_type, "second");

        let counts = mgmt.count_activity_by_user(1).await?;
        assert_eq!(counts.get("alice"), Some(&2));
        assert_eq!(counts.get("bob"), Some(&1));
        Ok(())
    }
}
