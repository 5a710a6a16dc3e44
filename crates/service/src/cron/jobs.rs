use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use super::CronJob;
use crate::activity_log::ActivityLogManagement;
use crate::context::ManagementContext;
use crate::experiment::ExperimentManagement;
use crate::hackathon::{invalidate_hackathons, HackathonManagement};
use crate::user::UserManagement;

const DAY: Duration = Duration::from_secs(24 * 3600);
const TOP_USERS_WINDOW_DAYS: i64 = 365;
const TOP_USERS_COUNT: usize = 100;

/// Rank users by their activity over the last year.
pub struct RefreshTopUsersJob {
    activities: ActivityLogManagement,
    users: UserManagement,
}

impl RefreshTopUsersJob {
    pub fn new(ctx: ManagementContext) -> Self {
        Self { activities: ActivityLogManagement::new(ctx.clone()), users: UserManagement::new(ctx) }
    }
}

#[async_trait]
impl CronJob for RefreshTopUsersJob {
    fn name(&self) -> &str { "RefreshTopUsersJob" }

    fn interval(&self) -> Duration { DAY }

    async fn execute(&self) -> anyhow::Result<()> {
        let counts = self.activities.count_activity_by_user(TOP_USERS_WINDOW_DAYS).await?;
        let mut scores: Vec<(String, i32)> =
            counts.into_iter().map(|(user, count)| (user, i32::try_from(count).unwrap_or(i32::MAX))).collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scores.truncate(TOP_USERS_COUNT);
        self.users.replace_top_users(&scores).await?;
        Ok(())
    }
}

/// Remove cluster resources of read-only hackathons once.
pub struct CleanupKubernetesJob {
    ctx: ManagementContext,
    hackathons: HackathonManagement,
    experiments: ExperimentManagement,
}

impl CleanupKubernetesJob {
    pub fn new(ctx: ManagementContext, experiments: ExperimentManagement) -> Self {
        Self { hackathons: HackathonManagement::new(ctx.clone()), ctx, experiments }
    }
}

#[async_trait]
impl CronJob for CleanupKubernetesJob {
    fn name(&self) -> &str { "CleanupKubernetesJob" }

    fn interval(&self) -> Duration { DAY }

    async fn execute(&self) -> anyhow::Result<()> {
        let hackathons = self.hackathons.list_all_hackathons().await?;
        let mut cleaned = 0;
        for hackathon in hackathons.into_values().filter(|h| h.read_only && !h.experiment_cleaned) {
            let failures = self.experiments.cleanup_hackathon_resources(hackathon.name()).await?;
            if failures > 0 {
                warn!(hackathon = %hackathon.name(), failures, "hackathon_cleanup_incomplete");
                continue;
            }
            let mut updated = hackathon;
            updated.experiment_cleaned = true;
            self.ctx.storage.hackathons.merge(&updated).await?;
            cleaned += 1;
        }
        if cleaned > 0 {
            invalidate_hackathons(&self.ctx).await;
        }
        info!(cleaned, "kubernetes_cleanup_done");
        Ok(())
    }
}

/// Re-supply expired auto-refresh cache entries.
pub struct CacheRefreshJob {
    ctx: ManagementContext,
}

impl CacheRefreshJob {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx } }
}

#[async_trait]
impl CronJob for CacheRefreshJob {
    fn name(&self) -> &str { "CacheRefreshJob" }

    fn interval(&self) -> Duration { Duration::from_secs(60) }

    fn exclusive(&self) -> bool { false }

    async fn execute(&self) -> anyhow::Result<()> {
        self.ctx.cache.refresh_all().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::experiment::TemplateRequest;
    use crate::hackathon::HackathonRequest;
    use crate::kubernetes::mock::MockKubernetesCluster;
    use crate::kubernetes::DEFAULT_NAMESPACE;

    #[tokio::test]
    async fn top_users_follow_activity() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let logs = ActivityLogManagement::new(ctx.clone());
        for _ in 0..3 {
            logs.log_user_activity("bob", "login", None).await;
        }
        logs.log_user_activity("alice", "login", None).await;

        RefreshTopUsersJob::new(ctx.clone()).execute().await?;
        let top = UserManagement::new(ctx).list_top_users(None).await?;
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].user_id, "bob");
        assert_eq!(top[0].score, 3);
        assert_eq!(top[1].user_id, "alice");
        Ok(())
    }

    #[tokio::test]
    async fn read_only_hackathons_are_cleaned_once() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let cluster = Arc::new(MockKubernetesCluster::default());
        let experiments = ExperimentManagement::new(ctx.clone(), cluster.clone(), DEFAULT_NAMESPACE);
        let hackathons = HackathonManagement::new(ctx.clone());
        let hackathon = hackathons.create_hackathon(&HackathonRequest { name: "hack".into(), ..Default::default() }, "alice").await?;
        let template = experiments.create_or_update_template("hack", &TemplateRequest::default()).await?;
        experiments.create_experiment("hack", template.template.id(), "alice").await?;

        let job = CleanupKubernetesJob::new(ctx.clone(), experiments);
        job.execute().await?;
        assert_eq!(cluster.experiment_count(), 1);

        hackathons.update_hackathon_read_only(&hackathon, true).await?;
        job.execute().await?;
        assert_eq!(cluster.experiment_count(), 0);
        assert_eq!(cluster.template_count(), 0);
        let stored = ctx.storage.hackathons.retrieve("hack", "").await?.unwrap();
        assert!(stored.experiment_cleaned);
        Ok(())
    }
}
