//! Background jobs run on fixed intervals.
//!
//! Exclusive jobs persist a [`CronJobEntity`] holding the last execute time and
//! a paused flag, so a restart does not re-run a job before its interval has
//! elapsed. Runs of the same job never overlap within the process.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use common::metrics::{CRON_FAILURES_TOTAL, CRON_RUNS_TOTAL};
use dashmap::DashMap;
use models::entities::CronJobEntity;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::context::ManagementContext;

pub mod jobs;
pub mod reports;

pub use jobs::{CacheRefreshJob, CleanupKubernetesJob, RefreshTopUsersJob};
pub use reports::{ReportJob, ReportType};

#[async_trait]
pub trait CronJob: Send + Sync {
    fn name(&self) -> &str;

    fn interval(&self) -> Duration;

    /// Exclusive jobs are tracked in storage and never overlap.
    fn exclusive(&self) -> bool { true }

    async fn execute(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Executed,
    Failed,
    Busy,
    Paused,
    NotDue,
}

pub struct CronScheduler {
    ctx: ManagementContext,
    jobs: Vec<Arc<dyn CronJob>>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CronScheduler {
    pub fn new(ctx: ManagementContext) -> Self { Self { ctx, jobs: Vec::new(), locks: DashMap::new() } }

    pub fn register(mut self, job: Arc<dyn CronJob>) -> Self {
        self.jobs.push(job);
        self
    }

    pub fn jobs(&self) -> &[Arc<dyn CronJob>] { &self.jobs }

    /// Spawn one ticking task per job. Abort the handles to stop them.
    pub fn start(self: Arc<Self>) -> Vec<JoinHandle<()>> {
        self.jobs
            .iter()
            .cloned()
            .map(|job| {
                let scheduler = self.clone();
                tokio::spawn(async move {
                    info!(job = job.name(), interval_secs = job.interval().as_secs(), "cron_job_scheduled");
                    let mut ticker = tokio::time::interval(job.interval());
                    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    loop {
                        ticker.tick().await;
                        scheduler.run_once(job.as_ref()).await;
                    }
                })
            })
            .collect()
    }

    pub async fn run_once(&self, job: &dyn CronJob) -> RunOutcome {
        if !job.exclusive() {
            return Self::execute(job).await;
        }

        let lock = self.locks.entry(job.name().to_string()).or_default().clone();
        let Ok(_guard) = lock.try_lock() else {
            debug!(job = job.name(), "cron_job_busy");
            return RunOutcome::Busy;
        };

        let table = &self.ctx.storage.cron_jobs;
        let mut entity = match table.retrieve(job.name(), job.name()).await {
            Ok(found) => found.unwrap_or_else(|| CronJobEntity::new(job.name())),
            Err(e) => {
                error!(job = job.name(), error = %e, "cron_job_state_unavailable");
                return RunOutcome::Failed;
            }
        };
        if entity.paused {
            debug!(job = job.name(), "cron_job_paused");
            return RunOutcome::Paused;
        }
        let now = Utc::now();
        if let Some(last) = entity.last_execute_time {
            let elapsed = (now - last).to_std().unwrap_or_default();
            if elapsed < job.interval() {
                debug!(job = job.name(), "cron_job_not_due");
                return RunOutcome::NotDue;
            }
        }
        entity.last_execute_time = Some(now);
        if let Err(e) = table.insert_or_replace(&entity).await {
            error!(job = job.name(), error = %e, "cron_job_state_write_failed");
            return RunOutcome::Failed;
        }

        let started = Instant::now();
        let outcome = Self::execute(job).await;
        if started.elapsed() > job.interval() {
            warn!(job = job.name(), elapsed_ms = started.elapsed().as_millis() as u64, "cron_job_overran_interval");
        }
        outcome
    }

    async fn execute(job: &dyn CronJob) -> RunOutcome {
        CRON_RUNS_TOTAL.with_label_values(&[job.name()]).inc();
        match job.execute().await {
            Ok(()) => {
                debug!(job = job.name(), "cron_job_executed");
                RunOutcome::Executed
            }
            Err(e) => {
                CRON_FAILURES_TOTAL.with_label_values(&[job.name()]).inc();
                error!(job = job.name(), error = %e, "cron_job_failed");
                RunOutcome::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingJob {
        runs: AtomicUsize,
        exclusive: bool,
        fail: bool,
    }

    impl CountingJob {
        fn new(exclusive: bool, fail: bool) -> Self { Self { runs: AtomicUsize::new(0), exclusive, fail } }
    }

    #[async_trait]
    impl CronJob for CountingJob {
        fn name(&self) -> &str { "CountingJob" }

        fn interval(&self) -> Duration { Duration::from_secs(3600) }

        fn exclusive(&self) -> bool { self.exclusive }

        async fn execute(&self) -> anyhow::Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("boom");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn exclusive_job_waits_for_interval() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let scheduler = CronScheduler::new(ctx.clone());
        let job = CountingJob::new(true, false);
        assert_eq!(scheduler.run_once(&job).await, RunOutcome::Executed);
        assert_eq!(scheduler.run_once(&job).await, RunOutcome::NotDue);
        assert_eq!(job.runs.load(Ordering::SeqCst), 1);

        let mut state = ctx.storage.cron_jobs.retrieve("CountingJob", "CountingJob").await?.unwrap();
        assert!(state.last_execute_time.is_some());
        state.last_execute_time = Some(Utc::now() - chrono::Duration::hours(2));
        ctx.storage.cron_jobs.insert_or_replace(&state).await?;
        assert_eq!(scheduler.run_once(&job).await, RunOutcome::Executed);
        Ok(())
    }

    #[tokio::test]
    async fn paused_job_is_skipped() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let mut state = CronJobEntity::new("CountingJob");
        state.paused = true;
        ctx.storage.cron_jobs.insert(&state).await?;
        let scheduler = CronScheduler::new(ctx);
        let job = CountingJob::new(true, false);
        assert_eq!(scheduler.run_once(&job).await, RunOutcome::Paused);
        assert_eq!(job.runs.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn non_exclusive_job_always_runs() -> anyhow::Result<()> {
        let scheduler = CronScheduler::new(ManagementContext::in_memory());
        let job = CountingJob::new(false, true);
        assert_eq!(scheduler.run_once(&job).await, RunOutcome::Failed);
        assert_eq!(scheduler.run_once(&job).await, RunOutcome::Failed);
        assert_eq!(job.runs.load(Ordering::SeqCst), 2);
        Ok(())
    }
}
