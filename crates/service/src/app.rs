//! Every management wired over one [`ManagementContext`].

use std::path::Path;
use std::sync::Arc;

use crate::activity_log::ActivityLogManagement;
use crate::announcement::AnnouncementManagement;
use crate::award::AwardManagement;
use crate::context::ManagementContext;
use crate::cron::{CacheRefreshJob, CleanupKubernetesJob, CronScheduler, RefreshTopUsersJob, ReportJob, ReportType};
use crate::enrollment::EnrollmentManagement;
use crate::experiment::ExperimentManagement;
use crate::github::{mock::MockGitHubClient, GitHubClient};
use crate::hackathon::HackathonManagement;
use crate::hackathon_admin::HackathonAdminManagement;
use crate::judge::JudgeManagement;
use crate::kubernetes::{mock::MockKubernetesCluster, KubernetesCluster, DEFAULT_NAMESPACE};
use crate::organizer::OrganizerManagement;
use crate::questionnaire::QuestionnaireManagement;
use crate::rating::RatingManagement;
use crate::team::TeamManagement;
use crate::template_repo::TemplateRepoManagement;
use crate::user::{TokenVerifier, UserManagement};

#[derive(Clone)]
pub struct Managements {
    pub ctx: ManagementContext,
    pub hackathons: HackathonManagement,
    pub admins: HackathonAdminManagement,
    pub enrollments: EnrollmentManagement,
    pub judges: JudgeManagement,
    pub teams: TeamManagement,
    pub ratings: RatingManagement,
    pub awards: AwardManagement,
    pub organizers: OrganizerManagement,
    pub announcements: AnnouncementManagement,
    pub questionnaires: QuestionnaireManagement,
    pub template_repos: TemplateRepoManagement,
    pub activity_logs: ActivityLogManagement,
    pub users: UserManagement,
    pub experiments: ExperimentManagement,
}

impl Managements {
    pub fn new(
        ctx: ManagementContext,
        github: Arc<dyn GitHubClient>,
        cluster: Arc<dyn KubernetesCluster>,
        namespace: impl Into<String>,
    ) -> Self {
        Self {
            hackathons: HackathonManagement::new(ctx.clone()),
            admins: HackathonAdminManagement::new(ctx.clone()),
            enrollments: EnrollmentManagement::new(ctx.clone()),
            judges: JudgeManagement::new(ctx.clone()),
            teams: TeamManagement::new(ctx.clone()),
            ratings: RatingManagement::new(ctx.clone()),
            awards: AwardManagement::new(ctx.clone()),
            organizers: OrganizerManagement::new(ctx.clone()),
            announcements: AnnouncementManagement::new(ctx.clone()),
            questionnaires: QuestionnaireManagement::new(ctx.clone()),
            template_repos: TemplateRepoManagement::new(ctx.clone(), github),
            activity_logs: ActivityLogManagement::new(ctx.clone()),
            users: UserManagement::new(ctx.clone()),
            experiments: ExperimentManagement::new(ctx.clone(), cluster, namespace),
            ctx,
        }
    }

    /// Memory storage with in-process GitHub and cluster doubles.
    pub fn in_memory() -> Self {
        Self::new(
            ManagementContext::in_memory(),
            Arc::new(MockGitHubClient::default()),
            Arc::new(MockKubernetesCluster::default()),
            DEFAULT_NAMESPACE,
        )
    }

    /// Key used to check tokens presented at login.
    pub fn with_token_verifier(mut self, verifier: TokenVerifier) -> Self {
        self.users = self.users.with_verifier(verifier);
        self
    }

    /// Scheduler holding the report, ranking, cleanup and cache jobs.
    pub fn cron_scheduler(&self, report_dir: impl AsRef<Path>) -> CronScheduler {
        let report_dir = report_dir.as_ref();
        CronScheduler::new(self.ctx.clone())
            .register(Arc::new(ReportJob::new(ReportType::Enrollments, self.ctx.clone(), report_dir)))
            .register(Arc::new(ReportJob::new(ReportType::Teams, self.ctx.clone(), report_dir)))
            .register(Arc::new(ReportJob::new(ReportType::TeamWorks, self.ctx.clone(), report_dir)))
            .register(Arc::new(RefreshTopUsersJob::new(self.ctx.clone())))
            .register(Arc::new(CleanupKubernetesJob::new(self.ctx.clone(), self.experiments.clone())))
            .register(Arc::new(CacheRefreshJob::new(self.ctx.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheduler_registers_all_jobs() {
        let names: Vec<String> =
            Managements::in_memory().cron_scheduler("data/reports").jobs().iter().map(|j| j.name().to_string()).collect();
        assert_eq!(
            names,
            [
                "EnrollmentReportJob",
                "TeamMemberReportJob",
                "TeamWorkReportJob",
                "RefreshTopUsersJob",
                "CleanupKubernetesJob",
                "CacheRefreshJob"
            ]
        );
    }
}
