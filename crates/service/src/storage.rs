//! Typed tables over one [`TableStore`] backend.

use std::sync::Arc;

use models::entities::*;
use models::{MemoryTableStore, Table, TableStore};

pub struct StorageContext {
    store: Arc<dyn TableStore>,
    pub hackathons: Table<HackathonEntity>,
    pub hackathon_admins: Table<HackathonAdminEntity>,
    pub enrollments: Table<EnrollmentEntity>,
    pub judges: Table<JudgeEntity>,
    pub teams: Table<TeamEntity>,
    pub team_members: Table<TeamMemberEntity>,
    pub team_works: Table<TeamWorkEntity>,
    pub awards: Table<AwardEntity>,
    pub award_assignments: Table<AwardAssignmentEntity>,
    pub rating_kinds: Table<RatingKindEntity>,
    pub ratings: Table<RatingEntity>,
    pub organizers: Table<OrganizerEntity>,
    pub announcements: Table<AnnouncementEntity>,
    pub questionnaires: Table<QuestionnaireEntity>,
    pub template_repos: Table<TemplateRepoEntity>,
    pub templates: Table<TemplateEntity>,
    pub experiments: Table<ExperimentEntity>,
    pub activity_logs: Table<ActivityLogEntity>,
    pub users: Table<UserEntity>,
    pub user_tokens: Table<UserTokenEntity>,
    pub top_users: Table<TopUserEntity>,
    pub cron_jobs: Table<CronJobEntity>,
}

impl StorageContext {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            hackathons: Table::new(store.clone()),
            hackathon_admins: Table::new(store.clone()),
            enrollments: Table::new(store.clone()),
            judges: Table::new(store.clone()),
            teams: Table::new(store.clone()),
            team_members: Table::new(store.clone()),
            team_works: Table::new(store.clone()),
            awards: Table::new(store.clone()),
            award_assignments: Table::new(store.clone()),
            rating_kinds: Table::new(store.clone()),
            ratings: Table::new(store.clone()),
            organizers: Table::new(store.clone()),
            announcements: Table::new(store.clone()),
            questionnaires: Table::new(store.clone()),
            template_repos: Table::new(store.clone()),
            templates: Table::new(store.clone()),
            experiments: Table::new(store.clone()),
            activity_logs: Table::new(store.clone()),
            users: Table::new(store.clone()),
            user_tokens: Table::new(store.clone()),
            top_users: Table::new(store.clone()),
            cron_jobs: Table::new(store.clone()),
            store,
        }
    }

    pub fn in_memory() -> Self { Self::new(Arc::new(MemoryTableStore::new())) }

    pub fn store(&self) -> &Arc<dyn TableStore> { &self.store }
}
