//! CSV reports per hackathon, written under `{report_dir}/{hackathon}/{type}.csv`.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use models::entities::{HackathonEntity, UserEntity};
use models::query::partition_key_filter;
use serde::Serialize;
use tracing::{info, warn};

use super::CronJob;
use crate::context::ManagementContext;
use crate::hackathon::HackathonManagement;
use crate::user::UserManagement;

const REPORT_INTERVAL: Duration = Duration::from_secs(18 * 3600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportType {
    Enrollments,
    Teams,
    TeamWorks,
}

impl ReportType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Enrollments => "enrollments",
            Self::Teams => "teams",
            Self::TeamWorks => "teamWorks",
        }
    }

    fn job_name(&self) -> &'static str {
        match self {
            Self::Enrollments => "EnrollmentReportJob",
            Self::Teams => "TeamMemberReportJob",
            Self::TeamWorks => "TeamWorkReportJob",
        }
    }

    fn header(&self) -> &'static [&'static str] {
        match self {
            Self::Enrollments => &[
                "UserId", "UserName", "Nickname", "FamilyName", "MiddleName", "GivenName", "Email", "Phone", "Gender",
                "HackathonName", "HackathonDisplayName", "EnrollmentId", "EnrollmentStatus", "Extensions",
            ],
            Self::Teams => &[
                "HackathonName", "HackathonDisplayName", "TeamId", "TeamName", "TeamDescription", "TeamAutoApprove",
                "TeamCreatorId", "TeamCreatorUserName", "TeamMemberCount", "MemberId", "MemberUserName",
                "MemberNickname", "MemberFamilyName", "MemberMiddleName", "MemberGivenName", "MemberEmail",
                "MemberPhone", "MemberGender", "MemberDescription", "MemberRole", "MemberStatus",
            ],
            Self::TeamWorks => &[
                "HackathonName", "HackathonDisplayName", "TeamId", "TeamName", "TeamDescription", "TeamAutoApprove",
                "TeamCreatorId", "TeamCreatorUserName", "TeamMemberCount", "WorkId", "WorkTitle", "WorkDescription",
                "WorkType", "WorkUrl",
            ],
        }
    }
}

/// Read-only hackathons get no report. Otherwise a hackathon is reported until
/// 30 days after its end, or, without an end date, while online and younger than a year.
pub fn is_eligible_for_report(hackathon: &HackathonEntity, now: DateTime<Utc>) -> bool {
    if hackathon.read_only {
        return false;
    }
    match hackathon.event_end_time {
        Some(end) => end + chrono::Duration::days(30) > now,
        None => hackathon.is_online() && hackathon.created_at + chrono::Duration::days(365) > now,
    }
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
struct EnrollmentRecord<'a> {
    user_id: &'a str,
    user_name: &'a str,
    nickname: &'a str,
    family_name: &'a str,
    middle_name: &'a str,
    given_name: &'a str,
    email: &'a str,
    phone: &'a str,
    gender: &'a str,
    hackathon_name: &'a str,
    hackathon_display_name: &'a str,
    enrollment_id: &'a str,
    enrollment_status: &'a str,
    extensions: String,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TeamMemberRecord<'a> {
    hackathon_name: &'a str,
    hackathon_display_name: &'a str,
    team_id: &'a str,
    team_name: &'a str,
    team_description: &'a str,
    team_auto_approve: bool,
    team_creator_id: &'a str,
    team_creator_user_name: &'a str,
    team_member_count: i32,
    member_id: &'a str,
    member_user_name: &'a str,
    member_nickname: &'a str,
    member_family_name: &'a str,
    member_middle_name: &'a str,
    member_given_name: &'a str,
    member_email: &'a str,
    member_phone: &'a str,
    member_gender: &'a str,
    member_description: &'a str,
    member_role: &'a str,
    member_status: &'a str,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
struct TeamWorkRecord<'a> {
    hackathon_name: &'a str,
    hackathon_display_name: &'a str,
    team_id: &'a str,
    team_name: &'a str,
    team_description: &'a str,
    team_auto_approve: bool,
    team_creator_id: &'a str,
    team_creator_user_name: &'a str,
    team_member_count: i32,
    work_id: &'a str,
    work_title: &'a str,
    work_description: &'a str,
    work_type: &'a str,
    work_url: &'a str,
}

fn opt(value: &Option<String>) -> &str { value.as_deref().unwrap_or_default() }

fn user_name(user: &UserEntity) -> &str { user.username.as_deref().or(user.name.as_deref()).unwrap_or_default() }

fn csv_writer() -> csv::Writer<Vec<u8>> {
    csv::WriterBuilder::new().has_headers(false).terminator(csv::Terminator::CRLF).from_writer(Vec::new())
}

fn into_string(writer: csv::Writer<Vec<u8>>) -> anyhow::Result<String> {
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("csv flush failed: {}", e.error()))?;
    Ok(String::from_utf8(bytes)?)
}

pub struct ReportJob {
    report_type: ReportType,
    ctx: ManagementContext,
    hackathons: HackathonManagement,
    users: UserManagement,
    report_dir: PathBuf,
}

impl ReportJob {
    pub fn new(report_type: ReportType, ctx: ManagementContext, report_dir: impl Into<PathBuf>) -> Self {
        Self {
            report_type,
            hackathons: HackathonManagement::new(ctx.clone()),
            users: UserManagement::new(ctx.clone()),
            ctx,
            report_dir: report_dir.into(),
        }
    }

    pub fn report_path(&self, hackathon_name: &str) -> PathBuf {
        self.report_dir.join(hackathon_name).join(format!("{}.csv", self.report_type.as_str()))
    }

    /// Render the report of one hackathon. Rows whose user is unknown are left out.
    pub async fn generate(&self, hackathon: &HackathonEntity) -> anyhow::Result<String> {
        let mut out = csv_writer();
        out.write_record(self.report_type.header())?;
        let filter = partition_key_filter(hackathon.name());
        match self.report_type {
            ReportType::Enrollments => {
                for enrollment in self.ctx.storage.enrollments.query_entities(Some(&filter)).await? {
                    let Some(user) = self.users.get_user_by_id(enrollment.user_id()).await? else {
                        continue;
                    };
                    out.serialize(EnrollmentRecord {
                        user_id: user.user_id(),
                        user_name: opt(&user.username),
                        nickname: opt(&user.nickname),
                        family_name: opt(&user.family_name),
                        middle_name: opt(&user.middle_name),
                        given_name: opt(&user.given_name),
                        email: opt(&user.email),
                        phone: opt(&user.phone),
                        gender: opt(&user.gender),
                        hackathon_name: hackathon.name(),
                        hackathon_display_name: &hackathon.display_name,
                        enrollment_id: &enrollment.row_key,
                        enrollment_status: enrollment.status.as_str(),
                        extensions: serde_json::to_string(&enrollment.extensions)?,
                    })?;
                }
            }
            ReportType::Teams => {
                let teams = self.ctx.storage.teams.query_entities(Some(&filter)).await?;
                for member in self.ctx.storage.team_members.query_entities(Some(&filter)).await? {
                    let Some(team) = teams.iter().find(|t| t.id() == member.team_id) else { continue };
                    let Some(user) = self.users.get_user_by_id(member.user_id()).await? else { continue };
                    let Some(creator) = self.users.get_user_by_id(&team.creator_id).await? else { continue };
                    out.serialize(TeamMemberRecord {
                        hackathon_name: hackathon.name(),
                        hackathon_display_name: &hackathon.display_name,
                        team_id: team.id(),
                        team_name: &team.display_name,
                        team_description: opt(&team.description),
                        team_auto_approve: team.auto_approve,
                        team_creator_id: creator.user_id(),
                        team_creator_user_name: user_name(&creator),
                        team_member_count: team.members_count,
                        member_id: member.user_id(),
                        member_user_name: user_name(&user),
                        member_nickname: opt(&user.nickname),
                        member_family_name: opt(&user.family_name),
                        member_middle_name: opt(&user.middle_name),
                        member_given_name: opt(&user.given_name),
                        member_email: opt(&user.email),
                        member_phone: opt(&user.phone),
                        member_gender: opt(&user.gender),
                        member_description: opt(&member.description),
                        member_role: member.role.as_str(),
                        member_status: member.status.as_str(),
                    })?;
                }
            }
            ReportType::TeamWorks => {
                let teams = self.ctx.storage.teams.query_entities(Some(&filter)).await?;
                for work in self.ctx.storage.team_works.query_entities(Some(&filter)).await? {
                    let Some(team) = teams.iter().find(|t| t.id() == work.team_id) else { continue };
                    let Some(creator) = self.users.get_user_by_id(&team.creator_id).await? else { continue };
                    out.serialize(TeamWorkRecord {
                        hackathon_name: hackathon.name(),
                        hackathon_display_name: &hackathon.display_name,
                        team_id: team.id(),
                        team_name: &team.display_name,
                        team_description: opt(&team.description),
                        team_auto_approve: team.auto_approve,
                        team_creator_id: creator.user_id(),
                        team_creator_user_name: user_name(&creator),
                        team_member_count: team.members_count,
                        work_id: work.id(),
                        work_title: &work.title,
                        work_description: opt(&work.description),
                        work_type: work.work_type.as_str(),
                        work_url: &work.url,
                    })?;
                }
            }
        }
        into_string(out)
    }

    async fn write_report(&self, hackathon: &HackathonEntity) -> anyhow::Result<bool> {
        let path = self.report_path(hackathon.name());
        let exists = tokio::fs::try_exists(&path).await.unwrap_or(false);
        if exists && !is_eligible_for_report(hackathon, Utc::now()) {
            return Ok(false);
        }
        let report = self.generate(hackathon).await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, report).await?;
        Ok(true)
    }
}

#[async_trait]
impl CronJob for ReportJob {
    fn name(&self) -> &str { self.report_type.job_name() }

    fn interval(&self) -> Duration { REPORT_INTERVAL }

    async fn execute(&self) -> anyhow::Result<()> {
        let hackathons = self.hackathons.list_all_hackathons().await?;
        let mut written = 0;
        for hackathon in hackathons.values().filter(|h| !h.is_deleted) {
            match self.write_report(hackathon).await {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(hackathon = %hackathon.name(), report = self.report_type.as_str(), error = %e, "report_failed")
                }
            }
        }
        info!(report = self.report_type.as_str(), written, "reports_generated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hackathon::HackathonRequest;
    use crate::team::{TeamManagement, TeamRequest};
    use crate::user::UserInfo;
    use models::entities::HackathonStatus;

    fn temp_dir() -> PathBuf { std::env::temp_dir().join(format!("reports-{}", uuid::Uuid::new_v4())) }

    #[test]
    fn eligibility_rules() {
        let now = Utc::now();
        let mut h = HackathonEntity { created_at: now, status: HackathonStatus::Online, ..Default::default() };
        assert!(is_eligible_for_report(&h, now));
        h.read_only = true;
        assert!(!is_eligible_for_report(&h, now));
        h.read_only = false;
        h.event_end_time = Some(now - chrono::Duration::days(31));
        assert!(!is_eligible_for_report(&h, now));
        h.event_end_time = Some(now - chrono::Duration::days(10));
        assert!(is_eligible_for_report(&h, now));
        h.event_end_time = None;
        h.created_at = now - chrono::Duration::days(400);
        assert!(!is_eligible_for_report(&h, now));
        h.created_at = now;
        h.status = HackathonStatus::Planning;
        assert!(!is_eligible_for_report(&h, now));
    }

    #[test]
    fn record_fields_follow_report_headers() -> anyhow::Result<()> {
        fn header_of<T: Serialize>(record: T) -> anyhow::Result<String> {
            let mut w = csv::Writer::from_writer(Vec::new());
            w.serialize(record)?;
            let text = into_string(w)?;
            Ok(text.lines().next().unwrap_or_default().to_string())
        }
        assert_eq!(header_of(EnrollmentRecord::default())?, ReportType::Enrollments.header().join(","));
        assert_eq!(header_of(TeamMemberRecord::default())?, ReportType::Teams.header().join(","));
        assert_eq!(header_of(TeamWorkRecord::default())?, ReportType::TeamWorks.header().join(","));
        Ok(())
    }

    #[test]
    fn csv_fields_are_quoted() -> anyhow::Result<()> {
        let mut w = csv_writer();
        w.write_record(["a", "b,c", "say \"hi\""])?;
        assert_eq!(into_string(w)?, "a,\"b,c\",\"say \"\"hi\"\"\"\r\n");
        Ok(())
    }

    #[tokio::test]
    async fn team_report_is_written() -> anyhow::Result<()> {
        let ctx = ManagementContext::in_memory();
        let users = UserManagement::new(ctx.clone());
        users.authing(UserInfo { id: "alice".into(), username: Some("alice_u".into()), ..Default::default() }).await?;
        let hackathons = HackathonManagement::new(ctx.clone());
        let hackathon = hackathons
            .create_hackathon(&HackathonRequest { name: "hack".into(), display_name: Some("Hack".into()), ..Default::default() }, "alice")
            .await?;
        let teams = TeamManagement::new(ctx.clone());
        teams.create_team("hack", &TeamRequest { display_name: Some("Team, One".into()), ..Default::default() }, "alice").await?;

        let dir = temp_dir();
        let job = ReportJob::new(ReportType::Teams, ctx, &dir);
        let csv = job.generate(&hackathon).await?;
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("HackathonName,HackathonDisplayName,TeamId"));
        assert!(lines[1].contains("\"Team, One\""));
        assert!(lines[1].contains("alice_u"));

        job.execute().await?;
        assert!(tokio::fs::try_exists(job.report_path("hack")).await?);
        tokio::fs::remove_dir_all(&dir).await?;
        Ok(())
    }
}
