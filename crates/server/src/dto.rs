//! JSON shapes of the `/v2` API.

use std::collections::BTreeMap;

use axum::http::Uri;
use chrono::{DateTime, Utc};
use models::entities::*;
use serde::{Deserialize, Serialize};
use service::experiment::{ExperimentContext, TemplateContext};
use service::hackathon::HackathonRoles;
use service::kubernetes::{ExperimentRuntime, ResourceStatus};
use service::pagination::{PagedResult, Pagination};
use utoipa::{IntoParams, ToSchema};

/// One page of a listing. `nextLink` repeats the request with the next `np`, `nr` and `top`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList<T> {
    pub value: Vec<T>,
    pub next_link: Option<String>,
}

impl<T> ResourceList<T> {
    pub fn from_page<E>(uri: &Uri, page: PagedResult<E>, f: impl FnMut(E) -> T) -> Self {
        let next_link = page.next_page.as_ref().and_then(|next| next_link(uri, next));
        Self { value: page.value.into_iter().map(f).collect(), next_link }
    }

    pub fn single_page(value: Vec<T>) -> Self { Self { value, next_link: None } }
}

/// Request path and query with the paging parameters replaced by `next`.
pub fn next_link(uri: &Uri, next: &Pagination) -> Option<String> {
    let mut url = reqwest::Url::parse(&format!("http://localhost{uri}")).ok()?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| !matches!(k.as_ref(), "np" | "nr" | "top"))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    {
        let mut query = url.query_pairs_mut();
        query.clear();
        query.extend_pairs(kept);
        if let Some(np) = &next.np {
            query.append_pair("np", np);
        }
        if let Some(nr) = &next.nr {
            query.append_pair("nr", nr);
        }
        if let Some(top) = next.top {
            query.append_pair("top", &top.to_string());
        }
    }
    Some(format!("{}?{}", url.path(), url.query().unwrap_or_default()))
}

fn updated_at(timestamp: Option<DateTime<Utc>>, created_at: DateTime<Utc>) -> DateTime<Utc> { timestamp.unwrap_or(created_at) }

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct SearchQuery {
    pub search: Option<String>,
    pub list_type: Option<service::hackathon::HackathonListType>,
    pub order_by: Option<service::hackathon::HackathonOrderBy>,
    pub np: Option<String>,
    pub nr: Option<String>,
    pub top: Option<usize>,
}

impl SearchQuery {
    pub fn pagination(&self) -> Pagination { Pagination { np: self.np.clone(), nr: self.nr.clone(), top: self.top } }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NameAvailability {
    pub name: String,
    pub name_available: bool,
    pub reason: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Hackathon {
    pub name: String,
    pub display_name: String,
    pub ribbon: Option<String>,
    pub summary: Option<String>,
    pub detail: Option<String>,
    pub location: Option<String>,
    pub banners: Option<Vec<PictureInfo>>,
    pub status: HackathonStatus,
    pub max_enrollment: i32,
    pub auto_approve: bool,
    pub read_only: bool,
    pub tags: Option<Vec<String>>,
    pub creator_id: String,
    pub enrollment: i32,
    pub event_start_time: Option<DateTime<Utc>>,
    pub event_end_time: Option<DateTime<Utc>>,
    pub enrollment_start_time: Option<DateTime<Utc>>,
    pub enrollment_end_time: Option<DateTime<Utc>>,
    pub judge_start_time: Option<DateTime<Utc>>,
    pub judge_end_time: Option<DateTime<Utc>>,
    pub roles: Option<HackathonRoles>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Hackathon {
    pub fn new(h: HackathonEntity, roles: Option<HackathonRoles>) -> Self {
        Self {
            updated_at: updated_at(h.timestamp, h.created_at),
            name: h.partition_key,
            display_name: h.display_name,
            ribbon: h.ribbon,
            summary: h.summary,
            detail: h.detail,
            location: h.location,
            banners: h.banners,
            status: h.status,
            max_enrollment: h.max_enrollment,
            auto_approve: h.auto_approve,
            read_only: h.read_only,
            tags: h.tags,
            creator_id: h.creator_id,
            enrollment: h.enrollment,
            event_start_time: h.event_start_time,
            event_end_time: h.event_end_time,
            enrollment_start_time: h.enrollment_start_time,
            enrollment_end_time: h.enrollment_end_time,
            judge_start_time: h.judge_start_time,
            judge_end_time: h.judge_end_time,
            roles,
            created_at: h.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: Option<String>,
    pub nickname: Option<String>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub middle_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub gender: Option<String>,
    pub photo: Option<String>,
    pub company: Option<String>,
    pub country: Option<String>,
    pub province: Option<String>,
    pub city: Option<String>,
    pub token: Option<String>,
    pub token_expired_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Profile without the login token.
    pub fn public(u: UserEntity) -> Self {
        let mut user = Self::with_token(u);
        user.token = None;
        user.token_expired_at = None;
        user
    }

    pub fn with_token(u: UserEntity) -> Self {
        Self {
            id: u.partition_key,
            username: u.username,
            nickname: u.nickname,
            name: u.name,
            given_name: u.given_name,
            family_name: u.family_name,
            middle_name: u.middle_name,
            email: u.email,
            phone: u.phone,
            gender: u.gender,
            photo: u.photo,
            company: u.company,
            country: u.country,
            province: u.province,
            city: u.city,
            token: u.token,
            token_expired_at: u.token_expired_at,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TopUser {
    pub rank: i32,
    pub user_id: String,
    pub score: i32,
    pub user: Option<User>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserSearchRequest {
    pub search: String,
    pub top: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HackathonAdmin {
    pub hackathon_name: String,
    pub user_id: String,
    pub user: Option<User>,
    pub created_at: DateTime<Utc>,
}

impl HackathonAdmin {
    pub fn new(a: HackathonAdminEntity, user: Option<User>) -> Self {
        Self { hackathon_name: a.partition_key, user_id: a.row_key, user, created_at: a.created_at }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub extensions: Option<Vec<Extension>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub hackathon_name: String,
    pub user_id: String,
    pub status: EnrollmentStatus,
    pub extensions: Option<Vec<Extension>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<EnrollmentEntity> for Enrollment {
    fn from(e: EnrollmentEntity) -> Self {
        Self {
            updated_at: updated_at(e.timestamp, e.created_at),
            hackathon_name: e.partition_key,
            user_id: e.row_key,
            status: e.status,
            extensions: e.extensions,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct EnrollmentQuery {
    pub status: Option<EnrollmentStatus>,
    pub np: Option<String>,
    pub nr: Option<String>,
    pub top: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JudgeRequest {
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Judge {
    pub hackathon_name: String,
    pub user_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<JudgeEntity> for Judge {
    fn from(j: JudgeEntity) -> Self {
        Self { hackathon_name: j.partition_key, user_id: j.row_key, description: j.description, created_at: j.created_at }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub hackathon_name: String,
    pub id: String,
    pub display_name: String,
    pub description: Option<String>,
    pub auto_approve: bool,
    pub creator_id: String,
    pub members_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<TeamEntity> for Team {
    fn from(t: TeamEntity) -> Self {
        Self {
            updated_at: updated_at(t.timestamp, t.created_at),
            hackathon_name: t.partition_key,
            id: t.row_key,
            display_name: t.display_name,
            description: t.description,
            auto_approve: t.auto_approve,
            creator_id: t.creator_id,
            members_count: t.members_count,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamMemberRequest {
    pub description: Option<String>,
    pub role: Option<TeamMemberRole>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamMember {
    pub hackathon_name: String,
    pub team_id: String,
    pub user_id: String,
    pub description: Option<String>,
    pub role: TeamMemberRole,
    pub status: TeamMemberStatus,
    pub created_at: DateTime<Utc>,
}

impl From<TeamMemberEntity> for TeamMember {
    fn from(m: TeamMemberEntity) -> Self {
        Self {
            hackathon_name: m.partition_key,
            team_id: m.team_id,
            user_id: m.row_key,
            description: m.description,
            role: m.role,
            status: m.status,
            created_at: m.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, IntoParams)]
pub struct TeamMemberQuery {
    pub status: Option<TeamMemberStatus>,
    pub role: Option<TeamMemberRole>,
    pub np: Option<String>,
    pub nr: Option<String>,
    pub top: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TeamWork {
    pub hackathon_name: String,
    pub team_id: String,
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub work_type: TeamWorkType,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

impl From<TeamWorkEntity> for TeamWork {
    fn from(w: TeamWorkEntity) -> Self {
        Self {
            hackathon_name: w.partition_key,
            team_id: w.team_id,
            id: w.row_key,
            title: w.title,
            description: w.description,
            work_type: w.work_type,
            url: w.url,
            created_at: w.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Award {
    pub hackathon_name: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub quantity: i32,
    pub target: AwardTarget,
    pub pictures: Option<Vec<PictureInfo>>,
    pub created_at: DateTime<Utc>,
}

impl From<AwardEntity> for Award {
    fn from(a: AwardEntity) -> Self {
        Self {
            hackathon_name: a.partition_key,
            id: a.row_key,
            name: a.name,
            description: a.description,
            quantity: a.quantity,
            target: a.target,
            pictures: a.pictures,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardAssignmentRequest {
    pub assignee_id: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AwardAssignment {
    pub hackathon_name: String,
    pub assignment_id: String,
    pub award_id: String,
    pub assignee_id: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<AwardAssignmentEntity> for AwardAssignment {
    fn from(a: AwardAssignmentEntity) -> Self {
        Self {
            hackathon_name: a.partition_key,
            assignment_id: a.row_key,
            award_id: a.award_id,
            assignee_id: a.assignee_id,
            description: a.description,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingKind {
    pub hackathon_name: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub maximum_score: i32,
    pub created_at: DateTime<Utc>,
}

impl From<RatingKindEntity> for RatingKind {
    fn from(k: RatingKindEntity) -> Self {
        Self {
            hackathon_name: k.partition_key,
            id: k.row_key,
            name: k.name,
            description: k.description,
            maximum_score: k.maximum_score,
            created_at: k.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rating {
    pub hackathon_name: String,
    pub id: String,
    pub judge_id: String,
    pub team_id: String,
    pub kind_id: String,
    pub score: i32,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<RatingEntity> for Rating {
    fn from(r: RatingEntity) -> Self {
        Self {
            updated_at: updated_at(r.timestamp, r.created_at),
            hackathon_name: r.partition_key,
            id: r.row_key,
            judge_id: r.judge_id,
            team_id: r.team_id,
            kind_id: r.kind_id,
            score: r.score,
            description: r.description,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RatingPatch {
    pub score: Option<i32>,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct RatingQuery {
    pub judge_id: Option<String>,
    pub kind_id: Option<String>,
    pub team_id: Option<String>,
    pub np: Option<String>,
    pub nr: Option<String>,
    pub top: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Organizer {
    pub hackathon_name: String,
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub organizer_type: OrganizerType,
    pub logo: Option<PictureInfo>,
    pub created_at: DateTime<Utc>,
}

impl From<OrganizerEntity> for Organizer {
    fn from(o: OrganizerEntity) -> Self {
        Self {
            hackathon_name: o.partition_key,
            id: o.row_key,
            name: o.name,
            description: o.description,
            organizer_type: o.organizer_type,
            logo: o.logo,
            created_at: o.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub hackathon_name: String,
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<AnnouncementEntity> for Announcement {
    fn from(a: AnnouncementEntity) -> Self {
        Self {
            updated_at: updated_at(a.timestamp, a.created_at),
            hackathon_name: a.partition_key,
            id: a.row_key,
            title: a.title,
            content: a.content,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Questionnaire {
    pub hackathon_name: String,
    pub extensions: Vec<Extension>,
}

impl From<QuestionnaireEntity> for Questionnaire {
    fn from(q: QuestionnaireEntity) -> Self { Self { hackathon_name: q.partition_key, extensions: q.extensions } }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TemplateRepo {
    pub hackathon_name: String,
    pub id: String,
    pub url: String,
    pub is_fetched: bool,
    pub repo_languages: Option<BTreeMap<String, u64>>,
    pub repo_topics: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
}

impl From<TemplateRepoEntity> for TemplateRepo {
    fn from(t: TemplateRepoEntity) -> Self {
        Self {
            hackathon_name: t.partition_key,
            id: t.row_key,
            url: t.url,
            is_fetched: t.is_fetched,
            repo_languages: t.repo_languages,
            repo_topics: t.repo_topics,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ActivityLog {
    pub activity_id: String,
    pub category: ActivityLogCategory,
    pub hackathon_name: Option<String>,
    pub user_id: Option<String>,
    pub correlated_user_id: Option<String>,
    pub activity_log_type: String,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<ActivityLogEntity> for ActivityLog {
    fn from(a: ActivityLogEntity) -> Self {
        Self {
            activity_id: a.row_key,
            category: a.category,
            hackathon_name: a.hackathon_name,
            user_id: a.user_id,
            correlated_user_id: a.correlated_user_id,
            activity_log_type: a.activity_log_type,
            message: a.message,
            created_at: a.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub hackathon_name: String,
    pub id: String,
    pub display_name: String,
    pub image: String,
    pub commands: Vec<String>,
    pub environment_variables: BTreeMap<String, String>,
    pub ingress_protocol: IngressProtocol,
    pub ingress_port: i32,
    pub vnc: Option<VncSettings>,
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
}

impl From<TemplateContext> for Template {
    fn from(ctx: TemplateContext) -> Self {
        let t = ctx.template;
        Self {
            hackathon_name: t.partition_key,
            id: t.row_key,
            display_name: t.display_name,
            image: t.image,
            commands: t.commands,
            environment_variables: t.environment_variables,
            ingress_protocol: t.ingress_protocol,
            ingress_port: t.ingress_port,
            vnc: t.vnc,
            status: ctx.status,
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExperimentRequest {
    pub template_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub hackathon_name: String,
    pub id: String,
    pub template_id: String,
    pub user_id: String,
    pub paused: bool,
    pub status: ResourceStatus,
    pub runtime: Option<ExperimentRuntime>,
    pub created_at: DateTime<Utc>,
}

impl From<ExperimentContext> for Experiment {
    fn from(ctx: ExperimentContext) -> Self {
        let e = ctx.experiment;
        Self {
            hackathon_name: e.partition_key,
            id: e.row_key,
            template_id: e.template_id,
            user_id: e.user_id,
            paused: e.paused,
            status: ctx.status,
            runtime: ctx.runtime,
            created_at: e.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_link_replaces_paging_parameters() {
        let uri: Uri = "/v2/hackathons?search=rust&np=0&top=5".parse().unwrap();
        let next = Pagination { np: Some("5".into()), nr: Some("5".into()), top: Some(5) };
        assert_eq!(next_link(&uri, &next).unwrap(), "/v2/hackathons?search=rust&np=5&nr=5&top=5");
    }

    #[test]
    fn list_without_next_page_has_no_link() {
        let uri: Uri = "/v2/hackathon/h/judges".parse().unwrap();
        let page = PagedResult { value: vec![1, 2], next_page: None };
        let list = ResourceList::from_page(&uri, page, |v: i32| v * 10);
        assert_eq!(list.value, vec![10, 20]);
        let json = serde_json::to_value(&list).unwrap();
        assert!(json["nextLink"].is_null());
    }
}
