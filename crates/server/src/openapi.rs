use utoipa::OpenApi;

use crate::dto;
use crate::errors::ErrorBody;

#[derive(OpenApi)]
#[openapi(
    info(title = "Open Hackathon Platform API", version = "2.0.0"),
    paths(
        crate::routes::health,
        crate::routes::activity_log::list_hackathon_logs,
        crate::routes::activity_log::list_user_logs,
        crate::routes::admin::create,
        crate::routes::admin::get,
        crate::routes::admin::delete,
        crate::routes::admin::list,
        crate::routes::admin::create_platform,
        crate::routes::admin::delete_platform,
        crate::routes::admin::list_platform,
        crate::routes::award::create,
        crate::routes::award::update,
        crate::routes::award::get,
        crate::routes::award::delete,
        crate::routes::award::list,
        crate::routes::award::assign,
        crate::routes::award::update_assignment,
        crate::routes::award::get_assignment,
        crate::routes::award::delete_assignment,
        crate::routes::award::list_award_assignments,
        crate::routes::award::list_assignments,
        crate::routes::award::list_team_assignments,
        crate::routes::enrollment::enroll,
        crate::routes::enrollment::update,
        crate::routes::enrollment::get_mine,
        crate::routes::enrollment::get,
        crate::routes::enrollment::approve,
        crate::routes::enrollment::reject,
        crate::routes::enrollment::list,
        crate::routes::experiment::create_template,
        crate::routes::experiment::update_template,
        crate::routes::experiment::get_template,
        crate::routes::experiment::delete_template,
        crate::routes::experiment::list_templates,
        crate::routes::experiment::create,
        crate::routes::experiment::get,
        crate::routes::experiment::delete,
        crate::routes::experiment::reset,
        crate::routes::experiment::list,
        crate::routes::hackathon::list,
        crate::routes::hackathon::check_name_availability,
        crate::routes::hackathon::create_or_update,
        crate::routes::hackathon::update,
        crate::routes::hackathon::get,
        crate::routes::hackathon::delete,
        crate::routes::hackathon::request_publish,
        crate::routes::hackathon::publish,
        crate::routes::hackathon::update_read_only,
        crate::routes::judge::create,
        crate::routes::judge::update,
        crate::routes::judge::get,
        crate::routes::judge::delete,
        crate::routes::judge::list,
        crate::routes::organizer::create,
        crate::routes::organizer::update,
        crate::routes::organizer::get,
        crate::routes::organizer::delete,
        crate::routes::organizer::list,
        crate::routes::organizer::create_announcement,
        crate::routes::organizer::update_announcement,
        crate::routes::organizer::get_announcement,
        crate::routes::organizer::delete_announcement,
        crate::routes::organizer::list_announcements,
        crate::routes::organizer::create_questionnaire,
        crate::routes::organizer::update_questionnaire,
        crate::routes::organizer::get_questionnaire,
        crate::routes::organizer::delete_questionnaire,
        crate::routes::rating::create_kind,
        crate::routes::rating::update_kind,
        crate::routes::rating::get_kind,
        crate::routes::rating::delete_kind,
        crate::routes::rating::list_kinds,
        crate::routes::rating::create,
        crate::routes::rating::update,
        crate::routes::rating::get,
        crate::routes::rating::delete,
        crate::routes::rating::list,
        crate::routes::team::create,
        crate::routes::team::check_name_availability,
        crate::routes::team::update,
        crate::routes::team::get,
        crate::routes::team::delete,
        crate::routes::team::list,
        crate::routes::team::join,
        crate::routes::team::update_mine,
        crate::routes::team::leave,
        crate::routes::team::add_member,
        crate::routes::team::get_member,
        crate::routes::team::delete_member,
        crate::routes::team::approve_member,
        crate::routes::team::update_member_role,
        crate::routes::team::list_members,
        crate::routes::team::create_work,
        crate::routes::team::update_work,
        crate::routes::team::get_work,
        crate::routes::team::delete_work,
        crate::routes::team::list_works,
        crate::routes::template_repo::create,
        crate::routes::template_repo::update,
        crate::routes::template_repo::get,
        crate::routes::template_repo::delete,
        crate::routes::template_repo::list,
        crate::routes::user::login,
        crate::routes::user::get_user,
        crate::routes::user::top_users,
        crate::routes::user::search,
    ),
    components(
        schemas(
            ErrorBody,
            dto::HealthResponse,
            dto::NameAvailability,
            dto::Hackathon,
            dto::User,
            dto::TopUser,
            dto::UserSearchRequest,
            dto::HackathonAdmin,
            dto::EnrollmentRequest,
            dto::Enrollment,
            dto::JudgeRequest,
            dto::Judge,
            dto::Team,
            dto::TeamMemberRequest,
            dto::TeamMember,
            dto::TeamWork,
            dto::Award,
            dto::AwardAssignmentRequest,
            dto::AwardAssignment,
            dto::RatingKind,
            dto::Rating,
            dto::RatingPatch,
            dto::Organizer,
            dto::Announcement,
            dto::Questionnaire,
            dto::TemplateRepo,
            dto::ActivityLog,
            dto::Template,
            dto::ExperimentRequest,
            dto::Experiment,
            crate::routes::hackathon::NameCheckRequest,
            crate::routes::organizer::QuestionnaireRequest,
            service::hackathon::HackathonRequest,
            service::hackathon::HackathonRoles,
            service::hackathon::HackathonListType,
            service::hackathon::HackathonOrderBy,
            service::user::UserInfo,
            service::team::TeamRequest,
            service::team::TeamWorkRequest,
            service::award::AwardRequest,
            service::rating::RatingKindRequest,
            service::rating::RatingRequest,
            service::organizer::OrganizerRequest,
            service::announcement::AnnouncementRequest,
            service::template_repo::TemplateRepoRequest,
            service::experiment::TemplateRequest,
            service::kubernetes::ResourceStatus,
            service::kubernetes::ExperimentRuntime,
            service::pagination::Pagination,
            models::entities::HackathonStatus,
            models::entities::EnrollmentStatus,
            models::entities::TeamMemberRole,
            models::entities::TeamMemberStatus,
            models::entities::TeamWorkType,
            models::entities::AwardTarget,
            models::entities::OrganizerType,
            models::entities::ActivityLogCategory,
            models::entities::IngressProtocol,
            models::entities::VncSettings,
            models::entities::PictureInfo,
            models::entities::Extension,
            models::entities::Identity,
        )
    ),
    tags(
        (name = "health"),
        (name = "user"),
        (name = "hackathon"),
        (name = "admin"),
        (name = "enrollment"),
        (name = "judge"),
        (name = "team"),
        (name = "award"),
        (name = "rating"),
        (name = "organizer"),
        (name = "announcement"),
        (name = "questionnaire"),
        (name = "templateRepo"),
        (name = "activityLog"),
        (name = "experiment")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_hackathon_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/v2/hackathon/{name}"));
        assert!(doc.paths.paths.contains_key("/v2/hackathon/{name}/team/{team_id}/member/{user_id}/approve"));
        let schemas = doc.components.map(|c| c.schemas).unwrap_or_default();
        assert!(schemas.contains_key("Hackathon"));
        assert!(schemas.contains_key("ErrorBody"));
    }
}
