use axum::{
    http::StatusCode,
    middleware,
    routing::{get, post, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnFailure, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::auth::resolve_user;
use crate::errors::{ApiResult, JsonApiError};
use crate::state::AppState;

pub mod activity_log;
pub mod admin;
pub mod award;
pub mod enrollment;
pub mod experiment;
pub mod hackathon;
pub mod judge;
pub mod organizer;
pub mod rating;
pub mod team;
pub mod template_repo;
pub mod user;

#[utoipa::path(get, path = "/health", tag = "health", responses((status = 200, description = "OK", body = crate::dto::HealthResponse)))]
pub async fn health() -> Json<crate::dto::HealthResponse> {
    Json(crate::dto::HealthResponse { status: "ok".into() })
}

pub async fn metrics() -> (StatusCode, String) { common::metrics::encode_metrics() }

/// 404 unless `user_id` names a known user.
pub(crate) async fn require_user(state: &AppState, user_id: &str) -> ApiResult<models::entities::UserEntity> {
    state
        .users
        .get_user_by_id(user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("user {user_id} not found")))
}

/// Build the `/v2` API with authentication, CORS and request tracing.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let h = "/v2/hackathon/:name";
    let team = "/v2/hackathon/:name/team/:team_id";
    let award = "/v2/hackathon/:name/award/:award_id";

    let api = Router::new()
        // users
        .route("/v2/login", post(user::login))
        .route("/v2/user/topUsers", get(user::top_users))
        .route("/v2/user/search", post(user::search))
        .route("/v2/user/:user_id", get(user::get_user))
        .route("/v2/user/:user_id/activityLogs", get(activity_log::list_user_logs))
        // hackathons
        .route("/v2/hackathons", get(hackathon::list))
        .route("/v2/hackathon/checkNameAvailability", post(hackathon::check_name_availability))
        .route(h, put(hackathon::create_or_update).patch(hackathon::update).get(hackathon::get).delete(hackathon::delete))
        .route(&format!("{h}/requestPublish"), post(hackathon::request_publish))
        .route(&format!("{h}/publish"), post(hackathon::publish))
        .route(&format!("{h}/updateReadonly"), post(hackathon::update_read_only))
        .route(&format!("{h}/activityLogs"), get(activity_log::list_hackathon_logs))
        // admins
        .route(&format!("{h}/admins"), get(admin::list))
        .route(&format!("{h}/admin/:user_id"), put(admin::create).get(admin::get).delete(admin::delete))
        .route("/v2/platform/admins", get(admin::list_platform))
        .route("/v2/platform/admin/:user_id", put(admin::create_platform).delete(admin::delete_platform))
        // enrollments
        .route(&format!("{h}/enrollment"), put(enrollment::enroll).patch(enrollment::update).get(enrollment::get_mine))
        .route(&format!("{h}/enrollment/:user_id"), get(enrollment::get))
        .route(&format!("{h}/enrollment/:user_id/approve"), post(enrollment::approve))
        .route(&format!("{h}/enrollment/:user_id/reject"), post(enrollment::reject))
        .route(&format!("{h}/enrollments"), get(enrollment::list))
        // judges
        .route(&format!("{h}/judge/:user_id"), put(judge::create).patch(judge::update).get(judge::get).delete(judge::delete))
        .route(&format!("{h}/judges"), get(judge::list))
        // teams
        .route(&format!("{h}/team"), put(team::create))
        .route(&format!("{h}/team/checkNameAvailability"), post(team::check_name_availability))
        .route(&format!("{h}/teams"), get(team::list))
        .route(team, get(team::get).patch(team::update).delete(team::delete))
        .route(&format!("{team}/member"), put(team::join).patch(team::update_mine).delete(team::leave))
        .route(&format!("{team}/member/:user_id"), put(team::add_member).get(team::get_member).delete(team::delete_member))
        .route(&format!("{team}/member/:user_id/approve"), post(team::approve_member))
        .route(&format!("{team}/member/:user_id/updateRole"), post(team::update_member_role))
        .route(&format!("{team}/members"), get(team::list_members))
        .route(&format!("{team}/work"), put(team::create_work))
        .route(&format!("{team}/work/:work_id"), get(team::get_work).patch(team::update_work).delete(team::delete_work))
        .route(&format!("{team}/works"), get(team::list_works))
        .route(&format!("{team}/assignments"), get(award::list_team_assignments))
        // awards
        .route(&format!("{h}/award"), put(award::create))
        .route(&format!("{h}/awards"), get(award::list))
        .route(award, get(award::get).patch(award::update).delete(award::delete))
        .route(&format!("{award}/assignment"), put(award::assign))
        .route(&format!("{award}/assignment/:assignment_id"), get(award::get_assignment).patch(award::update_assignment).delete(award::delete_assignment))
        .route(&format!("{award}/assignments"), get(award::list_award_assignments))
        .route(&format!("{h}/assignments"), get(award::list_assignments))
        // ratings
        .route(&format!("{h}/ratingKind"), put(rating::create_kind))
        .route(&format!("{h}/ratingKind/:kind_id"), get(rating::get_kind).patch(rating::update_kind).delete(rating::delete_kind))
        .route(&format!("{h}/ratingKinds"), get(rating::list_kinds))
        .route(&format!("{h}/rating"), put(rating::create))
        .route(&format!("{h}/rating/:rating_id"), get(rating::get).patch(rating::update).delete(rating::delete))
        .route(&format!("{h}/ratings"), get(rating::list))
        // organizers, announcements, questionnaire
        .route(&format!("{h}/organizer"), put(organizer::create))
        .route(&format!("{h}/organizer/:organizer_id"), get(organizer::get).patch(organizer::update).delete(organizer::delete))
        .route(&format!("{h}/organizers"), get(organizer::list))
        .route(&format!("{h}/announcement"), put(organizer::create_announcement))
        .route(
            &format!("{h}/announcement/:announcement_id"),
            get(organizer::get_announcement).patch(organizer::update_announcement).delete(organizer::delete_announcement),
        )
        .route(&format!("{h}/announcements"), get(organizer::list_announcements))
        .route(
            &format!("{h}/questionnaire"),
            put(organizer::create_questionnaire)
                .patch(organizer::update_questionnaire)
                .get(organizer::get_questionnaire)
                .delete(organizer::delete_questionnaire),
        )
        // template repos
        .route(&format!("{h}/templateRepo"), put(template_repo::create))
        .route(&format!("{h}/templateRepo/:repo_id"), get(template_repo::get).patch(template_repo::update).delete(template_repo::delete))
        .route(&format!("{h}/templateRepos"), get(template_repo::list))
        // templates and experiments
        .route(&format!("{h}/template"), put(experiment::create_template))
        .route(
            &format!("{h}/template/:template_id"),
            get(experiment::get_template).patch(experiment::update_template).delete(experiment::delete_template),
        )
        .route(&format!("{h}/templates"), get(experiment::list_templates))
        .route(&format!("{h}/experiment"), put(experiment::create))
        .route(&format!("{h}/experiment/:experiment_id"), get(experiment::get).delete(experiment::delete))
        .route(&format!("{h}/experiment/:experiment_id/reset"), post(experiment::reset))
        .route(&format!("{h}/experiments"), get(experiment::list))
        .route_layer(middleware::from_fn_with_state(state.clone(), resolve_user));

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .merge(api)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO).include_headers(false))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
                .on_failure(DefaultOnFailure::new().level(Level::ERROR)),
        )
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request};
    use service::app::Managements;
    use tower::ServiceExt;

    use super::*;

    fn router() -> Router {
        build_router(AppState::new(Managements::in_memory()), CorsLayer::very_permissive())
    }

    #[tokio::test]
    async fn health_is_public() -> anyhow::Result<()> {
        let res = router().oneshot(Request::get("/health").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::OK);
        Ok(())
    }

    #[tokio::test]
    async fn unknown_token_cannot_create_hackathon() -> anyhow::Result<()> {
        let req = Request::put("/v2/hackathon/demo")
            .header(header::AUTHORIZATION, "token unknown")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{}"))?;
        let res = router().oneshot(req).await?;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn missing_user_is_not_found() -> anyhow::Result<()> {
        let res = router().oneshot(Request::get("/v2/user/nobody").body(Body::empty())?).await?;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        Ok(())
    }
}
