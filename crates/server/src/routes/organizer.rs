use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use models::entities::Extension;
use serde::{Deserialize, Serialize};
use service::announcement::AnnouncementRequest;
use service::organizer::OrganizerRequest;
use service::pagination::Pagination;
use utoipa::ToSchema;

use crate::auth::{load_hackathon, require_hackathon_admin, require_writable, CurrentUser};
use crate::dto::{Announcement, Organizer, Questionnaire, ResourceList};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/organizer",
    tag = "organizer",
    params(("name" = String, Path,)),
    request_body = OrganizerRequest,
    responses((status = 200, body = Organizer), (status = 400, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<OrganizerRequest>,
) -> ApiResult<Json<Organizer>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if req.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        return Err(JsonApiError::bad_request("organizer name is required"));
    }
    let organizer = state.organizers.create_organizer(hackathon.name(), &req).await?;
    let message = Some(format!("organizer {}", organizer.name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createOrganizer", message).await;
    Ok(Json(organizer.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/organizer/{organizer_id}",
    tag = "organizer",
    params(("name" = String, Path,), ("organizer_id" = String, Path,)),
    request_body = OrganizerRequest,
    responses((status = 200, body = Organizer), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, organizer_id)): Path<(String, String)>,
    Json(req): Json<OrganizerRequest>,
) -> ApiResult<Json<Organizer>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let organizer = state
        .organizers
        .get_organizer(hackathon.name(), &organizer_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("organizer {organizer_id} not found")))?;
    Ok(Json(state.organizers.update_organizer(&organizer, &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/organizer/{organizer_id}",
    tag = "organizer",
    params(("name" = String, Path,), ("organizer_id" = String, Path,)),
    responses((status = 200, body = Organizer), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, Path((name, organizer_id)): Path<(String, String)>) -> ApiResult<Json<Organizer>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let organizer = state
        .organizers
        .get_organizer(hackathon.name(), &organizer_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("organizer {organizer_id} not found")))?;
    Ok(Json(organizer.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/organizer/{organizer_id}",
    tag = "organizer",
    params(("name" = String, Path,), ("organizer_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, organizer_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if let Some(organizer) = state.organizers.get_organizer(hackathon.name(), &organizer_id).await? {
        state.organizers.delete_organizer(hackathon.name(), organizer.id()).await?;
        let message = Some(format!("organizer {}", organizer.name));
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteOrganizer", message).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/organizers", tag = "organizer", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Organizers")))]
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<Organizer>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.organizers.list_paginated_organizers(hackathon.name(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, Organizer::from)))
}

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/announcement",
    tag = "announcement",
    params(("name" = String, Path,)),
    request_body = AnnouncementRequest,
    responses((status = 200, body = Announcement), (status = 400, body = ErrorBody))
)]
pub async fn create_announcement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<Json<Announcement>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if req.title.as_deref().map_or(true, |t| t.trim().is_empty()) {
        return Err(JsonApiError::bad_request("announcement title is required"));
    }
    let announcement = state.announcements.create_announcement(hackathon.name(), &req).await?;
    let message = Some(format!("announcement {}", announcement.title));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createAnnouncement", message).await;
    Ok(Json(announcement.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/announcement/{announcement_id}",
    tag = "announcement",
    params(("name" = String, Path,), ("announcement_id" = String, Path,)),
    request_body = AnnouncementRequest,
    responses((status = 200, body = Announcement), (status = 404, body = ErrorBody))
)]
pub async fn update_announcement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, announcement_id)): Path<(String, String)>,
    Json(req): Json<AnnouncementRequest>,
) -> ApiResult<Json<Announcement>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let announcement = state
        .announcements
        .get_announcement(hackathon.name(), &announcement_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("announcement {announcement_id} not found")))?;
    Ok(Json(state.announcements.update_announcement(&announcement, &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/announcement/{announcement_id}",
    tag = "announcement",
    params(("name" = String, Path,), ("announcement_id" = String, Path,)),
    responses((status = 200, body = Announcement), (status = 404, body = ErrorBody))
)]
pub async fn get_announcement(
    State(state): State<AppState>,
    Path((name, announcement_id)): Path<(String, String)>,
) -> ApiResult<Json<Announcement>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let announcement = state
        .announcements
        .get_announcement(hackathon.name(), &announcement_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("announcement {announcement_id} not found")))?;
    Ok(Json(announcement.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/announcement/{announcement_id}",
    tag = "announcement",
    params(("name" = String, Path,), ("announcement_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete_announcement(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, announcement_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if state.announcements.get_announcement(hackathon.name(), &announcement_id).await?.is_some() {
        state.announcements.delete_announcement(hackathon.name(), &announcement_id).await?;
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteAnnouncement", None).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/announcements", tag = "announcement", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Announcements")))]
pub async fn list_announcements(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<Announcement>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.announcements.list_paginated_announcements(hackathon.name(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, Announcement::from)))
}

#[derive(Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct QuestionnaireRequest {
    #[serde(default)]
    pub extensions: Vec<Extension>,
}

/// One questionnaire per hackathon; creating it twice is a conflict.
#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/questionnaire",
    tag = "questionnaire",
    params(("name" = String, Path,)),
    request_body = QuestionnaireRequest,
    responses((status = 200, body = Questionnaire), (status = 409, body = ErrorBody))
)]
pub async fn create_questionnaire(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<QuestionnaireRequest>,
) -> ApiResult<Json<Questionnaire>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if state.questionnaires.get_questionnaire(hackathon.name()).await?.is_some() {
        return Err(JsonApiError::conflict(format!("questionnaire of {} already exists", hackathon.name())));
    }
    let questionnaire = state.questionnaires.create_questionnaire(hackathon.name(), req.extensions).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createQuestionnaire", None).await;
    Ok(Json(questionnaire.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/questionnaire",
    tag = "questionnaire",
    params(("name" = String, Path,)),
    request_body = QuestionnaireRequest,
    responses((status = 200, body = Questionnaire), (status = 404, body = ErrorBody))
)]
pub async fn update_questionnaire(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<QuestionnaireRequest>,
) -> ApiResult<Json<Questionnaire>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let existing = state
        .questionnaires
        .get_questionnaire(hackathon.name())
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("questionnaire of {} not found", hackathon.name())))?;
    Ok(Json(state.questionnaires.update_questionnaire(&existing, req.extensions).await?.into()))
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/questionnaire", tag = "questionnaire", params(("name" = String, Path,)), responses((status = 200, body = Questionnaire), (status = 404, body = ErrorBody)))]
pub async fn get_questionnaire(State(state): State<AppState>, Path(name): Path<String>) -> ApiResult<Json<Questionnaire>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let questionnaire = state
        .questionnaires
        .get_questionnaire(hackathon.name())
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("questionnaire of {} not found", hackathon.name())))?;
    Ok(Json(questionnaire.into()))
}

#[utoipa::path(delete, path = "/v2/hackathon/{name}/questionnaire", tag = "questionnaire", params(("name" = String, Path,)), responses((status = 204), (status = 403, body = ErrorBody)))]
pub async fn delete_questionnaire(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    state.questionnaires.delete_questionnaire(hackathon.name()).await?;
    Ok(StatusCode::NO_CONTENT)
}
