use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use models::entities::{HackathonEntity, HackathonStatus};
use serde::Deserialize;
use service::hackathon::{HackathonManagement, HackathonQueryOptions, HackathonRequest};
use service::pagination::PagedResult;
use utoipa::{IntoParams, ToSchema};

use crate::auth::{load_hackathon, require_hackathon_admin, require_platform_admin, require_writable, CurrentUser, MaybeUser};
use crate::dto::{Hackathon, NameAvailability, ResourceList, SearchQuery};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

async fn with_roles(state: &AppState, hackathon: HackathonEntity, user_id: Option<&str>) -> ApiResult<Json<Hackathon>> {
    let roles = state.hackathons.get_hackathon_roles(&hackathon, user_id).await?;
    Ok(Json(Hackathon::new(hackathon, roles)))
}

#[utoipa::path(get, path = "/v2/hackathons", tag = "hackathon", params(SearchQuery), responses((status = 200, description = "Hackathons with the caller's roles")))]
pub async fn list(
    State(state): State<AppState>,
    user: MaybeUser,
    uri: Uri,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Json<ResourceList<Hackathon>>> {
    let options = HackathonQueryOptions {
        pagination: query.pagination(),
        search: query.search.clone(),
        user_id: user.user_id().map(str::to_string),
        list_type: query.list_type.unwrap_or_default(),
        order_by: query.order_by.unwrap_or_default(),
    };
    let page = state.hackathons.list_paginated_hackathons(&options).await?;
    let rows = state.hackathons.list_hackathon_roles(page.value, user.user_id()).await?;
    let page = PagedResult { value: rows, next_page: page.next_page };
    Ok(Json(ResourceList::from_page(&uri, page, |(h, roles)| Hackathon::new(h, roles))))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct NameCheckRequest {
    pub name: String,
}

#[utoipa::path(post, path = "/v2/hackathon/checkNameAvailability", tag = "hackathon", request_body = NameCheckRequest, responses((status = 200, body = NameAvailability)))]
pub async fn check_name_availability(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(req): Json<NameCheckRequest>,
) -> ApiResult<Json<NameAvailability>> {
    let name = req.name.to_lowercase();
    if !HackathonManagement::is_valid_name(&name) {
        return Ok(Json(NameAvailability {
            name: req.name,
            name_available: false,
            reason: Some("Invalid".into()),
            message: Some("name may only contain lowercase letters, digits and '-', up to 100 characters".into()),
        }));
    }
    let available = state.hackathons.check_name_availability(&name).await?;
    Ok(Json(NameAvailability {
        name: req.name,
        name_available: available,
        reason: (!available).then(|| "AlreadyExists".to_string()),
        message: (!available).then(|| "the name is already in use".to_string()),
    }))
}

/// Create the hackathon, or update it when the caller administers an existing one.
#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}",
    tag = "hackathon",
    params(("name" = String, Path,)),
    request_body = HackathonRequest,
    responses(
        (status = 200, body = Hackathon),
        (status = 400, body = ErrorBody),
        (status = 409, body = ErrorBody),
        (status = 412, body = ErrorBody)
    )
)]
pub async fn create_or_update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(mut req): Json<HackathonRequest>,
) -> ApiResult<Json<Hackathon>> {
    req.name = name.to_lowercase();
    if let Some(existing) = state.hackathons.get_hackathon_entity_by_name(&req.name).await? {
        require_hackathon_admin(&state, &existing, &user).await?;
        require_writable(&existing)?;
        let updated = state.hackathons.update_hackathon(&req).await?;
        state.activity_logs.log_hackathon_activity(updated.name(), &user.user_id, "updateHackathon", None).await;
        return with_roles(&state, updated, Some(&user.user_id)).await;
    }
    if !HackathonManagement::is_valid_name(&req.name) {
        return Err(JsonApiError::bad_request(format!("invalid hackathon name: {name}")));
    }
    if !state.hackathons.check_name_availability(&req.name).await? {
        return Err(JsonApiError::conflict(format!("hackathon {name} already exists")));
    }
    if !user.is_platform_admin && !state.hackathons.can_create_hackathon(&user.user_id).await? {
        return Err(JsonApiError::precondition_failed("too many hackathons created recently"));
    }
    let created = state.hackathons.create_hackathon(&req, &user.user_id).await?;
    state.activity_logs.log_hackathon_activity(created.name(), &user.user_id, "createHackathon", None).await;
    with_roles(&state, created, Some(&user.user_id)).await
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}",
    tag = "hackathon",
    params(("name" = String, Path,)),
    request_body = HackathonRequest,
    responses((status = 200, body = Hackathon), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(mut req): Json<HackathonRequest>,
) -> ApiResult<Json<Hackathon>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    req.name = hackathon.name().to_string();
    let updated = state.hackathons.update_hackathon(&req).await?;
    state.activity_logs.log_hackathon_activity(updated.name(), &user.user_id, "updateHackathon", None).await;
    with_roles(&state, updated, Some(&user.user_id)).await
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}",
    tag = "hackathon",
    params(("name" = String, Path,)),
    responses((status = 200, body = Hackathon), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, user: MaybeUser, Path(name): Path<String>) -> ApiResult<Json<Hackathon>> {
    let hackathon = load_hackathon(&state, &name).await?;
    with_roles(&state, hackathon, user.user_id()).await
}

#[utoipa::path(delete, path = "/v2/hackathon/{name}", tag = "hackathon", params(("name" = String, Path,)), responses((status = 204), (status = 403, body = ErrorBody)))]
pub async fn delete(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(name): Path<String>) -> ApiResult<StatusCode> {
    let Some(hackathon) = state.hackathons.get_hackathon_entity_by_name(&name).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };
    require_hackathon_admin(&state, &hackathon, &user).await?;
    state.hackathons.delete_hackathon_logically(hackathon.name()).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteHackathon", None).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Ask platform administrators to take the hackathon online.
#[utoipa::path(post, path = "/v2/hackathon/{name}/requestPublish", tag = "hackathon", params(("name" = String, Path,)), responses((status = 200, body = Hackathon), (status = 412, body = ErrorBody)))]
pub async fn request_publish(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(name): Path<String>) -> ApiResult<Json<Hackathon>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if hackathon.status == HackathonStatus::Online {
        return Err(JsonApiError::precondition_failed(format!("hackathon {} is already online", hackathon.name())));
    }
    let updated = state.hackathons.request_publish(&hackathon).await?;
    state.activity_logs.log_hackathon_activity(updated.name(), &user.user_id, "requestPublish", None).await;
    with_roles(&state, updated, Some(&user.user_id)).await
}

#[utoipa::path(post, path = "/v2/hackathon/{name}/publish", tag = "hackathon", params(("name" = String, Path,)), responses((status = 200, body = Hackathon), (status = 403, body = ErrorBody)))]
pub async fn publish(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(name): Path<String>) -> ApiResult<Json<Hackathon>> {
    require_platform_admin(&user)?;
    let hackathon = load_hackathon(&state, &name).await?;
    let updated = state.hackathons.publish(&hackathon).await?;
    state.activity_logs.log_hackathon_activity(updated.name(), &user.user_id, "publish", None).await;
    with_roles(&state, updated, Some(&user.user_id)).await
}

#[derive(Debug, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct ReadOnlyQuery {
    pub read_only: bool,
}

#[utoipa::path(post, path = "/v2/hackathon/{name}/updateReadonly", tag = "hackathon", params(("name" = String, Path,), ReadOnlyQuery), responses((status = 200, body = Hackathon), (status = 403, body = ErrorBody)))]
pub async fn update_read_only(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Query(query): Query<ReadOnlyQuery>,
) -> ApiResult<Json<Hackathon>> {
    require_platform_admin(&user)?;
    let hackathon = load_hackathon(&state, &name).await?;
    let updated = state.hackathons.update_hackathon_read_only(&hackathon, query.read_only).await?;
    let message = Some(format!("readOnly={}", query.read_only));
    state.activity_logs.log_hackathon_activity(updated.name(), &user.user_id, "updateReadonly", message).await;
    with_roles(&state, updated, Some(&user.user_id)).await
}
