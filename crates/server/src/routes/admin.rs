use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use models::entities::HackathonAdminEntity;
use service::pagination::{PagedResult, Pagination};

use crate::auth::{load_hackathon, require_hackathon_admin, require_platform_admin, require_writable, CurrentUser};
use crate::dto::{next_link, HackathonAdmin, ResourceList, User};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::routes::require_user;
use crate::state::AppState;

async fn with_users(state: &AppState, uri: &Uri, page: PagedResult<HackathonAdminEntity>) -> ApiResult<ResourceList<HackathonAdmin>> {
    let mut value = Vec::with_capacity(page.value.len());
    for admin in page.value {
        let user = state.users.get_user_by_id(&admin.row_key).await?.map(User::public);
        value.push(HackathonAdmin::new(admin, user));
    }
    let next_link = page.next_page.as_ref().and_then(|next| next_link(uri, next));
    Ok(ResourceList { value, next_link })
}

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/admin/{user_id}",
    tag = "admin",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = HackathonAdmin), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
) -> ApiResult<Json<HackathonAdmin>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let target = require_user(&state, &user_id).await?;
    let admin = state.admins.create_admin(hackathon.name(), target.user_id()).await?;
    let message = Some(format!("admin {}", target.display_name()));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createHackathonAdmin", message).await;
    Ok(Json(HackathonAdmin::new(admin, Some(User::public(target)))))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/admin/{user_id}",
    tag = "admin",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = HackathonAdmin), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, Path((name, user_id)): Path<(String, String)>) -> ApiResult<Json<HackathonAdmin>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let admin = state
        .admins
        .get_admin(hackathon.name(), &user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{user_id} is not an administrator of {name}")))?;
    let user = state.users.get_user_by_id(&user_id).await?.map(User::public);
    Ok(Json(HackathonAdmin::new(admin, user)))
}

/// The creator cannot be removed.
#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/admin/{user_id}",
    tag = "admin",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 204), (status = 412, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if hackathon.creator_id.eq_ignore_ascii_case(&user_id) {
        return Err(JsonApiError::precondition_failed("the creator of a hackathon cannot be removed"));
    }
    if state.admins.get_admin(hackathon.name(), &user_id).await?.is_some() {
        state.admins.delete_admin(hackathon.name(), &user_id).await?;
        let message = Some(format!("admin {user_id}"));
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteHackathonAdmin", message).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/admins", tag = "admin", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Administrators")))]
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<HackathonAdmin>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.admins.list_paginated_hackathon_admin(hackathon.name(), &pagination).await?;
    Ok(Json(with_users(&state, &uri, page).await?))
}

#[utoipa::path(put, path = "/v2/platform/admin/{user_id}", tag = "admin", params(("user_id" = String, Path,)), responses((status = 200, body = HackathonAdmin), (status = 403, body = ErrorBody)))]
pub async fn create_platform(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(user_id): Path<String>) -> ApiResult<Json<HackathonAdmin>> {
    require_platform_admin(&user)?;
    let target = require_user(&state, &user_id).await?;
    let admin = state.admins.create_platform_admin(target.user_id()).await?;
    state.activity_logs.log_user_activity(&user.user_id, "createPlatformAdmin", Some(format!("admin {}", target.user_id()))).await;
    Ok(Json(HackathonAdmin::new(admin, Some(User::public(target)))))
}

#[utoipa::path(delete, path = "/v2/platform/admin/{user_id}", tag = "admin", params(("user_id" = String, Path,)), responses((status = 204), (status = 403, body = ErrorBody)))]
pub async fn delete_platform(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(user_id): Path<String>) -> ApiResult<StatusCode> {
    require_platform_admin(&user)?;
    state.admins.delete_platform_admin(&user_id).await?;
    state.activity_logs.log_user_activity(&user.user_id, "deletePlatformAdmin", Some(format!("admin {user_id}"))).await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/platform/admins", tag = "admin", params(Pagination), responses((status = 200, description = "Platform administrators")))]
pub async fn list_platform(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<HackathonAdmin>>> {
    require_platform_admin(&user)?;
    let page = state.admins.list_paginated_platform_admins(&pagination).await?;
    Ok(Json(with_users(&state, &uri, page).await?))
}
