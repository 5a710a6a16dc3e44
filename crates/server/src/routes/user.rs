use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use service::user::{UserInfo, DEFAULT_TOP_USERS};
use utoipa::IntoParams;

use crate::dto::{ResourceList, TopUser, User, UserSearchRequest};
use crate::errors::{ApiResult, JsonApiError};
use crate::routes::require_user;
use crate::state::AppState;

const MAX_SEARCH_RESULTS: usize = 30;

/// Store the profile an identity provider returned and issue its token.
#[utoipa::path(
    post,
    path = "/v2/login",
    tag = "user",
    request_body = UserInfo,
    responses((status = 200, description = "Logged in", body = User), (status = 400, description = "Bad Request", body = crate::errors::ErrorBody))
)]
pub async fn login(State(state): State<AppState>, Json(info): Json<UserInfo>) -> ApiResult<Json<User>> {
    if info.id.trim().is_empty() || info.token.as_deref().map_or(true, |t| t.trim().is_empty()) {
        return Err(JsonApiError::bad_request("id and token are required"));
    }
    let user = state.users.authing(info).await?;
    state.activity_logs.log_user_activity(user.user_id(), "login", None).await;
    Ok(Json(User::with_token(user)))
}

#[utoipa::path(
    get,
    path = "/v2/user/{user_id}",
    tag = "user",
    params(("user_id" = String, Path,)),
    responses((status = 200, description = "User profile", body = User), (status = 404, description = "Not Found", body = crate::errors::ErrorBody))
)]
pub async fn get_user(State(state): State<AppState>, Path(user_id): Path<String>) -> ApiResult<Json<User>> {
    let user = require_user(&state, &user_id).await?;
    Ok(Json(User::public(user)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct TopUsersQuery {
    pub top: Option<usize>,
}

#[utoipa::path(get, path = "/v2/user/topUsers", tag = "user", params(TopUsersQuery), responses((status = 200, description = "Ranked users")))]
pub async fn top_users(State(state): State<AppState>, Query(query): Query<TopUsersQuery>) -> ApiResult<Json<ResourceList<TopUser>>> {
    let top = query.top.unwrap_or(DEFAULT_TOP_USERS).clamp(1, 100);
    let mut value = Vec::new();
    for entry in state.users.list_top_users(Some(top)).await? {
        let user = state.users.get_user_by_id(&entry.user_id).await?.map(User::public);
        value.push(TopUser { rank: entry.rank(), user_id: entry.user_id, score: entry.score, user });
    }
    Ok(Json(ResourceList::single_page(value)))
}

#[utoipa::path(post, path = "/v2/user/search", tag = "user", request_body = UserSearchRequest, responses((status = 200, description = "Matching users")))]
pub async fn search(State(state): State<AppState>, Json(req): Json<UserSearchRequest>) -> ApiResult<Json<ResourceList<User>>> {
    let search = req.search.trim();
    if search.is_empty() {
        return Err(JsonApiError::bad_request("search must not be empty"));
    }
    let top = req.top.unwrap_or(MAX_SEARCH_RESULTS).clamp(1, MAX_SEARCH_RESULTS);
    let users = state.users.search_user(search, top).await?;
    Ok(Json(ResourceList::single_page(users.into_iter().map(User::public).collect())))
}
