use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use service::pagination::Pagination;

use crate::auth::{load_hackathon, require_hackathon_admin, require_writable, CurrentUser};
use crate::dto::{Judge, JudgeRequest, ResourceList};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::routes::require_user;
use crate::state::AppState;

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/judge/{user_id}",
    tag = "judge",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    request_body = JudgeRequest,
    responses((status = 200, body = Judge), (status = 404, body = ErrorBody), (status = 412, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
    Json(req): Json<JudgeRequest>,
) -> ApiResult<Json<Judge>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let target = require_user(&state, &user_id).await?;
    let judge = match state.judges.get_judge(hackathon.name(), target.user_id()).await? {
        Some(existing) => state.judges.update_judge(&existing, req.description).await?,
        None => {
            let created = state.judges.create_judge(hackathon.name(), target.user_id(), req.description).await?;
            let message = Some(format!("judge {}", target.display_name()));
            state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createJudge", message).await;
            created
        }
    };
    Ok(Json(judge.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/judge/{user_id}",
    tag = "judge",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    request_body = JudgeRequest,
    responses((status = 200, body = Judge), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
    Json(req): Json<JudgeRequest>,
) -> ApiResult<Json<Judge>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let existing = state
        .judges
        .get_judge(hackathon.name(), &user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{user_id} is not a judge of {}", hackathon.name())))?;
    Ok(Json(state.judges.update_judge(&existing, req.description).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/judge/{user_id}",
    tag = "judge",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = Judge), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, Path((name, user_id)): Path<(String, String)>) -> ApiResult<Json<Judge>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let judge = state
        .judges
        .get_judge(hackathon.name(), &user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{user_id} is not a judge of {}", hackathon.name())))?;
    Ok(Json(judge.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/judge/{user_id}",
    tag = "judge",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if state.judges.get_judge(hackathon.name(), &user_id).await?.is_some() {
        state.judges.delete_judge(hackathon.name(), &user_id).await?;
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteJudge", Some(format!("judge {user_id}"))).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/judges", tag = "judge", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Judges")))]
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<Judge>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.judges.list_paginated_judges(hackathon.name(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, Judge::from)))
}
