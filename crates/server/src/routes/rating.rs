use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use chrono::Utc;
use models::entities::{HackathonEntity, RatingEntity, RatingKindEntity};
use service::pagination::Pagination;
use service::rating::{RatingKindRequest, RatingQueryOptions, RatingRequest};

use crate::auth::{is_hackathon_admin, load_hackathon, load_team, require_hackathon_admin, require_judge, require_writable, CurrentUser};
use crate::dto::{Rating, RatingKind, RatingPatch, RatingQuery, ResourceList};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

async fn load_kind(state: &AppState, hackathon: &HackathonEntity, kind_id: &str) -> ApiResult<RatingKindEntity> {
    state
        .ratings
        .get_rating_kind(hackathon.name(), kind_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("rating kind {kind_id} not found")))
}

async fn load_rating(state: &AppState, hackathon: &HackathonEntity, rating_id: &str) -> ApiResult<RatingEntity> {
    state
        .ratings
        .get_rating_by_id(hackathon.name(), rating_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("rating {rating_id} not found")))
}

/// Ratings are accepted only inside the judging window, when one is set.
fn check_judging_open(hackathon: &HackathonEntity) -> ApiResult<()> {
    let now = Utc::now();
    if hackathon.judge_start_time.is_some_and(|start| start > now) {
        return Err(JsonApiError::precondition_failed("judging has not started"));
    }
    if hackathon.judge_end_time.is_some_and(|end| end < now) {
        return Err(JsonApiError::precondition_failed("judging has ended"));
    }
    Ok(())
}

fn check_score(kind: &RatingKindEntity, score: Option<i32>) -> ApiResult<()> {
    match score {
        Some(s) if s < 0 || s > kind.maximum_score => {
            Err(JsonApiError::bad_request(format!("score must be between 0 and {}", kind.maximum_score)))
        }
        _ => Ok(()),
    }
}

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/ratingKind",
    tag = "rating",
    params(("name" = String, Path,)),
    request_body = RatingKindRequest,
    responses((status = 200, body = RatingKind), (status = 412, body = ErrorBody))
)]
pub async fn create_kind(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<RatingKindRequest>,
) -> ApiResult<Json<RatingKind>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if req.maximum_score.is_some_and(|m| m <= 0) {
        return Err(JsonApiError::bad_request("maximumScore must be positive"));
    }
    let kind = state.ratings.create_rating_kind(hackathon.name(), &req).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createRatingKind", Some(format!("kind {}", kind.name))).await;
    Ok(Json(kind.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/ratingKind/{kind_id}",
    tag = "rating",
    params(("name" = String, Path,), ("kind_id" = String, Path,)),
    request_body = RatingKindRequest,
    responses((status = 200, body = RatingKind), (status = 404, body = ErrorBody))
)]
pub async fn update_kind(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, kind_id)): Path<(String, String)>,
    Json(req): Json<RatingKindRequest>,
) -> ApiResult<Json<RatingKind>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if req.maximum_score.is_some_and(|m| m <= 0) {
        return Err(JsonApiError::bad_request("maximumScore must be positive"));
    }
    let kind = load_kind(&state, &hackathon, &kind_id).await?;
    Ok(Json(state.ratings.update_rating_kind(&kind, &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/ratingKind/{kind_id}",
    tag = "rating",
    params(("name" = String, Path,), ("kind_id" = String, Path,)),
    responses((status = 200, body = RatingKind), (status = 404, body = ErrorBody))
)]
pub async fn get_kind(State(state): State<AppState>, Path((name, kind_id)): Path<(String, String)>) -> ApiResult<Json<RatingKind>> {
    let hackathon = load_hackathon(&state, &name).await?;
    Ok(Json(load_kind(&state, &hackathon, &kind_id).await?.into()))
}

/// Kinds already used by a rating cannot be deleted.
#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/ratingKind/{kind_id}",
    tag = "rating",
    params(("name" = String, Path,), ("kind_id" = String, Path,)),
    responses((status = 204), (status = 412, body = ErrorBody))
)]
pub async fn delete_kind(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, kind_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let Some(kind) = state.ratings.get_rating_kind(hackathon.name(), &kind_id).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };
    let used = RatingQueryOptions { kind_id: Some(kind.id().to_string()), ..Default::default() };
    if state.ratings.is_rating_count_greater_than_zero(hackathon.name(), &used).await? {
        return Err(JsonApiError::precondition_failed(format!("rating kind {} is in use", kind.name)));
    }
    state.ratings.delete_rating_kind(hackathon.name(), kind.id()).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteRatingKind", Some(format!("kind {}", kind.name))).await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/ratingKinds", tag = "rating", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Rating kinds")))]
pub async fn list_kinds(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<RatingKind>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.ratings.list_paginated_rating_kinds(hackathon.name(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, RatingKind::from)))
}

/// A judge scores a team on one kind; scoring again overwrites the previous rating.
#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/rating",
    tag = "rating",
    params(("name" = String, Path,)),
    request_body = RatingRequest,
    responses((status = 200, body = Rating), (status = 400, body = ErrorBody), (status = 403, body = ErrorBody), (status = 412, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<RatingRequest>,
) -> ApiResult<Json<Rating>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    require_judge(&state, &hackathon, &user).await?;
    check_judging_open(&hackathon)?;
    let team = load_team(&state, &hackathon, &req.team_id).await?;
    let kind = load_kind(&state, &hackathon, &req.kind_id).await?;
    check_score(&kind, req.score)?;
    let rating = state.ratings.create_rating(hackathon.name(), &user.user_id, &req).await?;
    let message = Some(format!("team {} kind {} score {}", team.display_name, kind.name, rating.score));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createRating", message).await;
    Ok(Json(rating.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/rating/{rating_id}",
    tag = "rating",
    params(("name" = String, Path,), ("rating_id" = String, Path,)),
    request_body = RatingPatch,
    responses((status = 200, body = Rating), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, rating_id)): Path<(String, String)>,
    Json(req): Json<RatingPatch>,
) -> ApiResult<Json<Rating>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    check_judging_open(&hackathon)?;
    let rating = load_rating(&state, &hackathon, &rating_id).await?;
    if rating.judge_id != user.user_id {
        return Err(JsonApiError::forbidden("only the judge who gave a rating can change it"));
    }
    let kind = load_kind(&state, &hackathon, &rating.kind_id).await?;
    check_score(&kind, req.score)?;
    Ok(Json(state.ratings.update_rating(&rating, req.score, req.description).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/rating/{rating_id}",
    tag = "rating",
    params(("name" = String, Path,), ("rating_id" = String, Path,)),
    responses((status = 200, body = Rating), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, Path((name, rating_id)): Path<(String, String)>) -> ApiResult<Json<Rating>> {
    let hackathon = load_hackathon(&state, &name).await?;
    Ok(Json(load_rating(&state, &hackathon, &rating_id).await?.into()))
}

/// The judge who gave the rating or a hackathon administrator may delete it.
#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/rating/{rating_id}",
    tag = "rating",
    params(("name" = String, Path,), ("rating_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, rating_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    let Some(rating) = state.ratings.get_rating_by_id(hackathon.name(), &rating_id).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };
    if rating.judge_id != user.user_id && !is_hackathon_admin(&state, &hackathon, &user).await? {
        return Err(JsonApiError::forbidden("only the judge or an administrator can delete a rating"));
    }
    state.ratings.delete_rating(hackathon.name(), rating.id()).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteRating", None).await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/ratings", tag = "rating", params(("name" = String, Path,), RatingQuery), responses((status = 200, description = "Ratings")))]
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(query): Query<RatingQuery>,
) -> ApiResult<Json<ResourceList<Rating>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let options = RatingQueryOptions {
        pagination: Pagination { np: query.np, nr: query.nr, top: query.top },
        judge_id: query.judge_id,
        kind_id: query.kind_id,
        team_id: query.team_id,
    };
    let page = state.ratings.list_paginated_ratings(hackathon.name(), &options).await?;
    Ok(Json(ResourceList::from_page(&uri, page, Rating::from)))
}
