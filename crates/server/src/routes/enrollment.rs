use axum::{
    extract::{Path, Query, State},
    http::Uri,
    Json,
};
use chrono::Utc;
use models::entities::{EnrollmentStatus, HackathonEntity};
use service::pagination::Pagination;
use service::user::UserClaims;

use crate::auth::{load_hackathon, require_hackathon_admin, require_writable, CurrentUser};
use crate::dto::{Enrollment, EnrollmentQuery, EnrollmentRequest, ResourceList};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

/// Enrollment must be open and the hackathon not full.
fn check_enrollment_open(hackathon: &HackathonEntity) -> ApiResult<()> {
    let now = Utc::now();
    if hackathon.enrollment_start_time.is_some_and(|start| start > now) {
        return Err(JsonApiError::precondition_failed("enrollment has not started"));
    }
    if hackathon.enrollment_end_time.is_some_and(|end| end < now) {
        return Err(JsonApiError::precondition_failed("enrollment has ended"));
    }
    if hackathon.max_enrollment > 0 && hackathon.enrollment >= hackathon.max_enrollment {
        return Err(JsonApiError::precondition_failed(format!("hackathon {} is full", hackathon.name())));
    }
    Ok(())
}

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/enrollment",
    tag = "enrollment",
    params(("name" = String, Path,)),
    request_body = EnrollmentRequest,
    responses((status = 200, body = Enrollment), (status = 412, body = ErrorBody))
)]
pub async fn enroll(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<EnrollmentRequest>,
) -> ApiResult<Json<Enrollment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    if let Some(existing) = state.enrollments.get_enrollment(hackathon.name(), &user.user_id).await? {
        let updated = state.enrollments.update_enrollment(&existing, req.extensions).await?;
        return Ok(Json(updated.into()));
    }
    check_enrollment_open(&hackathon)?;
    let created = state.enrollments.create_enrollment(&hackathon, &user.user_id, req.extensions).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "enrollmentCreated", None).await;
    Ok(Json(created.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/enrollment",
    tag = "enrollment",
    params(("name" = String, Path,)),
    request_body = EnrollmentRequest,
    responses((status = 200, body = Enrollment), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<EnrollmentRequest>,
) -> ApiResult<Json<Enrollment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    let existing = state
        .enrollments
        .get_enrollment(hackathon.name(), &user.user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{} has not enrolled in {}", user.user_id, hackathon.name())))?;
    let updated = state.enrollments.update_enrollment(&existing, req.extensions).await?;
    Ok(Json(updated.into()))
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/enrollment", tag = "enrollment", params(("name" = String, Path,)), responses((status = 200, body = Enrollment), (status = 404, body = ErrorBody)))]
pub async fn get_mine(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(name): Path<String>) -> ApiResult<Json<Enrollment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let enrollment = state
        .enrollments
        .get_enrollment(hackathon.name(), &user.user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{} has not enrolled in {}", user.user_id, hackathon.name())))?;
    Ok(Json(enrollment.into()))
}

/// Visible to the enrolled user and to administrators.
#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/enrollment/{user_id}",
    tag = "enrollment",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = Enrollment), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
) -> ApiResult<Json<Enrollment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    if !user.user_id.eq_ignore_ascii_case(&user_id) {
        require_hackathon_admin(&state, &hackathon, &user).await?;
    }
    let enrollment = state
        .enrollments
        .get_enrollment(hackathon.name(), &user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{user_id} has not enrolled in {}", hackathon.name())))?;
    Ok(Json(enrollment.into()))
}

async fn set_status(state: &AppState, user: &UserClaims, name: &str, user_id: &str, status: EnrollmentStatus) -> ApiResult<Json<Enrollment>> {
    let hackathon = load_hackathon(state, name).await?;
    require_hackathon_admin(state, &hackathon, user).await?;
    require_writable(&hackathon)?;
    let enrollment = state
        .enrollments
        .get_enrollment(hackathon.name(), user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{user_id} has not enrolled in {}", hackathon.name())))?;
    let updated = state.enrollments.update_enrollment_status(&hackathon, &enrollment, status).await?;
    let log_type = match status {
        EnrollmentStatus::Approved => "enrollmentApproved",
        _ => "enrollmentRejected",
    };
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, log_type, Some(format!("user {user_id}"))).await;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/v2/hackathon/{name}/enrollment/{user_id}/approve",
    tag = "enrollment",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = Enrollment), (status = 403, body = ErrorBody))
)]
pub async fn approve(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
) -> ApiResult<Json<Enrollment>> {
    set_status(&state, &user, &name, &user_id, EnrollmentStatus::Approved).await
}

#[utoipa::path(
    post,
    path = "/v2/hackathon/{name}/enrollment/{user_id}/reject",
    tag = "enrollment",
    params(("name" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = Enrollment), (status = 403, body = ErrorBody))
)]
pub async fn reject(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, user_id)): Path<(String, String)>,
) -> ApiResult<Json<Enrollment>> {
    set_status(&state, &user, &name, &user_id, EnrollmentStatus::Rejected).await
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/enrollments", tag = "enrollment", params(("name" = String, Path,), EnrollmentQuery), responses((status = 200, description = "Enrollments")))]
pub async fn list(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    uri: Uri,
    Query(query): Query<EnrollmentQuery>,
) -> ApiResult<Json<ResourceList<Enrollment>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    let pagination = Pagination { np: query.np, nr: query.nr, top: query.top };
    let page = state.enrollments.list_paginated_enrollments(hackathon.name(), query.status, &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, Enrollment::from)))
}
