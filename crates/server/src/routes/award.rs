use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use models::entities::{AwardAssignmentEntity, AwardEntity, AwardTarget, HackathonEntity};
use service::award::{AssignmentScope, AwardRequest};
use service::pagination::Pagination;

use crate::auth::{load_hackathon, load_team, require_hackathon_admin, require_writable, CurrentUser};
use crate::dto::{Award, AwardAssignment, AwardAssignmentRequest, ResourceList};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

async fn load_award(state: &AppState, hackathon: &HackathonEntity, award_id: &str) -> ApiResult<AwardEntity> {
    state
        .awards
        .get_award(hackathon.name(), award_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("award {award_id} not found")))
}

async fn find_assignment(state: &AppState, award: &AwardEntity, assignment_id: &str) -> ApiResult<Option<AwardAssignmentEntity>> {
    let assignment = state.awards.get_assignment(award.hackathon_name(), assignment_id).await?;
    Ok(assignment.filter(|a| a.award_id == award.id()))
}

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/award",
    tag = "award",
    params(("name" = String, Path,)),
    request_body = AwardRequest,
    responses((status = 200, body = Award), (status = 412, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<AwardRequest>,
) -> ApiResult<Json<Award>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if req.name.as_deref().map_or(true, |n| n.trim().is_empty()) {
        return Err(JsonApiError::bad_request("award name is required"));
    }
    let award = state.awards.create_award(hackathon.name(), &req).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createAward", Some(format!("award {}", award.name))).await;
    Ok(Json(award.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/award/{award_id}",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,)),
    request_body = AwardRequest,
    responses((status = 200, body = Award), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, award_id)): Path<(String, String)>,
    Json(req): Json<AwardRequest>,
) -> ApiResult<Json<Award>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let award = load_award(&state, &hackathon, &award_id).await?;
    if let Some(quantity) = req.quantity {
        let assigned = state.awards.count_assignments_by_award(hackathon.name(), award.id()).await?;
        if (quantity.max(0) as usize) < assigned {
            return Err(JsonApiError::precondition_failed(format!("award {} is already assigned {assigned} times", award.name)));
        }
    }
    Ok(Json(state.awards.update_award(&award, &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/award/{award_id}",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,)),
    responses((status = 200, body = Award), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, Path((name, award_id)): Path<(String, String)>) -> ApiResult<Json<Award>> {
    let hackathon = load_hackathon(&state, &name).await?;
    Ok(Json(load_award(&state, &hackathon, &award_id).await?.into()))
}

/// Awards already given out cannot be deleted.
#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/award/{award_id}",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,)),
    responses((status = 204), (status = 412, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, award_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let Some(award) = state.awards.get_award(hackathon.name(), &award_id).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };
    if state.awards.count_assignments_by_award(hackathon.name(), award.id()).await? > 0 {
        return Err(JsonApiError::precondition_failed(format!("award {} has been assigned", award.name)));
    }
    state.awards.delete_award(&award).await?;
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteAward", Some(format!("award {}", award.name))).await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/awards", tag = "award", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Awards")))]
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<Award>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.awards.list_paginated_awards(hackathon.name(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, Award::from)))
}

/// Assign the award to a team or an enrolled user, depending on its target.
#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/award/{award_id}/assignment",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,)),
    request_body = AwardAssignmentRequest,
    responses((status = 200, body = AwardAssignment), (status = 404, body = ErrorBody), (status = 412, body = ErrorBody))
)]
pub async fn assign(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, award_id)): Path<(String, String)>,
    Json(req): Json<AwardAssignmentRequest>,
) -> ApiResult<Json<AwardAssignment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let award = load_award(&state, &hackathon, &award_id).await?;
    let assignee_id = req
        .assignee_id
        .filter(|a| !a.trim().is_empty())
        .ok_or_else(|| JsonApiError::bad_request("assigneeId is required"))?;
    match award.target {
        AwardTarget::Team => {
            load_team(&state, &hackathon, &assignee_id).await?;
        }
        AwardTarget::Individual => {
            if !state.enrollments.is_user_enrolled(&hackathon, &assignee_id).await? {
                return Err(JsonApiError::not_found(format!("{assignee_id} is not enrolled in {}", hackathon.name())));
            }
        }
    }
    let assignment = state.awards.create_or_update_assignment(&award, &assignee_id, req.description).await?;
    let message = Some(format!("award {} to {assignee_id}", award.name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createAwardAssignment", message).await;
    Ok(Json(assignment.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/award/{award_id}/assignment/{assignment_id}",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,), ("assignment_id" = String, Path,)),
    request_body = AwardAssignmentRequest,
    responses((status = 200, body = AwardAssignment), (status = 404, body = ErrorBody))
)]
pub async fn update_assignment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, award_id, assignment_id)): Path<(String, String, String)>,
    Json(req): Json<AwardAssignmentRequest>,
) -> ApiResult<Json<AwardAssignment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let award = load_award(&state, &hackathon, &award_id).await?;
    let assignment = find_assignment(&state, &award, &assignment_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("assignment {assignment_id} not found")))?;
    Ok(Json(state.awards.update_assignment(&assignment, req.description).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/award/{award_id}/assignment/{assignment_id}",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,), ("assignment_id" = String, Path,)),
    responses((status = 200, body = AwardAssignment), (status = 404, body = ErrorBody))
)]
pub async fn get_assignment(
    State(state): State<AppState>,
    Path((name, award_id, assignment_id)): Path<(String, String, String)>,
) -> ApiResult<Json<AwardAssignment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let award = load_award(&state, &hackathon, &award_id).await?;
    let assignment = find_assignment(&state, &award, &assignment_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("assignment {assignment_id} not found")))?;
    Ok(Json(assignment.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/award/{award_id}/assignment/{assignment_id}",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,), ("assignment_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete_assignment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, award_id, assignment_id)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let award = load_award(&state, &hackathon, &award_id).await?;
    if let Some(assignment) = find_assignment(&state, &award, &assignment_id).await? {
        state.awards.delete_assignment(hackathon.name(), assignment.id()).await?;
        let message = Some(format!("award {} from {}", award.name, assignment.assignee_id));
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteAwardAssignment", message).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

async fn list_scoped(state: &AppState, uri: &Uri, hackathon: &HackathonEntity, scope: AssignmentScope, pagination: &Pagination) -> ApiResult<ResourceList<AwardAssignment>> {
    let page = state.awards.list_paginated_assignments(hackathon.name(), &scope, pagination).await?;
    Ok(ResourceList::from_page(uri, page, AwardAssignment::from))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/award/{award_id}/assignments",
    tag = "award",
    params(("name" = String, Path,), ("award_id" = String, Path,), Pagination),
    responses((status = 200, description = "Assignments of one award"))
)]
pub async fn list_award_assignments(
    State(state): State<AppState>,
    Path((name, award_id)): Path<(String, String)>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<AwardAssignment>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let award = load_award(&state, &hackathon, &award_id).await?;
    Ok(Json(list_scoped(&state, &uri, &hackathon, AssignmentScope::Award(award.id().to_string()), &pagination).await?))
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/assignments", tag = "award", params(("name" = String, Path,), Pagination), responses((status = 200, description = "All assignments")))]
pub async fn list_assignments(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<AwardAssignment>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    Ok(Json(list_scoped(&state, &uri, &hackathon, AssignmentScope::Hackathon, &pagination).await?))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/team/{team_id}/assignments",
    tag = "award",
    params(("name" = String, Path,), ("team_id" = String, Path,), Pagination),
    responses((status = 200, description = "Awards a team received"))
)]
pub async fn list_team_assignments(
    State(state): State<AppState>,
    Path((name, team_id)): Path<(String, String)>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<AwardAssignment>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let team = load_team(&state, &hackathon, &team_id).await?;
    Ok(Json(list_scoped(&state, &uri, &hackathon, AssignmentScope::Assignee(team.id().to_string()), &pagination).await?))
}
