use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use models::entities::{HackathonEntity, TeamEntity, TeamMemberEntity, TeamMemberRole, TeamMemberStatus, TeamWorkEntity};
use service::pagination::Pagination;
use service::team::{TeamMemberQueryOptions, TeamRequest, TeamWorkRequest};
use service::user::UserClaims;

use crate::auth::{load_hackathon, load_team, require_enrolled, require_team_admin, require_team_member, require_writable, CurrentUser};
use crate::dto::{NameAvailability, ResourceList, Team, TeamMember, TeamMemberQuery, TeamMemberRequest, TeamWork};
use crate::routes::hackathon::NameCheckRequest;
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

/// A user belongs to at most one team per hackathon.
async fn ensure_not_in_other_team(state: &AppState, hackathon: &HackathonEntity, team_id: Option<&str>, user_id: &str) -> ApiResult<Option<TeamMemberEntity>> {
    match state.teams.get_team_member(hackathon.name(), user_id).await? {
        Some(m) if Some(m.team_id.as_str()) != team_id => {
            Err(JsonApiError::precondition_failed(format!("{user_id} already joined team {}", m.team_id)))
        }
        other => Ok(other),
    }
}

async fn find_member(state: &AppState, team: &TeamEntity, user_id: &str) -> ApiResult<Option<TeamMemberEntity>> {
    let member = state.teams.get_team_member(team.hackathon_name(), user_id).await?;
    Ok(member.filter(|m| m.team_id == team.id()))
}

async fn load_member(state: &AppState, team: &TeamEntity, user_id: &str) -> ApiResult<TeamMemberEntity> {
    find_member(state, team, user_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("{user_id} is not a member of team {}", team.id())))
}

async fn writable_team(state: &AppState, name: &str, team_id: &str) -> ApiResult<(HackathonEntity, TeamEntity)> {
    let hackathon = load_hackathon(state, name).await?;
    require_writable(&hackathon)?;
    let team = load_team(state, &hackathon, team_id).await?;
    Ok((hackathon, team))
}

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/team",
    tag = "team",
    params(("name" = String, Path,)),
    request_body = TeamRequest,
    responses((status = 200, body = Team), (status = 409, body = ErrorBody), (status = 412, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<TeamRequest>,
) -> ApiResult<Json<Team>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    require_enrolled(&state, &hackathon, &user).await?;
    ensure_not_in_other_team(&state, &hackathon, None, &user.user_id).await?;
    if let Some(display_name) = req.display_name.as_deref().filter(|d| !d.trim().is_empty()) {
        if !state.teams.get_team_by_name(hackathon.name(), display_name).await?.is_empty() {
            return Err(JsonApiError::conflict(format!("team {display_name} already exists")));
        }
    }
    let team = state.teams.create_team(hackathon.name(), &req, &user.user_id).await?;
    let message = Some(format!("team {}", team.display_name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createTeam", message).await;
    Ok(Json(team.into()))
}

/// Whether a display name is still free within the hackathon.
#[utoipa::path(
    post,
    path = "/v2/hackathon/{name}/team/checkNameAvailability",
    tag = "team",
    params(("name" = String, Path,)),
    request_body = NameCheckRequest,
    responses((status = 200, body = NameAvailability), (status = 404, body = ErrorBody))
)]
pub async fn check_name_availability(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<NameCheckRequest>,
) -> ApiResult<Json<NameAvailability>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let display_name = req.name.trim();
    if display_name.is_empty() {
        return Ok(Json(NameAvailability {
            name: req.name,
            name_available: false,
            reason: Some("Invalid".into()),
            message: Some("team name must not be empty".into()),
        }));
    }
    let available = state.teams.get_team_by_name(hackathon.name(), display_name).await?.is_empty();
    Ok(Json(NameAvailability {
        name: req.name,
        name_available: available,
        reason: (!available).then(|| "AlreadyExists".to_string()),
        message: (!available).then(|| "the team name is already in use".to_string()),
    }))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/team/{team_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,)),
    request_body = TeamRequest,
    responses((status = 200, body = Team), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id)): Path<(String, String)>,
    Json(req): Json<TeamRequest>,
) -> ApiResult<Json<Team>> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_admin(&state, &hackathon, &team, &user).await?;
    if let Some(display_name) = req.display_name.as_deref().filter(|d| *d != team.display_name) {
        let same = state.teams.get_team_by_name(hackathon.name(), display_name).await?;
        if same.iter().any(|t| t.id() != team.id()) {
            return Err(JsonApiError::conflict(format!("team {display_name} already exists")));
        }
    }
    Ok(Json(state.teams.update_team(&team, &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/team/{team_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,)),
    responses((status = 200, body = Team), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, Path((name, team_id)): Path<(String, String)>) -> ApiResult<Json<Team>> {
    let hackathon = load_hackathon(&state, &name).await?;
    Ok(Json(load_team(&state, &hackathon, &team_id).await?.into()))
}

/// Teams holding awards cannot be deleted; members go with the team.
#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/team/{team_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,)),
    responses((status = 204), (status = 412, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    let Some(team) = state.teams.get_team_by_id(hackathon.name(), &team_id).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };
    require_team_admin(&state, &hackathon, &team, &user).await?;
    if !state.awards.list_assignments_by_team(hackathon.name(), team.id()).await?.is_empty() {
        return Err(JsonApiError::precondition_failed(format!("team {} has been awarded", team.display_name)));
    }
    for member in state.teams.list_team_members(hackathon.name(), team.id()).await? {
        state.teams.delete_team_member(&member).await?;
    }
    state.teams.delete_team(&team).await?;
    let message = Some(format!("team {}", team.display_name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteTeam", message).await;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/teams", tag = "team", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Teams")))]
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<Team>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.teams.list_paginated_teams(hackathon.name(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, Team::from)))
}

/// Join a team; approved at once when the team auto-approves.
#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/team/{team_id}/member",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,)),
    request_body = TeamMemberRequest,
    responses((status = 200, body = TeamMember), (status = 412, body = ErrorBody))
)]
pub async fn join(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id)): Path<(String, String)>,
    Json(req): Json<TeamMemberRequest>,
) -> ApiResult<Json<TeamMember>> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_enrolled(&state, &hackathon, &user).await?;
    if let Some(existing) = ensure_not_in_other_team(&state, &hackathon, Some(team.id()), &user.user_id).await? {
        return Ok(Json(state.teams.update_team_member(&existing, req.description).await?.into()));
    }
    let status = if team.auto_approve { TeamMemberStatus::Approved } else { TeamMemberStatus::PendingApproval };
    let member = state.teams.create_team_member(&team, &user.user_id, req.description, Some(TeamMemberRole::Member), status).await?;
    let message = Some(format!("team {}", team.display_name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "joinTeam", message).await;
    Ok(Json(member.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/team/{team_id}/member",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,)),
    request_body = TeamMemberRequest,
    responses((status = 200, body = TeamMember), (status = 404, body = ErrorBody))
)]
pub async fn update_mine(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id)): Path<(String, String)>,
    Json(req): Json<TeamMemberRequest>,
) -> ApiResult<Json<TeamMember>> {
    let (_, team) = writable_team(&state, &name, &team_id).await?;
    let member = load_member(&state, &team, &user.user_id).await?;
    Ok(Json(state.teams.update_team_member(&member, req.description).await?.into()))
}

/// Leave the team. The last admin cannot leave others behind; an emptied team is removed.
#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/team/{team_id}/member",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,)),
    responses((status = 204), (status = 412, body = ErrorBody))
)]
pub async fn leave(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    let Some(member) = find_member(&state, &team, &user.user_id).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };
    remove_member(&state, &hackathon, &team, &member, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_member(state: &AppState, hackathon: &HackathonEntity, team: &TeamEntity, member: &TeamMemberEntity, user: &UserClaims) -> ApiResult<()> {
    let members = state.teams.list_team_members(hackathon.name(), team.id()).await?;
    let other_admins = members
        .iter()
        .filter(|m| m.user_id() != member.user_id() && m.role == TeamMemberRole::Admin && m.status == TeamMemberStatus::Approved)
        .count();
    if member.role == TeamMemberRole::Admin && other_admins == 0 && members.len() > 1 {
        return Err(JsonApiError::precondition_failed(format!("team {} would have no administrator", team.display_name)));
    }
    state.teams.delete_team_member(member).await?;
    if members.len() <= 1 {
        state.teams.delete_team(team).await?;
    }
    let message = Some(format!("team {} member {}", team.display_name, member.user_id()));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "leaveTeam", message).await;
    Ok(())
}

/// Team administrators add an enrolled user directly.
#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/team/{team_id}/member/{user_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("user_id" = String, Path,)),
    request_body = TeamMemberRequest,
    responses((status = 200, body = TeamMember), (status = 412, body = ErrorBody))
)]
pub async fn add_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id, user_id)): Path<(String, String, String)>,
    Json(req): Json<TeamMemberRequest>,
) -> ApiResult<Json<TeamMember>> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_admin(&state, &hackathon, &team, &user).await?;
    if !state.enrollments.is_user_enrolled(&hackathon, &user_id).await? {
        return Err(JsonApiError::precondition_failed(format!("{user_id} is not enrolled in {}", hackathon.name())));
    }
    if let Some(existing) = ensure_not_in_other_team(&state, &hackathon, Some(team.id()), &user_id).await? {
        return Ok(Json(state.teams.update_team_member(&existing, req.description).await?.into()));
    }
    let member = state.teams.create_team_member(&team, &user_id, req.description, req.role, TeamMemberStatus::Approved).await?;
    let message = Some(format!("team {} member {user_id}", team.display_name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "addTeamMember", message).await;
    Ok(Json(member.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/team/{team_id}/member/{user_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = TeamMember), (status = 404, body = ErrorBody))
)]
pub async fn get_member(State(state): State<AppState>, Path((name, team_id, user_id)): Path<(String, String, String)>) -> ApiResult<Json<TeamMember>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let team = load_team(&state, &hackathon, &team_id).await?;
    Ok(Json(load_member(&state, &team, &user_id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/team/{team_id}/member/{user_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id, user_id)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_admin(&state, &hackathon, &team, &user).await?;
    let Some(member) = find_member(&state, &team, &user_id).await? else {
        return Ok(StatusCode::NO_CONTENT);
    };
    remove_member(&state, &hackathon, &team, &member, &user).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/v2/hackathon/{name}/team/{team_id}/member/{user_id}/approve",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("user_id" = String, Path,)),
    responses((status = 200, body = TeamMember), (status = 403, body = ErrorBody))
)]
pub async fn approve_member(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id, user_id)): Path<(String, String, String)>,
) -> ApiResult<Json<TeamMember>> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_admin(&state, &hackathon, &team, &user).await?;
    let member = load_member(&state, &team, &user_id).await?;
    let updated = state.teams.update_team_member_status(&member, TeamMemberStatus::Approved).await?;
    let message = Some(format!("team {} member {user_id}", team.display_name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "approveTeamMember", message).await;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    post,
    path = "/v2/hackathon/{name}/team/{team_id}/member/{user_id}/updateRole",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("user_id" = String, Path,)),
    request_body = TeamMemberRequest,
    responses((status = 200, body = TeamMember), (status = 400, body = ErrorBody))
)]
pub async fn update_member_role(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id, user_id)): Path<(String, String, String)>,
    Json(req): Json<TeamMemberRequest>,
) -> ApiResult<Json<TeamMember>> {
    let role = req.role.ok_or_else(|| JsonApiError::bad_request("role is required"))?;
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_admin(&state, &hackathon, &team, &user).await?;
    let member = load_member(&state, &team, &user_id).await?;
    Ok(Json(state.teams.update_team_member_role(&member, role).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/team/{team_id}/members",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), TeamMemberQuery),
    responses((status = 200, description = "Team members"))
)]
pub async fn list_members(
    State(state): State<AppState>,
    Path((name, team_id)): Path<(String, String)>,
    uri: Uri,
    Query(query): Query<TeamMemberQuery>,
) -> ApiResult<Json<ResourceList<TeamMember>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let team = load_team(&state, &hackathon, &team_id).await?;
    let options = TeamMemberQueryOptions {
        pagination: Pagination { np: query.np, nr: query.nr, top: query.top },
        status: query.status,
        role: query.role,
    };
    let page = state.teams.list_paginated_team_members(hackathon.name(), team.id(), &options).await?;
    Ok(Json(ResourceList::from_page(&uri, page, TeamMember::from)))
}

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/team/{team_id}/work",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,)),
    request_body = TeamWorkRequest,
    responses((status = 200, body = TeamWork), (status = 412, body = ErrorBody))
)]
pub async fn create_work(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id)): Path<(String, String)>,
    Json(req): Json<TeamWorkRequest>,
) -> ApiResult<Json<TeamWork>> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_member(&state, &hackathon, &team, &user).await?;
    if req.title.as_deref().map_or(true, |t| t.trim().is_empty()) || req.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
        return Err(JsonApiError::bad_request("title and url are required"));
    }
    let work = state.teams.create_team_work(&team, &req).await?;
    let message = Some(format!("team {} work {}", team.display_name, work.title));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createTeamWork", message).await;
    Ok(Json(work.into()))
}

async fn find_work(state: &AppState, team: &TeamEntity, work_id: &str) -> ApiResult<Option<TeamWorkEntity>> {
    let work = state.teams.get_team_work(team.hackathon_name(), work_id).await?;
    Ok(work.filter(|w| w.team_id == team.id()))
}

async fn load_work(state: &AppState, team: &TeamEntity, work_id: &str) -> ApiResult<TeamWorkEntity> {
    find_work(state, team, work_id).await?.ok_or_else(|| JsonApiError::not_found(format!("work {work_id} not found")))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/team/{team_id}/work/{work_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("work_id" = String, Path,)),
    request_body = TeamWorkRequest,
    responses((status = 200, body = TeamWork), (status = 404, body = ErrorBody))
)]
pub async fn update_work(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id, work_id)): Path<(String, String, String)>,
    Json(req): Json<TeamWorkRequest>,
) -> ApiResult<Json<TeamWork>> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_member(&state, &hackathon, &team, &user).await?;
    let work = load_work(&state, &team, &work_id).await?;
    Ok(Json(state.teams.update_team_work(&work, &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/team/{team_id}/work/{work_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("work_id" = String, Path,)),
    responses((status = 200, body = TeamWork), (status = 404, body = ErrorBody))
)]
pub async fn get_work(State(state): State<AppState>, Path((name, team_id, work_id)): Path<(String, String, String)>) -> ApiResult<Json<TeamWork>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let team = load_team(&state, &hackathon, &team_id).await?;
    Ok(Json(load_work(&state, &team, &work_id).await?.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/team/{team_id}/work/{work_id}",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), ("work_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete_work(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, team_id, work_id)): Path<(String, String, String)>,
) -> ApiResult<StatusCode> {
    let (hackathon, team) = writable_team(&state, &name, &team_id).await?;
    require_team_member(&state, &hackathon, &team, &user).await?;
    if let Some(work) = find_work(&state, &team, &work_id).await? {
        state.teams.delete_team_work(&work).await?;
        let message = Some(format!("team {} work {}", team.display_name, work.title));
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteTeamWork", message).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/team/{team_id}/works",
    tag = "team",
    params(("name" = String, Path,), ("team_id" = String, Path,), Pagination),
    responses((status = 200, description = "Team works"))
)]
pub async fn list_works(
    State(state): State<AppState>,
    Path((name, team_id)): Path<(String, String)>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<TeamWork>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let team = load_team(&state, &hackathon, &team_id).await?;
    let page = state.teams.list_paginated_team_works(hackathon.name(), team.id(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, TeamWork::from)))
}
