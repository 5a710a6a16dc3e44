use axum::{
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    Json,
};
use service::pagination::Pagination;
use service::template_repo::TemplateRepoRequest;

use crate::auth::{load_hackathon, require_hackathon_admin, require_writable, CurrentUser};
use crate::dto::{ResourceList, TemplateRepo};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/templateRepo",
    tag = "templateRepo",
    params(("name" = String, Path,)),
    request_body = TemplateRepoRequest,
    responses((status = 200, body = TemplateRepo), (status = 400, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<TemplateRepoRequest>,
) -> ApiResult<Json<TemplateRepo>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let repo = state.template_repos.create_template_repo(hackathon.name(), &req).await?;
    let message = Some(format!("repo {}", repo.url));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createTemplateRepo", message).await;
    Ok(Json(repo.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/templateRepo/{repo_id}",
    tag = "templateRepo",
    params(("name" = String, Path,), ("repo_id" = String, Path,)),
    request_body = TemplateRepoRequest,
    responses((status = 200, body = TemplateRepo), (status = 404, body = ErrorBody))
)]
pub async fn update(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, repo_id)): Path<(String, String)>,
    Json(req): Json<TemplateRepoRequest>,
) -> ApiResult<Json<TemplateRepo>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    let repo = state
        .template_repos
        .get_template_repo(hackathon.name(), &repo_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("template repo {repo_id} not found")))?;
    Ok(Json(state.template_repos.update_template_repo(&repo, &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/templateRepo/{repo_id}",
    tag = "templateRepo",
    params(("name" = String, Path,), ("repo_id" = String, Path,)),
    responses((status = 200, body = TemplateRepo), (status = 404, body = ErrorBody))
)]
pub async fn get(State(state): State<AppState>, Path((name, repo_id)): Path<(String, String)>) -> ApiResult<Json<TemplateRepo>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let repo = state
        .template_repos
        .get_template_repo(hackathon.name(), &repo_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("template repo {repo_id} not found")))?;
    Ok(Json(repo.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/templateRepo/{repo_id}",
    tag = "templateRepo",
    params(("name" = String, Path,), ("repo_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, repo_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    state.template_repos.delete_template_repo(hackathon.name(), &repo_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/templateRepos", tag = "templateRepo", params(("name" = String, Path,), Pagination), responses((status = 200, description = "Template repos")))]
pub async fn list(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<TemplateRepo>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let page = state.template_repos.list_paginated_template_repos(hackathon.name(), &pagination).await?;
    Ok(Json(ResourceList::from_page(&uri, page, TemplateRepo::from)))
}
