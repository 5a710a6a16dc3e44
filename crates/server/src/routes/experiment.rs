use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use models::entities::HackathonEntity;
use service::experiment::{ExperimentContext, TemplateRequest};
use service::user::UserClaims;

use crate::auth::{is_hackathon_admin, load_hackathon, require_enrolled, require_hackathon_admin, require_writable, CurrentUser};
use crate::dto::{Experiment, ExperimentRequest, ResourceList, Template};
use crate::errors::{ApiResult, ErrorBody, JsonApiError};
use crate::state::AppState;

#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/template",
    tag = "experiment",
    params(("name" = String, Path,)),
    request_body = TemplateRequest,
    responses((status = 200, body = Template), (status = 403, body = ErrorBody))
)]
pub async fn create_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<TemplateRequest>,
) -> ApiResult<Json<Template>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if req.image.as_deref().map_or(true, |i| i.trim().is_empty()) {
        return Err(JsonApiError::bad_request("template image is required"));
    }
    let template = state.experiments.create_or_update_template(hackathon.name(), &req).await?;
    let message = Some(format!("template {}", template.template.display_name));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createTemplate", message).await;
    Ok(Json(template.into()))
}

#[utoipa::path(
    patch,
    path = "/v2/hackathon/{name}/template/{template_id}",
    tag = "experiment",
    params(("name" = String, Path,), ("template_id" = String, Path,)),
    request_body = TemplateRequest,
    responses((status = 200, body = Template), (status = 404, body = ErrorBody))
)]
pub async fn update_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, template_id)): Path<(String, String)>,
    Json(mut req): Json<TemplateRequest>,
) -> ApiResult<Json<Template>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if state.experiments.get_template(hackathon.name(), &template_id).await?.is_none() {
        return Err(JsonApiError::not_found(format!("template {template_id} not found")));
    }
    req.id = Some(template_id);
    Ok(Json(state.experiments.create_or_update_template(hackathon.name(), &req).await?.into()))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/template/{template_id}",
    tag = "experiment",
    params(("name" = String, Path,), ("template_id" = String, Path,)),
    responses((status = 200, body = Template), (status = 404, body = ErrorBody))
)]
pub async fn get_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, template_id)): Path<(String, String)>,
) -> ApiResult<Json<Template>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    let template = state
        .experiments
        .get_template(hackathon.name(), &template_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("template {template_id} not found")))?;
    Ok(Json(template.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/template/{template_id}",
    tag = "experiment",
    params(("name" = String, Path,), ("template_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete_template(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, template_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    require_writable(&hackathon)?;
    if state.experiments.delete_template(hackathon.name(), &template_id).await?.is_some() {
        let message = Some(format!("template {template_id}"));
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteTemplate", message).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/templates", tag = "experiment", params(("name" = String, Path,)), responses((status = 200, description = "Templates with cluster status")))]
pub async fn list_templates(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(name): Path<String>) -> ApiResult<Json<ResourceList<Template>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    let templates = state.experiments.list_templates(hackathon.name()).await?;
    Ok(Json(ResourceList::single_page(templates.into_iter().map(Template::from).collect())))
}

/// Start the caller's environment from a template.
#[utoipa::path(
    put,
    path = "/v2/hackathon/{name}/experiment",
    tag = "experiment",
    params(("name" = String, Path,)),
    request_body = ExperimentRequest,
    responses((status = 200, body = Experiment), (status = 404, body = ErrorBody), (status = 412, body = ErrorBody))
)]
pub async fn create(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(name): Path<String>,
    Json(req): Json<ExperimentRequest>,
) -> ApiResult<Json<Experiment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    if !is_hackathon_admin(&state, &hackathon, &user).await? {
        require_enrolled(&state, &hackathon, &user).await?;
    }
    if state.experiments.get_template(hackathon.name(), &req.template_id).await?.is_none() {
        return Err(JsonApiError::not_found(format!("template {} not found", req.template_id)));
    }
    let experiment = state.experiments.create_experiment(hackathon.name(), &req.template_id, &user.user_id).await?;
    let message = Some(format!("template {}", req.template_id));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "createExperiment", message).await;
    Ok(Json(experiment.into()))
}

async fn load_own_experiment(state: &AppState, hackathon: &HackathonEntity, user: &UserClaims, experiment_id: &str) -> ApiResult<Option<ExperimentContext>> {
    let Some(experiment) = state.experiments.get_experiment(hackathon.name(), experiment_id).await? else {
        return Ok(None);
    };
    if experiment.experiment.user_id != user.user_id && !is_hackathon_admin(state, hackathon, user).await? {
        return Err(JsonApiError::forbidden("experiments are visible to their owner and administrators"));
    }
    Ok(Some(experiment))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/experiment/{experiment_id}",
    tag = "experiment",
    params(("name" = String, Path,), ("experiment_id" = String, Path,)),
    responses((status = 200, body = Experiment), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn get(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, experiment_id)): Path<(String, String)>,
) -> ApiResult<Json<Experiment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let experiment = load_own_experiment(&state, &hackathon, &user, &experiment_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("experiment {experiment_id} not found")))?;
    Ok(Json(experiment.into()))
}

#[utoipa::path(
    delete,
    path = "/v2/hackathon/{name}/experiment/{experiment_id}",
    tag = "experiment",
    params(("name" = String, Path,), ("experiment_id" = String, Path,)),
    responses((status = 204), (status = 403, body = ErrorBody))
)]
pub async fn delete(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, experiment_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let hackathon = load_hackathon(&state, &name).await?;
    if load_own_experiment(&state, &hackathon, &user, &experiment_id).await?.is_some() {
        state.experiments.delete_experiment(hackathon.name(), &experiment_id).await?;
        state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "deleteExperiment", None).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Recreate an experiment's environment. Data inside it is lost.
#[utoipa::path(
    post,
    path = "/v2/hackathon/{name}/experiment/{experiment_id}/reset",
    tag = "experiment",
    params(("name" = String, Path,), ("experiment_id" = String, Path,)),
    responses((status = 200, body = Experiment), (status = 403, body = ErrorBody), (status = 404, body = ErrorBody))
)]
pub async fn reset(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path((name, experiment_id)): Path<(String, String)>,
) -> ApiResult<Json<Experiment>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_writable(&hackathon)?;
    let not_found = || JsonApiError::not_found(format!("experiment {experiment_id} not found"));
    load_own_experiment(&state, &hackathon, &user, &experiment_id).await?.ok_or_else(not_found)?;
    let experiment = state.experiments.reset_experiment(hackathon.name(), &experiment_id).await?.ok_or_else(not_found)?;
    let message = Some(format!("experiment {experiment_id}"));
    state.activity_logs.log_hackathon_activity(hackathon.name(), &user.user_id, "resetExperiment", message).await;
    Ok(Json(experiment.into()))
}

#[utoipa::path(get, path = "/v2/hackathon/{name}/experiments", tag = "experiment", params(("name" = String, Path,)), responses((status = 200, description = "Experiments with cluster status")))]
pub async fn list(State(state): State<AppState>, CurrentUser(user): CurrentUser, Path(name): Path<String>) -> ApiResult<Json<ResourceList<Experiment>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    require_hackathon_admin(&state, &hackathon, &user).await?;
    let experiments = state.experiments.list_experiments(hackathon.name()).await?;
    Ok(Json(ResourceList::single_page(experiments.into_iter().map(Experiment::from).collect())))
}
