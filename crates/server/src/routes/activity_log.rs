use axum::{
    extract::{Path, Query, State},
    http::Uri,
    Json,
};
use service::activity_log::ActivityLogQueryOptions;
use service::pagination::Pagination;

use crate::auth::load_hackathon;
use crate::dto::{ActivityLog, ResourceList};
use crate::errors::ApiResult;
use crate::routes::require_user;
use crate::state::AppState;

async fn query(state: &AppState, uri: &Uri, options: ActivityLogQueryOptions) -> ApiResult<Json<ResourceList<ActivityLog>>> {
    let page = state.activity_logs.list_activity_logs(&options).await?;
    Ok(Json(ResourceList::from_page(uri, page, ActivityLog::from)))
}

#[utoipa::path(
    get,
    path = "/v2/hackathon/{name}/activityLogs",
    tag = "activityLog",
    params(("name" = String, Path,), Pagination),
    responses((status = 200, description = "Newest activity of a hackathon first"))
)]
pub async fn list_hackathon_logs(
    State(state): State<AppState>,
    Path(name): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<ActivityLog>>> {
    let hackathon = load_hackathon(&state, &name).await?;
    let options = ActivityLogQueryOptions { pagination, hackathon_name: Some(hackathon.name().to_string()), user_id: None };
    query(&state, &uri, options).await
}

#[utoipa::path(
    get,
    path = "/v2/user/{user_id}/activityLogs",
    tag = "activityLog",
    params(("user_id" = String, Path,), Pagination),
    responses((status = 200, description = "Newest activity of a user first"))
)]
pub async fn list_user_logs(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    uri: Uri,
    Query(pagination): Query<Pagination>,
) -> ApiResult<Json<ResourceList<ActivityLog>>> {
    let user = require_user(&state, &user_id).await?;
    let options = ActivityLogQueryOptions { pagination, hackathon_name: None, user_id: Some(user.user_id().to_string()) };
    query(&state, &uri, options).await
}
