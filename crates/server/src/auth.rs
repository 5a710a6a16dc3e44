//! Token authentication and permission guards.
//!
//! Requests may carry `Authorization: token <token>`. A token that resolves to
//! a user puts its [`UserClaims`] into the request extensions; handlers that
//! need a user extract [`CurrentUser`] and answer 401 without one.

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use models::entities::{HackathonEntity, TeamEntity, TeamMemberRole, TeamMemberStatus};
use service::user::UserClaims;
use tracing::debug;

use crate::errors::{ApiResult, JsonApiError};
use crate::state::AppState;

const TOKEN_SCHEME: &str = "token";

/// Token part of an `Authorization` header value, if it uses the `token` scheme.
pub fn parse_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case(TOKEN_SCHEME) && !token.is_empty()).then_some(token)
}

pub async fn resolve_user(State(state): State<AppState>, mut req: Request, next: Next) -> Result<Response, JsonApiError> {
    let token = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_token)
        .map(str::to_string);
    if let Some(token) = token {
        match state.users.get_user_basic_claims(&token).await? {
            Some(claims) => {
                req.extensions_mut().insert(claims);
            }
            None => debug!(path = %req.uri().path(), "token_rejected"),
        }
    }
    Ok(next.run(req).await)
}

/// Authenticated caller; rejects with 401.
pub struct CurrentUser(pub UserClaims);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentUser {
    type Rejection = JsonApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<UserClaims>().cloned().map(CurrentUser).ok_or_else(JsonApiError::unauthorized)
    }
}

/// Caller identity when a valid token was sent.
pub struct MaybeUser(pub Option<UserClaims>);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for MaybeUser {
    type Rejection = JsonApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(parts.extensions.get::<UserClaims>().cloned()))
    }
}

impl MaybeUser {
    pub fn user_id(&self) -> Option<&str> { self.0.as_ref().map(|c| c.user_id.as_str()) }
}

/// Online hackathon by name, or 404.
pub async fn load_hackathon(state: &AppState, name: &str) -> ApiResult<HackathonEntity> {
    state
        .hackathons
        .get_hackathon_entity_by_name(name)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("hackathon {name} not found")))
}

pub async fn load_team(state: &AppState, hackathon: &HackathonEntity, team_id: &str) -> ApiResult<TeamEntity> {
    state
        .teams
        .get_team_by_id(hackathon.name(), team_id)
        .await?
        .ok_or_else(|| JsonApiError::not_found(format!("team {team_id} not found")))
}

pub fn require_platform_admin(user: &UserClaims) -> ApiResult<()> {
    if user.is_platform_admin {
        return Ok(());
    }
    Err(JsonApiError::forbidden("platform administrator required"))
}

pub async fn is_hackathon_admin(state: &AppState, hackathon: &HackathonEntity, user: &UserClaims) -> ApiResult<bool> {
    Ok(user.is_platform_admin || state.admins.is_hackathon_admin(hackathon.name(), &user.user_id).await?)
}

pub async fn require_hackathon_admin(state: &AppState, hackathon: &HackathonEntity, user: &UserClaims) -> ApiResult<()> {
    if is_hackathon_admin(state, hackathon, user).await? {
        return Ok(());
    }
    Err(JsonApiError::forbidden(format!("administrator of {} required", hackathon.name())))
}

/// Writes to read-only hackathons are refused.
pub fn require_writable(hackathon: &HackathonEntity) -> ApiResult<()> {
    if hackathon.read_only {
        return Err(JsonApiError::forbidden(format!("hackathon {} is read-only", hackathon.name())));
    }
    Ok(())
}

pub async fn require_enrolled(state: &AppState, hackathon: &HackathonEntity, user: &UserClaims) -> ApiResult<()> {
    if state.enrollments.is_user_enrolled(hackathon, &user.user_id).await? {
        return Ok(());
    }
    Err(JsonApiError::precondition_failed(format!("{} is not enrolled in {}", user.user_id, hackathon.name())))
}

pub async fn require_judge(state: &AppState, hackathon: &HackathonEntity, user: &UserClaims) -> ApiResult<()> {
    if state.judges.is_judge(hackathon.name(), &user.user_id).await? {
        return Ok(());
    }
    Err(JsonApiError::forbidden(format!("judge of {} required", hackathon.name())))
}

/// Approved admin of the team, or an administrator of the hackathon.
pub async fn require_team_admin(state: &AppState, hackathon: &HackathonEntity, team: &TeamEntity, user: &UserClaims) -> ApiResult<()> {
    if is_hackathon_admin(state, hackathon, user).await? {
        return Ok(());
    }
    let member = state.teams.get_team_member(hackathon.name(), &user.user_id).await?;
    match member {
        Some(m) if m.team_id == team.id() && m.role == TeamMemberRole::Admin && m.status == TeamMemberStatus::Approved => Ok(()),
        _ => Err(JsonApiError::forbidden(format!("administrator of team {} required", team.id()))),
    }
}

/// Approved member of the team.
pub async fn require_team_member(state: &AppState, hackathon: &HackathonEntity, team: &TeamEntity, user: &UserClaims) -> ApiResult<()> {
    let member = state.teams.get_team_member(hackathon.name(), &user.user_id).await?;
    match member {
        Some(m) if m.team_id == team.id() && m.status == TeamMemberStatus::Approved => Ok(()),
        _ => Err(JsonApiError::forbidden(format!("member of team {} required", team.id()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_scheme_is_required() {
        assert_eq!(parse_token("token abc"), Some("abc"));
        assert_eq!(parse_token("Token  abc "), Some("abc"));
        assert_eq!(parse_token("Bearer abc"), None);
        assert_eq!(parse_token("token "), None);
        assert_eq!(parse_token("abc"), None);
    }
}
