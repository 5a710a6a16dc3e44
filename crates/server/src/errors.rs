use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use service::errors::ServiceError;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;

/// Error body returned by every endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub title: String,
    pub detail: Option<String>,
    pub status: u16,
}

#[derive(Debug)]
pub struct JsonApiError {
    pub status: StatusCode,
    pub title: String,
    pub detail: Option<String>,
}

impl JsonApiError {
    pub fn new(status: StatusCode, title: impl Into<String>, detail: Option<String>) -> Self {
        Self { status, title: title.into(), detail }
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "Bad Request", Some(detail.into()))
    }

    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "Unauthorized", Some("a valid `Authorization: token <token>` header is required".into()))
    }

    pub fn forbidden(detail: impl Into<String>) -> Self { Self::new(StatusCode::FORBIDDEN, "Forbidden", Some(detail.into())) }

    pub fn not_found(detail: impl Into<String>) -> Self { Self::new(StatusCode::NOT_FOUND, "Not Found", Some(detail.into())) }

    pub fn conflict(detail: impl Into<String>) -> Self { Self::new(StatusCode::CONFLICT, "Conflict", Some(detail.into())) }

    pub fn precondition_failed(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::PRECONDITION_FAILED, "Precondition Failed", Some(detail.into()))
    }
}

impl From<ServiceError> for JsonApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Validation(m) => Self::bad_request(m),
            ServiceError::NotFound(m) => Self::not_found(m),
            ServiceError::PreconditionFailed(m) => Self::precondition_failed(m),
            ServiceError::Forbidden(m) => Self::forbidden(m),
            ServiceError::Conflict(m) => Self::conflict(m),
            ServiceError::Model(models::ModelError::Validation(m)) => Self::bad_request(m),
            ServiceError::Model(models::ModelError::NotFound(m)) => Self::not_found(m),
            ServiceError::Model(models::ModelError::Conflict(m)) => Self::conflict(m),
            other => Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error", Some(other.to_string())),
        }
    }
}

impl IntoResponse for JsonApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            error!(status = self.status.as_u16(), title = %self.title, detail = ?self.detail, "request_failed");
        }
        let body = ErrorBody { title: self.title, detail: self.detail, status: self.status.as_u16() };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, JsonApiError>;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("backend unavailable: {0}")]
    Backend(String),
    #[error(transparent)]
    Any(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_errors_map_to_status_codes() {
        let cases = [
            (ServiceError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (ServiceError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (ServiceError::PreconditionFailed("p".into()), StatusCode::PRECONDITION_FAILED),
            (ServiceError::Forbidden("f".into()), StatusCode::FORBIDDEN),
            (ServiceError::Conflict("c".into()), StatusCode::CONFLICT),
            (ServiceError::Db("d".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (ServiceError::Model(models::ModelError::Conflict("t".into())), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(JsonApiError::from(err).status, status);
        }
    }
}
