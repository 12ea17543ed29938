use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::provision::{ProvisionError, ProvisionFailure};

use super::response::ErrorResponse;

/// Error returned by HTTP handlers, mapped onto a status code.
#[derive(Debug)]
pub enum ApiError {
    /// Wrong HTTP method; nothing was touched
    MethodNotAllowed,

    /// The request named an unusable target
    BadRequest(String),

    /// The requested endpoint has no target configured
    NotConfigured(String),

    /// Provisioning failed; no reload was attempted
    Internal(String),

    /// The rule file changed but the engine did not reload
    ReloadFailed(String),
}

impl From<ProvisionError> for ApiError {
    fn from(err: ProvisionError) -> Self {
        match err {
            ProvisionError::InvalidName(e) => ApiError::BadRequest(e.to_string()),
            missing @ ProvisionError::NotConfigured(_) => ApiError::NotConfigured(missing.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ProvisionFailure> for ApiError {
    fn from(err: ProvisionFailure) -> Self {
        match err {
            ProvisionFailure::Provision(e) => e.into(),
            reload @ ProvisionFailure::Reload { .. } => ApiError::ReloadFailed(reload.to_string()),
            task @ ProvisionFailure::Task(_) => ApiError::Internal(task.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MethodNotAllowed => (
                StatusCode::METHOD_NOT_ALLOWED,
                ErrorResponse::new("only PUT requests supported", "METHOD_NOT_ALLOWED"),
            ),
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, ErrorResponse::bad_request(message))
            }
            ApiError::NotConfigured(message) => (
                StatusCode::NOT_FOUND,
                ErrorResponse::new(message, "NOT_CONFIGURED"),
            ),
            ApiError::Internal(message) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorResponse::internal_error(message),
            ),
            ApiError::ReloadFailed(message) => (
                StatusCode::BAD_GATEWAY,
                ErrorResponse::new(message, "RELOAD_FAILED").with_changed(true),
            ),
        };

        (status, Json(body)).into_response()
    }
}
