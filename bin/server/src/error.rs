//! HTTP error responses.
//!
//! Every error leaves the server as `{"code": <status>, "message": <text>}`.
//! Domain errors carry their display text; anything unexpected is logged
//! and answered with a generic message.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use frontgate_repository::RepositoryError;
use serde::Serialize;
use std::fmt;
use tracing::{error, warn};

const INTERNAL_MESSAGE: &str = "internal server error";

/// An error rendered as a JSON body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: u16,
    message: &'a str,
}

impl ApiError {
    #[must_use]
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "not authenticated")
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// A 500 with the generic message. The details are logged, never sent.
    #[must_use]
    pub fn internal(details: impl fmt::Display) -> Self {
        error!(error = %details, "internal error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_MESSAGE)
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.status.as_u16(),
            message: &self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RepositoryError> for ApiError {
    fn from(e: RepositoryError) -> Self {
        match e {
            RepositoryError::NotFound { .. } => Self::new(StatusCode::NOT_FOUND, e.to_string()),
            RepositoryError::AlreadyExists { .. } => {
                Self::new(StatusCode::CONFLICT, e.to_string())
            }
            RepositoryError::NotConnected { .. } => {
                warn!(error = %e, "repository unavailable");
                Self::new(StatusCode::SERVICE_UNAVAILABLE, "repository unavailable")
            }
            RepositoryError::Backend { .. } => Self::internal(e),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}
