use axum::{
    Json,
    extract::rejection::{JsonRejection, PathRejection},
    response::{IntoResponse, Response},
};
use http::{HeaderValue, StatusCode, header::WWW_AUTHENTICATE};
use serde::Serialize;
use thiserror::Error;

/// Errors a business operation hands back to the envelope.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// An expected failure with the status the operation intends the caller to see.
    #[error("{message}")]
    Business {
        /// Status returned to the caller.
        status: StatusCode,
        /// Message returned to the caller.
        message: String,
    },

    /// Anything else. The caller only ever sees a generic message.
    #[error("Internal server error")]
    Unexpected(#[source] anyhow::Error),
}

impl ServiceError {
    /// A business error with an explicit status.
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Business {
            status,
            message: message.into(),
        }
    }

    /// 400 Bad Request.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    /// 403 Forbidden.
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    /// 404 Not Found.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 409 Conflict.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Wraps an internal failure.
    pub fn unexpected(error: impl Into<anyhow::Error>) -> Self {
        Self::Unexpected(error.into())
    }

    /// Get the appropriate HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Business { status, .. } => *status,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// What ends up in the telemetry record. Internal detail is kept for operators.
    pub(crate) fn telemetry_message(&self) -> String {
        match self {
            Self::Business { message, .. } => message.clone(),
            Self::Unexpected(e) => format!("{e:#}"),
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Self::Business { status, .. } if status.is_server_error() => "api_error",
            Self::Business { .. } => "invalid_request_error",
            Self::Unexpected(_) => "internal_error",
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unexpected(error)
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<PathRejection> for ServiceError {
    fn from(rejection: PathRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        match &self {
            Self::Unexpected(e) => log::error!("Unexpected fault: {e:#}"),
            Self::Business { message, .. } if status.is_server_error() => {
                log::error!("Server error ({}): {message}", status.as_u16());
            }
            Self::Business { .. } => (),
        }

        ErrorResponse::render(status, self.to_string(), self.error_type()).into_response()
    }
}

/// Why the envelope refused to run a protected operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum AuthFailure {
    #[error("missing authentication credentials")]
    MissingCredential,
    #[error("{0}")]
    Rejected(String),
    #[error("authentication service unavailable")]
    RelayUnavailable,
}

impl AuthFailure {
    pub(crate) fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredential | Self::Rejected(_) => StatusCode::UNAUTHORIZED,
            Self::RelayUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AuthFailure {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_type = match self {
            Self::MissingCredential | Self::Rejected(_) => "authentication_error",
            Self::RelayUnavailable => "api_error",
        };

        let mut response = ErrorResponse::render(status, self.to_string(), error_type).into_response();

        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }

        response
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorDetails,
}

#[derive(Debug, Serialize)]
struct ErrorDetails {
    message: String,
    r#type: &'static str,
    code: u16,
}

impl ErrorResponse {
    fn render(status: StatusCode, message: String, error_type: &'static str) -> (StatusCode, Json<Self>) {
        let response = Self {
            error: ErrorDetails {
                message,
                r#type: error_type,
                code: status.as_u16(),
            },
        };

        (status, Json(response))
    }
}
