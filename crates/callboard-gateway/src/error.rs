//! API error types and responses.
//!
//! Every failure is returned as `{"error": {"code": "...", "message": "..."}}`.

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use callboard_control::ControlError;

/// API error type that implements `IntoResponse`.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request body or parameters.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A control plane failure.
    #[error(transparent)]
    Control(#[from] ControlError),
}

/// Error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

/// Error details.
#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl ApiError {
    /// Get the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Control(e) => StatusCode::from_u16(e.http_status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        }
    }

    /// Get the error code string for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::Control(e) => e.code(),
        }
    }

    /// Message shown to the client. Server-side failures are logged in full
    /// and summarized.
    fn public_message(&self) -> String {
        match self {
            Self::Control(ControlError::Store(e)) => {
                tracing::error!(error = %e, "Store error");
                if self.status_code() == StatusCode::SERVICE_UNAVAILABLE {
                    "storage is temporarily unavailable".to_string()
                } else {
                    "storage error".to_string()
                }
            }
            Self::Control(ControlError::Internal(msg)) => {
                tracing::error!(error = %msg, "Internal error");
                "internal error".to_string()
            }
            Self::Control(ControlError::Upstream(msg)) => {
                tracing::warn!(error = %msg, "Voice platform error");
                "voice platform is temporarily unavailable".to_string()
            }
            Self::Control(ControlError::Auth(e)) if self.status_code().is_server_error() => {
                tracing::error!(error = %e, "Telegram error");
                e.to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.public_message();

        let body = ErrorResponse {
            error: ErrorBody { code, message },
        };

        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}
