//! Meeting service error types.
//!
//! All errors map to HTTP status codes via the `IntoResponse` impl. Client
//! errors (4xx) render as `{"error": "..."}`; server errors (5xx) render as
//! `{"success": false, "error": "..."}`. Storage failures pass the underlying
//! message through to the caller.

use crate::repositories::StoreError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Meeting service error type.
///
/// Maps to HTTP status codes:
/// - Validation, DuplicateParticipant: 400 Bad Request
/// - NotParticipant: 403 Forbidden
/// - NotFound: 404 Not Found
/// - Storage, Internal: 500 Internal Server Error
/// - BadGateway: 502 Bad Gateway
/// - ServiceUnavailable: 503 Service Unavailable
#[derive(Debug, Error)]
pub enum MeetingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate participant: {0}")]
    DuplicateParticipant(String),

    #[error("Not a participant: {0}")]
    NotParticipant(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Bad gateway: {0}")]
    BadGateway(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MeetingError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            MeetingError::Validation(_) | MeetingError::DuplicateParticipant(_) => 400,
            MeetingError::NotParticipant(_) => 403,
            MeetingError::NotFound(_) => 404,
            MeetingError::Storage(_) | MeetingError::Internal(_) => 500,
            MeetingError::BadGateway(_) => 502,
            MeetingError::ServiceUnavailable(_) => 503,
        }
    }

    /// Bounded label used for operation metrics.
    pub fn error_type(&self) -> &'static str {
        match self {
            MeetingError::Validation(_) => "validation",
            MeetingError::NotFound(_) => "not_found",
            MeetingError::DuplicateParticipant(_) => "duplicate_participant",
            MeetingError::NotParticipant(_) => "not_participant",
            MeetingError::Storage(_) => "storage",
            MeetingError::BadGateway(_) => "bad_gateway",
            MeetingError::ServiceUnavailable(_) => "service_unavailable",
            MeetingError::Internal(_) => "internal",
        }
    }
}

/// 4xx body.
#[derive(Serialize)]
struct ClientErrorBody {
    error: String,
}

/// 5xx body.
#[derive(Serialize)]
struct ServerErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for MeetingError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match self {
            MeetingError::Validation(message)
            | MeetingError::NotFound(message)
            | MeetingError::DuplicateParticipant(message)
            | MeetingError::NotParticipant(message) => {
                (status, Json(ClientErrorBody { error: message })).into_response()
            }
            MeetingError::Storage(message) => {
                tracing::error!(target: "meeting.storage", error = %message, "Store operation failed");
                server_error(status, message)
            }
            MeetingError::BadGateway(message) => {
                tracing::warn!(target: "meeting.upstream", reason = %message, "Upstream returned an unusable reply");
                server_error(status, message)
            }
            MeetingError::ServiceUnavailable(message) => {
                tracing::warn!(target: "meeting.availability", reason = %message, "Service unavailable");
                server_error(status, message)
            }
            MeetingError::Internal(message) => {
                tracing::error!(target: "meeting.internal", error = %message, "Internal error");
                server_error(status, message)
            }
        }
    }
}

fn server_error(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(ServerErrorBody {
            success: false,
            error,
        }),
    )
        .into_response()
}

impl From<StoreError> for MeetingError {
    fn from(err: StoreError) -> Self {
        MeetingError::Storage(err.to_string())
    }
}
