//! Maps domain `AppError` to HTTP responses.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use examhall_core::error::{AppError, ErrorKind};

/// Standard API error response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorResponse {
    /// Machine-readable error code.
    pub error: String,
    /// Human-readable message.
    pub message: String,
}

/// Wrapper so `?` works in handlers without an orphan-rule clash.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = match err.kind {
            ErrorKind::UnknownSession | ErrorKind::UnknownParticipant => StatusCode::NOT_FOUND,
            ErrorKind::InvalidTransition
            | ErrorKind::TimerAlreadyRunning
            | ErrorKind::TimerNotRunning
            | ErrorKind::NotPaused => StatusCode::CONFLICT,
            ErrorKind::TargetUnreachable => StatusCode::BAD_GATEWAY,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::Validation | ErrorKind::Serialization => StatusCode::BAD_REQUEST,
            ErrorKind::Configuration | ErrorKind::Internal => {
                tracing::error!(error = %err.message, "Internal server error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ApiErrorResponse {
            error: err.kind.to_string(),
            message: err.message,
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_kinds_map_to_409() {
        for kind in [
            ErrorKind::InvalidTransition,
            ErrorKind::TimerAlreadyRunning,
            ErrorKind::NotPaused,
        ] {
            let response = ApiError(AppError::new(kind, "x")).into_response();
            assert_eq!(response.status(), StatusCode::CONFLICT);
        }
    }

    #[test]
    fn test_unknown_session_maps_to_404() {
        let response = ApiError(AppError::unknown_session("missing")).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
