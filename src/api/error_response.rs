//! HTTP error response handling for the control API
//!
//! Converts domain errors into HTTP responses with the status code from
//! [`ToHttpStatus`] and an [`ApiError`] JSON body.

use crate::error::{ApiError, Error, ToHttpStatus};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Implement IntoResponse for Error to automatically convert errors to HTTP responses
impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        match &self {
            // Reported as a bad request on the wire; keep it apart in the logs
            Error::ArchivePreparationFailed { path, reason } => tracing::warn!(
                error_kind = "archive_preparation_failed",
                path = ?path,
                reason = %reason,
                "archive preparation failed, answering 400"
            ),
            e if status_code.is_server_error() => {
                tracing::error!(error = %e, code = e.error_code(), "request failed")
            }
            e => tracing::debug!(error = %e, code = e.error_code(), "request rejected"),
        }

        let api_error: ApiError = self.into();

        (status_code, Json(api_error)).into_response()
    }
}

/// Implement IntoResponse for ApiError for explicit error responses
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // Bare ApiErrors carry no status of their own
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}
