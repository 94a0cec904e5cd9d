//! Transfer handlers: push, pull and fan-out.

use super::parse_json;
use crate::api::AppState;
use crate::error::{ApiError, Error, Result, ToHttpStatus};
use crate::types::{
    DownloadFileRequest, DownloadFileResponse, FanoutReport, SendAllRequest, SendFileRequest,
};
use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// POST /api/send-file - Push a local file or directory to a target node
///
/// Blocks until the target has pulled (and, if asked, extracted) the file.
#[utoipa::path(
    post,
    path = "/api/send-file",
    tag = "transfer",
    request_body = SendFileRequest,
    responses(
        (status = 200, description = "Target reported success", body = crate::types::SendFileResponse),
        (status = 400, description = "Invalid JSON, missing fields, missing path, or archive failure", body = ApiError),
        (status = 500, description = "Target download failed", body = ApiError)
    )
)]
pub async fn send_file(State(state): State<AppState>, body: Bytes) -> Response {
    let request: SendFileRequest = match parse_json(&body) {
        Ok(request) => request,
        Err(e) => return e.into_response(),
    };

    match state.node.send_file(request).await {
        Ok(response) => Json(response).into_response(),
        Err(e @ (Error::RemoteUnreachable { .. } | Error::DownloadFailed { .. })) => {
            target_download_failed(e)
        }
        Err(e) => e.into_response(),
    }
}

fn target_download_failed(error: Error) -> Response {
    tracing::warn!(error = %error, "target download failed");
    let body = ApiError {
        error: "target download failed".to_string(),
        code: Some(error.error_code().to_string()),
        details: Some(serde_json::json!({ "reason": error.to_string() })),
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

/// POST /api/download-file - Pull a file from a data listener
#[utoipa::path(
    post,
    path = "/api/download-file",
    tag = "transfer",
    request_body = DownloadFileRequest,
    responses(
        (status = 200, description = "File saved", body = DownloadFileResponse),
        (status = 400, description = "Invalid JSON, missing fields, or unsupported URL", body = ApiError),
        (status = 500, description = "Download failed or destination not writable", body = ApiError)
    )
)]
pub async fn download_file(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<DownloadFileResponse>> {
    let request: DownloadFileRequest = parse_json(&body)?;
    Ok(Json(state.node.download_file(request).await?))
}

/// POST /api/send-all - Fan a file out from a source to every other node (master only)
///
/// Per-target failures are reported inside the body; the response itself is 200.
#[utoipa::path(
    post,
    path = "/api/send-all",
    tag = "nodes",
    request_body = SendAllRequest,
    responses(
        (status = 200, description = "Every target was attempted", body = FanoutReport),
        (status = 400, description = "Invalid JSON or missing sourceHost/sourceFile", body = ApiError)
    )
)]
pub async fn send_all(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<FanoutReport>> {
    let request: SendAllRequest = parse_json(&body)?;
    Ok(Json(state.node.send_all(request).await?))
}
