//! Node registry handlers (master only).

use super::parse_json;
use crate::api::AppState;
use crate::error::Result;
use crate::types::{NodesResponse, RegisterNodeRequest, StatusResponse};
use axum::{Json, body::Bytes, extract::State};

/// POST /api/register-node - Add or refresh a node
#[utoipa::path(
    post,
    path = "/api/register-node",
    tag = "nodes",
    request_body = RegisterNodeRequest,
    responses(
        (status = 200, description = "Node registered", body = StatusResponse),
        (status = 400, description = "Invalid JSON or missing host/ctrlPort", body = crate::error::ApiError)
    )
)]
pub async fn register_node(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusResponse>> {
    let request: RegisterNodeRequest = parse_json(&body)?;
    state.node.register_node(request).await?;
    Ok(Json(StatusResponse::ok()))
}

/// GET /api/nodes - Registry snapshot
#[utoipa::path(
    get,
    path = "/api/nodes",
    tag = "nodes",
    responses(
        (status = 200, description = "Every known node in registration order", body = NodesResponse)
    )
)]
pub async fn list_nodes(State(state): State<AppState>) -> Json<NodesResponse> {
    Json(NodesResponse {
        nodes: state.node.nodes().await,
    })
}
