//! Control server
//!
//! Every node runs one long-lived control server. Master-only routes are
//! mounted only when the node is configured as master.

use crate::config::NodeRole;
use crate::node::Node;
use crate::{Error, Result};
use axum::{
    Router,
    routing::{get, post},
};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the control router
///
/// # Routes
///
/// ## Every node
/// - `GET /api/health` - Health check
/// - `POST /api/send-file` - Push a local file to a target node
/// - `POST /api/download-file` - Pull a file from a data listener
/// - `GET /api/events` - Server-sent events stream
/// - `GET /api/openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive Swagger UI documentation (if enabled)
///
/// ## Master only
/// - `POST /api/register-node` - Add or refresh a node
/// - `GET /api/nodes` - Registry snapshot
/// - `POST /api/send-all` - Fan a file out to every other node
pub fn create_router(node: Arc<Node>) -> Router {
    let master = node.config().master;
    let swagger_ui = node.config().api.swagger_ui;
    let state = AppState::new(node);

    let router = Router::new()
        .route("/api/health", get(routes::health_check))
        .route("/api/send-file", post(routes::send_file))
        .route("/api/download-file", post(routes::download_file))
        .route("/api/events", get(routes::event_stream))
        .route("/api/openapi.json", get(routes::openapi_spec));

    let router = if master {
        router
            .route("/api/register-node", post(routes::register_node))
            .route("/api/nodes", get(routes::list_nodes))
            .route("/api/send-all", post(routes::send_all))
    } else {
        router
    };

    // Swagger UI serves its own copy of the document
    let router = if swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    router.with_state(state).layer(TraceLayer::new_for_http())
}

/// Bind the configured control address and serve until the process ends
///
/// # Example
///
/// ```no_run
/// use meshcopy::{Config, Node};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let node = Arc::new(Node::new(Config::default()).await?);
///
/// // Start control server (blocks until shutdown)
/// meshcopy::api::start_control_server(node).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_control_server(node: Arc<Node>) -> Result<()> {
    let listener = bind_control(&node).await?;
    serve_control(listener, node, std::future::pending()).await
}

/// Bind the control listener on the configured address
pub async fn bind_control(node: &Node) -> Result<TcpListener> {
    let bind_address = node.config().bind_address()?;
    TcpListener::bind(bind_address).await.map_err(|e| {
        Error::ApiServerError(format!("cannot bind control port {}: {}", bind_address, e))
    })
}

/// Serve the control API on `listener` until `shutdown` resolves
///
/// A worker announces itself to its master once the listener is up;
/// a failed announcement is logged and serving continues.
pub async fn serve_control<F>(listener: TcpListener, node: Arc<Node>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let address = listener.local_addr()?;
    tracing::info!(
        address = %address,
        role = %node.role(),
        "control server listening"
    );

    if node.role() == NodeRole::Worker {
        let worker = node.clone();
        tokio::spawn(async move {
            if let Err(e) = worker.register_with_master().await {
                tracing::warn!(error = %e, "registration with master failed");
            }
        });
    }

    let app = create_router(node);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| Error::ApiServerError(e.to_string()))?;

    tracing::info!("control server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
