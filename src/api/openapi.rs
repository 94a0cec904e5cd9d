//! OpenAPI documentation and schema generation
//!
//! Describes the control protocol using utoipa for compile-time spec
//! generation.

use utoipa::OpenApi;

/// OpenAPI documentation for the meshcopy control protocol
///
/// The spec can be accessed via:
/// - `/api/openapi.json` - JSON format OpenAPI specification
/// - `/swagger-ui` - Interactive Swagger UI documentation (if enabled)
#[derive(OpenApi)]
#[openapi(
    info(
        title = "meshcopy control API",
        version = "0.1.0",
        description = "Control protocol of a meshcopy node: health, node registry, point-to-point transfers and fan-out",
        license(
            name = "MIT OR Apache-2.0"
        )
    ),
    servers(
        (url = "http://localhost:7000", description = "Local node")
    ),
    paths(
        // System
        crate::api::routes::health_check,
        crate::api::routes::openapi_spec,
        crate::api::routes::event_stream,

        // Node registry
        crate::api::routes::register_node,
        crate::api::routes::list_nodes,
        crate::api::routes::send_all,

        // Transfers
        crate::api::routes::send_file,
        crate::api::routes::download_file,
    ),
    components(schemas(
        // Core types from types.rs
        crate::types::PackMode,
        crate::types::NodeRecord,
        crate::types::Event,

        // Request/response bodies
        crate::types::RegisterNodeRequest,
        crate::types::SendFileRequest,
        crate::types::DownloadFileRequest,
        crate::types::SendAllRequest,
        crate::types::StatusResponse,
        crate::types::HealthResponse,
        crate::types::NodesResponse,
        crate::types::DownloadFileResponse,
        crate::types::SendFileResponse,
        crate::types::TargetOutcome,
        crate::types::FanoutReport,

        // Config types from config.rs
        crate::config::NodeRole,
        crate::config::Config,
        crate::config::TransferConfig,
        crate::config::ArchiveToolsConfig,
        crate::config::ApiConfig,

        // Error types from error.rs
        crate::error::ApiError,
    )),
    tags(
        (name = "system", description = "System endpoints - Health checks, OpenAPI spec, events"),
        (name = "nodes", description = "Master only - Node registry and fan-out"),
        (name = "transfer", description = "Transfers - Push a file to a node, pull a file from a data listener"),
    )
)]
pub struct ApiDoc;
