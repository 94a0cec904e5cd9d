//! Error types for meshcopy
//!
//! This module provides the error model shared by every component:
//! - Domain errors for the control plane, data plane and archive contract
//! - HTTP status code mapping for the control protocol
//! - The JSON error body returned to callers

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use utoipa::ToSchema;

/// Result type alias for meshcopy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for meshcopy
///
/// Each variant carries enough context to be logged on its own. The control
/// protocol maps variants onto HTTP status codes through [`ToHttpStatus`].
#[derive(Debug, Error)]
pub enum Error {
    /// Request body could not be parsed or is missing required fields
    #[error("{0}")]
    MalformedRequest(String),

    /// Source file or directory does not exist
    #[error("filePath not found: {}", path.display())]
    PathNotFound {
        /// The path that was requested
        path: PathBuf,
    },

    /// The archive contract could not produce an artifact
    ///
    /// The control protocol reports this as a malformed request (400). The
    /// conflation is part of the wire contract; handlers log it separately.
    #[error("archive preparation failed for {}: {reason}", path.display())]
    ArchivePreparationFailed {
        /// The input path that was being archived
        path: PathBuf,
        /// What the archive engine reported
        reason: String,
    },

    /// A peer's control server did not answer
    #[error("no response from {target}: {reason}")]
    RemoteUnreachable {
        /// `host:port` of the peer
        target: String,
        /// Transport-level reason
        reason: String,
    },

    /// A pull from a data listener failed (transport error or non-200 status)
    #[error("download failed from {url}: {reason}")]
    DownloadFailed {
        /// The data-plane URL
        url: String,
        /// Status code or transport reason
        reason: String,
    },

    /// Destination file could not be opened for writing
    #[error("cannot open destination {}: {reason}", path.display())]
    CannotOpenDestination {
        /// The destination path
        path: PathBuf,
        /// The underlying I/O reason
        reason: String,
    },

    /// URL is not of the form `http://host[:port]/path`
    #[error("{0}")]
    InvalidUrl(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "bind_port")
        key: Option<String>,
    },

    /// External tool execution failed (tar, gzip, ...)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, unsupported pack mode, ...)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// Control or data server error
    #[error("API server error: {0}")]
    ApiServerError(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Error body returned by the control protocol
///
/// # Example JSON Response
///
/// ```json
/// {
///   "error": "filePath not found: /data/missing.txt",
///   "code": "path_not_found"
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApiError {
    /// Human-readable error message
    pub error: String,

    /// Machine-readable error code (e.g., "malformed_request")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Optional additional context about the error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with code and message
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            code: Some(code.into()),
            details: None,
        }
    }

    /// Create the generic "invalid json" error
    pub fn invalid_json() -> Self {
        Self::new("malformed_request", "invalid json")
    }
}

/// Convert errors to HTTP status codes for API responses
pub trait ToHttpStatus {
    /// Get the HTTP status code for this error
    fn status_code(&self) -> u16;

    /// Get the machine-readable error code
    fn error_code(&self) -> &str;
}

impl ToHttpStatus for Error {
    fn status_code(&self) -> u16 {
        match self {
            // 400 Bad Request
            Error::MalformedRequest(_) => 400,
            Error::PathNotFound { .. } => 400,
            Error::InvalidUrl(_) => 400,
            Error::Config { .. } => 400,
            // Not a client error, but the control protocol has always reported it as one
            Error::ArchivePreparationFailed { .. } => 400,

            // 500 Internal Server Error - peer and local disk failures
            Error::RemoteUnreachable { .. } => 500,
            Error::DownloadFailed { .. } => 500,
            Error::CannotOpenDestination { .. } => 500,
            Error::ExternalTool(_) => 500,
            Error::ApiServerError(_) => 500,
            Error::Io(_) => 500,
            Error::Network(_) => 500,
            Error::Serialization(_) => 500,

            // 501 Not Implemented
            Error::NotSupported(_) => 501,
        }
    }

    fn error_code(&self) -> &str {
        match self {
            Error::MalformedRequest(_) => "malformed_request",
            Error::PathNotFound { .. } => "path_not_found",
            Error::ArchivePreparationFailed { .. } => "malformed_request",
            Error::RemoteUnreachable { .. } => "remote_unreachable",
            Error::DownloadFailed { .. } => "download_failed",
            Error::CannotOpenDestination { .. } => "cannot_open_destination",
            Error::InvalidUrl(_) => "invalid_url",
            Error::Config { .. } => "config_error",
            Error::ExternalTool(_) => "external_tool_error",
            Error::NotSupported(_) => "not_supported",
            Error::ApiServerError(_) => "api_server_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
        }
    }
}

impl From<Error> for ApiError {
    fn from(error: Error) -> Self {
        let code = error.error_code().to_string();
        let message = error.to_string();

        let details = match &error {
            Error::PathNotFound { path } => Some(serde_json::json!({
                "path": path,
            })),
            Error::CannotOpenDestination { path, .. } => Some(serde_json::json!({
                "path": path,
            })),
            Error::DownloadFailed { url, .. } => Some(serde_json::json!({
                "url": url,
            })),
            Error::RemoteUnreachable { target, .. } => Some(serde_json::json!({
                "target": target,
            })),
            _ => None,
        };

        ApiError {
            error: message,
            code: Some(code),
            details,
        }
    }
}
