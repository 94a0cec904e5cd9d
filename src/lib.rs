//! # meshcopy
//!
//! Push files and directories between machines over plain HTTP, without a
//! shared filesystem.
//!
//! ## How it works
//!
//! Every node runs a long-lived **control server**. To move a file, the
//! source node packs it (optionally), opens a short-lived **data listener**
//! serving exactly that file, and asks the target's control server to pull
//! it. The listener is torn down before the source answers.
//!
//! A node started as **master** also keeps a registry of nodes and can fan
//! a single file out from one source to every other registered node, one
//! target at a time.
//!
//! ## Quick Start
//!
//! ```no_run
//! use meshcopy::{Config, Node};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config {
//!         master: true,
//!         public_host: Some("10.0.0.1".to_string()),
//!         ..Default::default()
//!     };
//!
//!     let node = Arc::new(Node::new(config).await?);
//!
//!     // Subscribe to events
//!     let mut events = node.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     // Serve until SIGINT/SIGTERM
//!     meshcopy::run_with_shutdown(node).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Control API server
pub mod api;
/// Packing and unpacking of transfer artifacts
pub mod archive;
/// Control-plane HTTP client
pub mod client;
/// Configuration types
pub mod config;
/// Pull side of a transfer
pub mod download;
/// Error types
pub mod error;
/// Fan-out from one source to every registered node
pub mod fanout;
/// Node wiring and operations
pub mod node;
/// Node registry
pub mod registry;
/// Push side of a transfer
pub mod transfer;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use archive::{ArchiveCapabilities, ArchiveHandler, CliArchiveHandler, NoOpArchiveHandler};
pub use client::ControlClient;
pub use config::{Config, NodeRole};
pub use error::{ApiError, Error, Result, ToHttpStatus};
pub use node::Node;
pub use registry::NodeRegistry;
pub use types::{
    Event, FanoutReport, NodeRecord, PackMode, SendAllRequest, SendFileRequest, TargetOutcome,
    TransferArtifact,
};

use std::sync::Arc;

/// Serve the control API until a termination signal arrives.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// In-flight requests (including transfers) are allowed to finish.
///
/// # Example
///
/// ```no_run
/// use meshcopy::{Config, Node, run_with_shutdown};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let node = Arc::new(Node::new(Config::default()).await?);
///
///     // Run with automatic signal handling
///     run_with_shutdown(node).await?;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(node: Arc<Node>) -> Result<()> {
    let listener = api::bind_control(&node).await?;
    api::serve_control(listener, node, wait_for_signal()).await
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
