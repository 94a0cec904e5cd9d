//! A running node
//!
//! [`Node`] wires configuration, registry, archive handler, HTTP client and
//! the event channel together and exposes one method per control operation.
//! The control API is a thin layer over these methods.

use crate::archive::{ArchiveHandler, CliArchiveHandler, NoOpArchiveHandler};
use crate::client::ControlClient;
use crate::config::{Config, NodeRole};
use crate::download::{DownloadExecutor, DownloadJob};
use crate::error::{Error, Result};
use crate::fanout::FanoutCoordinator;
use crate::registry::NodeRegistry;
use crate::transfer::TransferEngine;
use crate::types::{
    DownloadFileRequest, DownloadFileResponse, Event, FanoutReport, NodeRecord,
    RegisterNodeRequest, SendAllRequest, SendFileRequest, SendFileResponse,
};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Shared state and operations of one node
pub struct Node {
    config: Arc<Config>,
    registry: Arc<NodeRegistry>,
    client: ControlClient,
    transfer: TransferEngine,
    downloads: DownloadExecutor,
    fanout: FanoutCoordinator,
    event_tx: broadcast::Sender<Event>,
}

impl Node {
    /// Build a node from its configuration
    ///
    /// Picks the archive handler, creates the event channel and, on a
    /// master, registers the master itself.
    pub async fn new(config: Config) -> Result<Self> {
        let artifact_dir = config.transfer.artifact_dir();
        tokio::fs::create_dir_all(&artifact_dir).await.map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to create temp directory '{}': {}",
                    artifact_dir.display(),
                    e
                ),
            ))
        })?;

        let archive = select_archive_handler(&config);
        let caps = archive.capabilities();
        tracing::info!(
            archive_handler = archive.name(),
            can_pack = caps.can_pack,
            can_extract = caps.can_extract,
            "Archive handler initialized"
        );

        Self::with_archive_handler(config, archive).await
    }

    /// Build a node around an explicit archive handler
    pub async fn with_archive_handler(
        config: Config,
        archive: Arc<dyn ArchiveHandler>,
    ) -> Result<Self> {
        // Buffer up to 1000 events per subscriber
        let (event_tx, _rx) = broadcast::channel(1000);
        let client = ControlClient::new(config.transfer.http_timeout)?;
        let registry = Arc::new(NodeRegistry::new());
        let config = Arc::new(config);

        let node = Self {
            transfer: TransferEngine::new(archive.clone(), client.clone(), event_tx.clone()),
            downloads: DownloadExecutor::new(archive, client.clone(), event_tx.clone()),
            fanout: FanoutCoordinator::new(registry.clone(), client.clone()),
            config,
            registry,
            client,
            event_tx,
        };

        if node.config.master {
            node.registry.self_register(&node.config).await;
        }

        Ok(node)
    }

    /// The configuration this node was started with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Role derived from configuration
    pub fn role(&self) -> NodeRole {
        self.config.role()
    }

    /// Subscribe to node events
    ///
    /// Each subscriber receives every event independently; one that falls
    /// more than 1000 events behind gets `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Publish an event to all subscribers
    pub fn emit_event(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Add or refresh a node in the registry
    pub async fn register_node(&self, request: RegisterNodeRequest) -> Result<()> {
        let host = request.host.filter(|h| !h.is_empty());
        let ctrl_port = request.ctrl_port.filter(|p| *p != 0);
        let (Some(host), Some(ctrl_port)) = (host, ctrl_port) else {
            return Err(Error::MalformedRequest("host, ctrlPort required".to_string()));
        };
        let name = request.name.unwrap_or_default();

        self.registry.upsert(&host, ctrl_port, &name).await;
        self.emit_event(Event::NodeRegistered {
            host,
            ctrl_port,
            name,
        });
        Ok(())
    }

    /// Snapshot of the registry
    pub async fn nodes(&self) -> Vec<NodeRecord> {
        self.registry.list().await
    }

    /// Push a local file to a target node
    pub async fn send_file(&self, request: SendFileRequest) -> Result<SendFileResponse> {
        let transfer = request.into_transfer(
            self.config.bind_port,
            self.config.transfer.default_data_port,
        )?;
        self.transfer.send(&transfer).await
    }

    /// Pull a file from a data listener
    pub async fn download_file(&self, request: DownloadFileRequest) -> Result<DownloadFileResponse> {
        let job = DownloadJob::try_from(request)?;
        let saved = self.downloads.execute(&job).await?;
        Ok(DownloadFileResponse {
            status: "ok".to_string(),
            saved: saved.to_string_lossy().into_owned(),
        })
    }

    /// Fan a file out from a source to every other registered node
    pub async fn send_all(&self, request: SendAllRequest) -> Result<FanoutReport> {
        let fanout = request.into_fanout(
            self.config.bind_port,
            self.config.transfer.default_data_port,
        )?;
        Ok(self.fanout.run(&fanout).await)
    }

    /// Announce this node to its configured master
    ///
    /// Does nothing unless the node is a worker.
    pub async fn register_with_master(&self) -> Result<()> {
        if self.role() != NodeRole::Worker {
            return Ok(());
        }
        let Some(master_host) = self.config.master_host.as_deref() else {
            return Ok(());
        };

        let request = RegisterNodeRequest {
            host: Some(self.config.advertised_host().to_string()),
            ctrl_port: Some(self.config.bind_port),
            name: Some(self.config.display_name().to_string()),
        };
        self.client
            .register_node(master_host, self.config.master_port, &request)
            .await?;

        tracing::info!(
            master_host,
            master_port = self.config.master_port,
            host = self.config.advertised_host(),
            ctrl_port = self.config.bind_port,
            "registered with master"
        );
        Ok(())
    }
}

/// Explicit binaries win, then PATH lookup, then the no-op handler
fn select_archive_handler(config: &Config) -> Arc<dyn ArchiveHandler> {
    let out = config.transfer.artifact_dir();
    let tools = &config.archive;

    if let (Some(tar), Some(gzip)) = (&tools.tar_path, &tools.gzip_path) {
        return Arc::new(CliArchiveHandler::new(tar.clone(), gzip.clone(), out));
    }
    if !tools.search_path {
        return Arc::new(NoOpArchiveHandler);
    }

    let found = which::which("tar")
        .ok()
        .zip(which::which("gzip").ok())
        .map(|(tar, gzip)| {
            CliArchiveHandler::new(
                tools.tar_path.clone().unwrap_or(tar),
                tools.gzip_path.clone().unwrap_or(gzip),
                out,
            )
        });
    match found {
        Some(handler) => Arc::new(handler),
        None => {
            tracing::warn!("tar/gzip not found in PATH, only raw files can be sent");
            Arc::new(NoOpArchiveHandler)
        }
    }
}
