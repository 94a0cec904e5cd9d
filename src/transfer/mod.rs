//! Transfer engine (source side of a push)
//!
//! One call to [`TransferEngine::send`] prepares an artifact, serves it on a
//! fresh data listener, asks the target to pull it, and tears everything
//! down again before returning.

mod data_server;

pub use data_server::DataServer;

use crate::archive::ArchiveHandler;
use crate::client::ControlClient;
use crate::error::{Error, Result};
use crate::types::{DownloadFileRequest, Event, SendFileResponse, TransferArtifact, TransferRequest};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Pushes local files to other nodes
#[derive(Clone)]
pub struct TransferEngine {
    archive: Arc<dyn ArchiveHandler>,
    client: ControlClient,
    event_tx: broadcast::Sender<Event>,
}

impl TransferEngine {
    /// Create an engine using the given archive handler and control client
    pub fn new(
        archive: Arc<dyn ArchiveHandler>,
        client: ControlClient,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            archive,
            client,
            event_tx,
        }
    }

    /// Push `request.file_path` to the target and return the target's answer
    ///
    /// The data listener is stopped and a synthesized artifact deleted on
    /// every path out of this function, including target failures.
    pub async fn send(&self, request: &TransferRequest) -> Result<SendFileResponse> {
        if tokio::fs::metadata(&request.file_path).await.is_err() {
            return Err(Error::PathNotFound {
                path: request.file_path.clone(),
            });
        }

        let artifact = self
            .archive
            .prepare(&request.file_path, request.pack_mode)
            .await
            .map_err(|e| match e {
                Error::PathNotFound { .. } | Error::ArchivePreparationFailed { .. } => e,
                other => Error::ArchivePreparationFailed {
                    path: request.file_path.clone(),
                    reason: other.to_string(),
                },
            })?;

        let server = match DataServer::start(request.data_port, &artifact).await {
            Ok(server) => server,
            Err(e) => {
                self.archive.discard(&artifact).await;
                return Err(e);
            }
        };

        let data_port = server.local_addr().port();
        tracing::info!(
            path = ?request.file_path,
            target_host = %request.target_host,
            target_ctrl_port = request.target_ctrl_port,
            data_port,
            pack_mode = %request.pack_mode,
            "transfer started"
        );
        self.emit(Event::TransferStarted {
            path: request.file_path.clone(),
            target_host: request.target_host.clone(),
            target_ctrl_port: request.target_ctrl_port,
            data_port,
        });

        let outcome = self.instruct_target(request, &artifact, data_port).await;

        server.shutdown().await;
        self.archive.discard(&artifact).await;

        match &outcome {
            Ok(_) => tracing::info!(
                path = ?request.file_path,
                target_host = %request.target_host,
                target_ctrl_port = request.target_ctrl_port,
                "transfer finished"
            ),
            Err(e) => tracing::warn!(
                path = ?request.file_path,
                target_host = %request.target_host,
                target_ctrl_port = request.target_ctrl_port,
                error = %e,
                "transfer failed"
            ),
        }
        self.emit(Event::TransferFinished {
            path: request.file_path.clone(),
            target_host: request.target_host.clone(),
            target_ctrl_port: request.target_ctrl_port,
            ok: outcome.is_ok(),
        });

        outcome
    }

    async fn instruct_target(
        &self,
        request: &TransferRequest,
        artifact: &TransferArtifact,
        data_port: u16,
    ) -> Result<SendFileResponse> {
        let url = format!("http://{}:{}/download", request.source_host, data_port);
        let body = DownloadFileRequest {
            url: Some(url.clone()),
            file_name: Some(artifact.logical_name.clone()),
            save_dir: Some(request.target_save.clone()),
            progress: request.progress,
            auto_extract: request.auto_extract,
        };

        let response = self
            .client
            .download_file(&request.target_host, request.target_ctrl_port, &body)
            .await?;
        let status = response.status();
        let text = response.text().await.map_err(|e| Error::RemoteUnreachable {
            target: format!("{}:{}", request.target_host, request.target_ctrl_port),
            reason: e.to_string(),
        })?;

        if status != reqwest::StatusCode::OK {
            return Err(Error::DownloadFailed {
                url,
                reason: format!("target answered {}: {}", status, text),
            });
        }

        Ok(match serde_json::from_str(&text) {
            Ok(detail) => SendFileResponse {
                status: "ok".to_string(),
                detail: Some(detail),
                detail_raw: None,
            },
            Err(_) => SendFileResponse {
                status: "ok".to_string(),
                detail: None,
                detail_raw: Some(text),
            },
        })
    }

    fn emit(&self, event: Event) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::{ArchiveCapabilities, NoOpArchiveHandler};
    use crate::types::PackMode;
    use async_trait::async_trait;
    use std::path::{Path, PathBuf};
    use std::time::Duration;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    /// Copies the input into a scratch directory and marks it for deletion
    struct CopyingHandler {
        out: PathBuf,
    }

    #[async_trait]
    impl ArchiveHandler for CopyingHandler {
        async fn prepare(&self, input: &Path, _mode: PackMode) -> Result<TransferArtifact> {
            let name = format!("{}.copy", input.file_name().unwrap().to_string_lossy());
            let path = self.out.join(&name);
            tokio::fs::copy(input, &path).await?;
            Ok(TransferArtifact {
                path,
                logical_name: name,
                delete_after_use: true,
            })
        }

        async fn extract(&self, _archive: &Path) -> Result<()> {
            Ok(())
        }

        fn capabilities(&self) -> ArchiveCapabilities {
            ArchiveCapabilities {
                can_pack: true,
                can_extract: true,
            }
        }

        fn name(&self) -> &'static str {
            "copy"
        }
    }

    fn engine(archive: Arc<dyn ArchiveHandler>) -> (TransferEngine, broadcast::Receiver<Event>) {
        let (tx, rx) = broadcast::channel(16);
        let client = ControlClient::new(Duration::from_secs(5)).unwrap();
        (TransferEngine::new(archive, client, tx), rx)
    }

    fn request(file_path: PathBuf, target: &MockServer) -> TransferRequest {
        TransferRequest {
            file_path,
            data_port: 0,
            source_host: "127.0.0.1".into(),
            target_host: target.address().ip().to_string(),
            target_ctrl_port: target.address().port(),
            target_save: "/srv/in".into(),
            pack_mode: PackMode::None,
            auto_extract: false,
            progress: false,
        }
    }

    /// Target that pulls the advertised URL before answering, like a real node
    struct PullingTarget;

    impl wiremock::Respond for PullingTarget {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let body: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
            let url = body["url"].as_str().unwrap().to_string();
            // Respond runs synchronously; pull on a separate thread
            let pulled = std::thread::spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(async { reqwest::get(&url).await?.bytes().await })
            })
            .join()
            .unwrap()
            .unwrap();
            ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "ok",
                "saved": format!("/srv/in/{}", body["fileName"].as_str().unwrap()),
                "bytes": pulled.len(),
            }))
        }
    }

    #[tokio::test]
    async fn missing_path_fails_before_anything_starts() {
        let target = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&target)
            .await;

        let (engine, _rx) = engine(Arc::new(NoOpArchiveHandler));
        let err = engine
            .send(&request(PathBuf::from("/definitely/not/here.txt"), &target))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PathNotFound { .. }));
    }

    #[tokio::test]
    async fn raw_file_is_pulled_by_target_and_detail_returned() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("x.txt");
        std::fs::write(&file, b"hello world").unwrap();

        let target = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download-file"))
            .respond_with(PullingTarget)
            .expect(1)
            .mount(&target)
            .await;

        let (engine, mut rx) = engine(Arc::new(NoOpArchiveHandler));
        let response = engine.send(&request(file.clone(), &target)).await.unwrap();

        assert_eq!(response.status, "ok");
        let detail = response.detail.unwrap();
        assert_eq!(detail["saved"], "/srv/in/x.txt");
        assert_eq!(detail["bytes"], 11);
        // Raw inputs are never deleted
        assert!(file.exists());

        assert!(matches!(rx.recv().await.unwrap(), Event::TransferStarted { .. }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::TransferFinished { ok: true, .. }
        ));
    }

    #[tokio::test]
    async fn download_request_carries_name_and_flags() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("x.txt");
        std::fs::write(&file, b"x").unwrap();

        let target = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download-file"))
            .respond_with(ResponseTemplate::new(200).set_body_string("done"))
            .mount(&target)
            .await;

        let (engine, _rx) = engine(Arc::new(NoOpArchiveHandler));
        let mut req = request(file, &target);
        req.auto_extract = true;
        req.progress = true;
        let response = engine.send(&req).await.unwrap();
        assert_eq!(response.detail_raw.as_deref(), Some("done"));

        let received = target.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
        assert_eq!(body["fileName"], "x.txt");
        assert_eq!(body["saveDir"], "/srv/in");
        assert_eq!(body["autoExtract"], true);
        assert_eq!(body["progress"], true);
        assert!(
            body["url"]
                .as_str()
                .unwrap()
                .starts_with("http://127.0.0.1:")
        );
        assert!(body["url"].as_str().unwrap().ends_with("/download"));
    }

    #[tokio::test]
    async fn target_failure_still_tears_down_listener_and_artifact() {
        let source_dir = TempDir::new().unwrap();
        let scratch = TempDir::new().unwrap();
        let file = source_dir.path().join("x.txt");
        std::fs::write(&file, b"payload").unwrap();

        let target = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/download-file"))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "download failed"})))
            .mount(&target)
            .await;

        let handler = CopyingHandler {
            out: scratch.path().to_path_buf(),
        };
        let (engine, _rx) = engine(Arc::new(handler));

        // Fixed port so the test can prove it was released
        let port = {
            let probe = std::net::TcpListener::bind("0.0.0.0:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let mut req = request(file, &target);
        req.data_port = port;

        let err = engine.send(&req).await.unwrap_err();
        assert!(matches!(err, Error::DownloadFailed { .. }));

        assert!(!scratch.path().join("x.txt.copy").exists());
        std::net::TcpListener::bind(("0.0.0.0", port)).unwrap();
    }

    #[tokio::test]
    async fn unreachable_target_is_remote_unreachable() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("x.txt");
        std::fs::write(&file, b"x").unwrap();

        let target = MockServer::start().await;
        let mut req = request(file, &target);
        req.target_ctrl_port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        req.target_host = "127.0.0.1".into();

        let (engine, mut rx) = engine(Arc::new(NoOpArchiveHandler));
        let err = engine.send(&req).await.unwrap_err();
        assert!(matches!(err, Error::RemoteUnreachable { .. }));

        let _started = rx.recv().await.unwrap();
        assert!(matches!(
            rx.recv().await.unwrap(),
            Event::TransferFinished { ok: false, .. }
        ));
    }

    #[tokio::test]
    async fn archive_errors_become_archive_preparation_failures() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("x.txt");
        std::fs::write(&file, b"x").unwrap();

        let target = MockServer::start().await;
        let mut req = request(file, &target);
        // The no-op handler cannot build archives
        req.pack_mode = PackMode::TarGz;

        let (engine, _rx) = engine(Arc::new(NoOpArchiveHandler));
        let err = engine.send(&req).await.unwrap_err();
        assert!(matches!(err, Error::ArchivePreparationFailed { .. }));
    }
}
