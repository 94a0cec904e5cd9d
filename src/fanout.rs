//! Fan-out coordinator (master only)
//!
//! Asks one source node to push the same file to every other registered
//! node, one target at a time.

use crate::client::ControlClient;
use crate::registry::NodeRegistry;
use crate::types::{FanoutReport, FanoutRequest, NodeRecord, SendFileRequest, TargetOutcome};
use std::sync::Arc;

/// Drives sequential pushes from a source to every other registered node
#[derive(Clone)]
pub struct FanoutCoordinator {
    registry: Arc<NodeRegistry>,
    client: ControlClient,
}

/// Every record except the one whose identity is exactly `(host, ctrl_port)`
pub fn fanout_targets(nodes: Vec<NodeRecord>, host: &str, ctrl_port: u16) -> Vec<NodeRecord> {
    nodes
        .into_iter()
        .filter(|n| !n.is(host, ctrl_port))
        .collect()
}

impl FanoutCoordinator {
    /// Create a coordinator over the given registry
    pub fn new(registry: Arc<NodeRegistry>, client: ControlClient) -> Self {
        Self { registry, client }
    }

    /// Push to every target and collect one outcome per target
    ///
    /// A failed target never stops the loop, and nothing is retried.
    pub async fn run(&self, request: &FanoutRequest) -> FanoutReport {
        let targets = fanout_targets(
            self.registry.list().await,
            &request.source_host,
            request.source_ctrl_port,
        );
        tracing::info!(
            source_host = %request.source_host,
            source_ctrl_port = request.source_ctrl_port,
            file = %request.source_file,
            targets = targets.len(),
            "fan-out started"
        );

        let mut outcomes = Vec::with_capacity(targets.len());
        for target in &targets {
            let outcome = self.push_one(request, target).await;
            if outcome.ok {
                tracing::info!(host = %target.host, ctrl_port = target.ctrl_port, "fan-out target done");
            } else {
                tracing::warn!(
                    host = %target.host,
                    ctrl_port = target.ctrl_port,
                    error = outcome.error.as_deref().unwrap_or_default(),
                    "fan-out target failed"
                );
            }
            outcomes.push(outcome);
        }

        FanoutReport {
            source_host: request.source_host.clone(),
            targets: outcomes,
        }
    }

    async fn push_one(&self, request: &FanoutRequest, target: &NodeRecord) -> TargetOutcome {
        let body = SendFileRequest {
            file_path: Some(request.source_file.clone()),
            data_port: Some(request.send_port),
            source_host: Some(request.source_host.clone()),
            target_host: Some(target.host.clone()),
            target_ctrl_port: Some(target.ctrl_port),
            target_save: Some(request.target_save.clone()),
            pack_mode: request.pack_mode,
            auto_extract: request.auto_extract,
            progress: request.progress,
        };

        let mut outcome = TargetOutcome {
            host: target.host.clone(),
            ctrl_port: target.ctrl_port,
            ok: false,
            detail: None,
            error: None,
        };

        match self
            .client
            .send_file(&request.source_host, request.source_ctrl_port, &body)
            .await
        {
            Ok(response) if response.status() == reqwest::StatusCode::OK => {
                let text = match response.text().await {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(
                            host = %target.host,
                            ctrl_port = target.ctrl_port,
                            error = %e,
                            "could not read source response body"
                        );
                        String::new()
                    }
                };
                outcome.ok = true;
                outcome.detail = Some(
                    serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)),
                );
            }
            Ok(response) => {
                outcome.error = Some(response.status().as_u16().to_string());
            }
            Err(e) => {
                tracing::debug!(error = %e, "source did not answer");
                outcome.error = Some("no response".to_string());
            }
        }
        outcome
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PackMode;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(source: &MockServer) -> FanoutRequest {
        FanoutRequest {
            source_host: source.address().ip().to_string(),
            source_ctrl_port: source.address().port(),
            source_file: "/data/x.txt".into(),
            send_port: 9000,
            target_save: "/srv/in".into(),
            pack_mode: PackMode::TarGz,
            auto_extract: true,
            progress: false,
        }
    }

    fn coordinator(registry: Arc<NodeRegistry>) -> FanoutCoordinator {
        FanoutCoordinator::new(
            registry,
            ControlClient::new(Duration::from_secs(5)).unwrap(),
        )
    }

    #[test]
    fn targets_exclude_only_exact_identity() {
        let now = chrono::Utc::now();
        let node = |host: &str, port| NodeRecord {
            host: host.into(),
            ctrl_port: port,
            name: String::new(),
            last_seen: now,
        };
        let nodes = vec![
            node("10.0.0.1", 7000),
            node("10.0.0.1", 7001),
            node("10.0.0.2", 7000),
        ];
        let targets = fanout_targets(nodes, "10.0.0.1", 7000);
        let keys: Vec<_> = targets.iter().map(|n| (n.host.as_str(), n.ctrl_port)).collect();
        assert_eq!(keys, vec![("10.0.0.1", 7001), ("10.0.0.2", 7000)]);
    }

    #[tokio::test]
    async fn pushes_to_every_other_node_in_registry_order() {
        let source = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send-file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": "ok"})))
            .expect(3)
            .mount(&source)
            .await;

        let registry = Arc::new(NodeRegistry::new());
        let req = request(&source);
        registry.upsert("10.0.0.2", 7000, "a").await;
        registry
            .upsert(&req.source_host, req.source_ctrl_port, "src")
            .await;
        registry.upsert("10.0.0.3", 7000, "b").await;
        registry.upsert("10.0.0.4", 7000, "c").await;

        let report = coordinator(registry).run(&req).await;

        assert_eq!(report.source_host, req.source_host);
        let hosts: Vec<_> = report.targets.iter().map(|t| t.host.as_str()).collect();
        assert_eq!(hosts, vec!["10.0.0.2", "10.0.0.3", "10.0.0.4"]);
        assert!(report.targets.iter().all(|t| t.ok && t.error.is_none()));
        assert_eq!(report.targets[0].detail.as_ref().unwrap()["status"], "ok");

        let received = source.received_requests().await.unwrap();
        let bodies: Vec<serde_json::Value> = received
            .iter()
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect();
        assert_eq!(bodies[0]["targetHost"], "10.0.0.2");
        assert_eq!(bodies[1]["targetHost"], "10.0.0.3");
        assert_eq!(bodies[2]["targetHost"], "10.0.0.4");
        for body in &bodies {
            assert_eq!(body["filePath"], "/data/x.txt");
            assert_eq!(body["dataPort"], 9000);
            assert_eq!(body["targetCtrlPort"], 7000);
            assert_eq!(body["targetSave"], "/srv/in");
            assert_eq!(body["packMode"], "targz");
            assert_eq!(body["autoExtract"], true);
        }
    }

    #[tokio::test]
    async fn failing_target_does_not_stop_the_loop() {
        let source = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/send-file"))
            .and(wiremock::matchers::body_partial_json(
                serde_json::json!({"targetHost": "10.0.0.2"}),
            ))
            .respond_with(ResponseTemplate::new(500).set_body_json(serde_json::json!({"error": "target download failed"})))
            .mount(&source)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/send-file"))
            .respond_with(ResponseTemplate::new(200).set_body_string("plain"))
            .mount(&source)
            .await;

        let registry = Arc::new(NodeRegistry::new());
        registry.upsert("10.0.0.2", 7000, "").await;
        registry.upsert("10.0.0.3", 7000, "").await;

        let report = coordinator(registry).run(&request(&source)).await;
        assert_eq!(report.targets.len(), 2);
        assert!(!report.targets[0].ok);
        assert_eq!(report.targets[0].error.as_deref(), Some("500"));
        assert!(report.targets[1].ok);
        assert_eq!(
            report.targets[1].detail,
            Some(serde_json::Value::String("plain".into()))
        );
    }

    #[tokio::test]
    async fn silent_source_reports_no_response_per_target() {
        let port = {
            let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            probe.local_addr().unwrap().port()
        };
        let registry = Arc::new(NodeRegistry::new());
        registry.upsert("10.0.0.2", 7000, "").await;
        registry.upsert("10.0.0.3", 7000, "").await;

        let req = FanoutRequest {
            source_host: "127.0.0.1".into(),
            source_ctrl_port: port,
            source_file: "/data/x.txt".into(),
            send_port: 9000,
            target_save: String::new(),
            pack_mode: PackMode::None,
            auto_extract: false,
            progress: false,
        };
        let report = coordinator(registry).run(&req).await;
        assert_eq!(report.targets.len(), 2);
        for target in &report.targets {
            assert!(!target.ok);
            assert_eq!(target.error.as_deref(), Some("no response"));
        }
    }

    #[tokio::test]
    async fn empty_registry_yields_empty_report() {
        let source = MockServer::start().await;
        let registry = Arc::new(NodeRegistry::new());
        let report = coordinator(registry).run(&request(&source)).await;
        assert!(report.targets.is_empty());
    }

    #[tokio::test]
    async fn truncated_source_body_still_counts_as_ok() {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // Consume the whole request before answering
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_lowercase();
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| l.strip_prefix("content-length:"))
                        .and_then(|v| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }
            socket
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n{\"sta")
                .await
                .unwrap();
            socket.shutdown().await.unwrap();
        });

        let registry = Arc::new(NodeRegistry::new());
        registry.upsert("10.0.0.2", 7000, "").await;
        let req = FanoutRequest {
            source_host: "127.0.0.1".into(),
            source_ctrl_port: port,
            source_file: "/data/x.txt".into(),
            send_port: 9000,
            target_save: String::new(),
            pack_mode: PackMode::None,
            auto_extract: false,
            progress: false,
        };

        let report = coordinator(registry).run(&req).await;
        assert_eq!(report.targets.len(), 1);
        assert!(report.targets[0].ok);
        assert_eq!(
            report.targets[0].detail,
            Some(serde_json::Value::String(String::new()))
        );
    }
}
