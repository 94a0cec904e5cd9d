//! Real nodes on loopback ports

use meshcopy::{Config, Node, api};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// A free loopback port (released before use, so a race is possible but unlikely)
pub fn free_port() -> u16 {
    let probe = std::net::TcpListener::bind("127.0.0.1:0").expect("probe bind");
    probe.local_addr().expect("probe addr").port()
}

/// tar and gzip are both on PATH
pub fn archive_tools_available() -> bool {
    which::which("tar").is_ok() && which::which("gzip").is_ok()
}

/// A node serving its control API until dropped or stopped
pub struct TestNode {
    pub node: Arc<Node>,
    pub port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<meshcopy::Result<()>>>,
    _temp: TempDir,
}

impl TestNode {
    /// Start a node on a fresh loopback port
    ///
    /// `configure` sees a config already bound to 127.0.0.1 with its own
    /// artifact directory.
    pub async fn start(name: &str, configure: impl FnOnce(&mut Config)) -> Self {
        let temp = TempDir::new().expect("temp dir");
        let port = free_port();

        let mut config = Config {
            bind_host: "127.0.0.1".to_string(),
            bind_port: port,
            public_host: Some("127.0.0.1".to_string()),
            node_name: Some(name.to_string()),
            ..Default::default()
        };
        config.transfer.temp_dir = Some(temp.path().join("artifacts"));
        config.transfer.http_timeout = Duration::from_secs(30);
        configure(&mut config);

        let node = Arc::new(Node::new(config).await.expect("node"));
        let listener = api::bind_control(&node).await.expect("bind control");
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(api::serve_control(listener, node.clone(), async {
            let _ = rx.await;
        }));

        Self {
            node,
            port,
            shutdown: Some(tx),
            handle: Some(handle),
            _temp: temp,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", self.port, path)
    }

    /// Stop serving and wait for the server task
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = tokio::time::timeout(Duration::from_secs(10), handle).await;
        }
    }
}

impl Drop for TestNode {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

/// Wait until the master's registry lists `expected` nodes
pub async fn wait_for_nodes(master: &TestNode, expected: usize) -> bool {
    for _ in 0..100 {
        if master.node.nodes().await.len() >= expected {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}
