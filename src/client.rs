//! Control-plane HTTP client
//!
//! Every node-to-node control call goes through [`ControlClient`]: the
//! transfer engine asking a target to pull, the fan-out coordinator asking
//! a source to push, a worker registering with its master, and the CLI.

use crate::error::{Error, Result};
use crate::types::{
    DownloadFileRequest, NodesResponse, RegisterNodeRequest, SendAllRequest, SendFileRequest,
};
use serde::Serialize;
use std::time::Duration;

/// Thin wrapper around a shared `reqwest::Client`
///
/// Responses are returned as-is; callers decide what a non-200 status means
/// for them. Transport failures become [`Error::RemoteUnreachable`].
#[derive(Clone, Debug)]
pub struct ControlClient {
    http: reqwest::Client,
    timeout: Duration,
}

impl ControlClient {
    /// Build a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .user_agent(concat!("meshcopy/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Config {
                message: format!("failed to create HTTP client: {}", e),
                key: None,
            })?;
        Ok(Self { http, timeout })
    }

    /// The underlying HTTP client, shared with the download executor
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Timeout applied to control calls and to each data-plane read
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POST a JSON body to `http://{host}:{port}{path}`
    pub async fn post_json<B>(
        &self,
        host: &str,
        port: u16,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = control_url(host, port, path);
        tracing::debug!(%url, "control POST");
        self.http
            .post(&url)
            .timeout(self.timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| unreachable(host, port, e))
    }

    /// GET `http://{host}:{port}{path}`
    pub async fn get(&self, host: &str, port: u16, path: &str) -> Result<reqwest::Response> {
        let url = control_url(host, port, path);
        tracing::debug!(%url, "control GET");
        self.http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| unreachable(host, port, e))
    }

    /// Ask a source node to push a file to a target
    pub async fn send_file(
        &self,
        host: &str,
        port: u16,
        request: &SendFileRequest,
    ) -> Result<reqwest::Response> {
        self.post_json(host, port, "/api/send-file", request).await
    }

    /// Ask a target node to pull from a data listener
    pub async fn download_file(
        &self,
        host: &str,
        port: u16,
        request: &DownloadFileRequest,
    ) -> Result<reqwest::Response> {
        self.post_json(host, port, "/api/download-file", request)
            .await
    }

    /// Ask a master to fan a file out to every other node
    pub async fn send_all(
        &self,
        host: &str,
        port: u16,
        request: &SendAllRequest,
    ) -> Result<reqwest::Response> {
        self.post_json(host, port, "/api/send-all", request).await
    }

    /// Register a node with a master; succeeds only on a 200 answer
    pub async fn register_node(
        &self,
        host: &str,
        port: u16,
        request: &RegisterNodeRequest,
    ) -> Result<()> {
        let response = self
            .post_json(host, port, "/api/register-node", request)
            .await?;
        if response.status() != reqwest::StatusCode::OK {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::RemoteUnreachable {
                target: format!("{}:{}", host, port),
                reason: format!("registration rejected with {}: {}", status, body),
            });
        }
        Ok(())
    }

    /// Fetch a master's registry snapshot
    pub async fn nodes(&self, host: &str, port: u16) -> Result<NodesResponse> {
        let response = self.get(host, port, "/api/nodes").await?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(Error::RemoteUnreachable {
                target: format!("{}:{}", host, port),
                reason: format!("nodes request answered {}", response.status()),
            });
        }
        Ok(response.json().await?)
    }
}

fn control_url(host: &str, port: u16, path: &str) -> String {
    format!("http://{}:{}{}", host, port, path)
}

fn unreachable(host: &str, port: u16, e: reqwest::Error) -> Error {
    Error::RemoteUnreachable {
        target: format!("{}:{}", host, port),
        reason: e.to_string(),
    }
}
