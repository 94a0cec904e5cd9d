//! Download executor (target side of a push)
//!
//! Streams a file from a data listener to disk chunk by chunk, reporting
//! progress as it goes, then optionally extracts it.

use crate::archive::ArchiveHandler;
use crate::client::ControlClient;
use crate::error::{Error, Result};
use crate::types::{DownloadFileRequest, Event};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

/// A validated download-file request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadJob {
    /// `http://host[:port]/path` of the data listener
    pub url: String,
    /// Name to save as
    pub file_name: String,
    /// Directory to save into; `None` is the working directory
    pub save_dir: Option<PathBuf>,
    /// Report progress
    pub progress: bool,
    /// Extract after download
    pub auto_extract: bool,
}

impl TryFrom<DownloadFileRequest> for DownloadJob {
    type Error = Error;

    fn try_from(request: DownloadFileRequest) -> Result<Self> {
        let url = request.url.filter(|u| !u.is_empty());
        let file_name = request.file_name.filter(|n| !n.is_empty());
        let (Some(url), Some(file_name)) = (url, file_name) else {
            return Err(Error::MalformedRequest("url, fileName required".to_string()));
        };

        // The name must stay inside the save directory
        let mut components = Path::new(&file_name).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(Error::MalformedRequest(format!(
                "invalid fileName: {}",
                file_name
            )));
        }

        Ok(Self {
            url,
            file_name,
            save_dir: request
                .save_dir
                .filter(|d| !d.is_empty())
                .map(PathBuf::from),
            progress: request.progress,
            auto_extract: request.auto_extract,
        })
    }
}

/// Check that `url` is `http://host[:port]/path`
pub fn validate_data_url(url: &str) -> Result<url::Url> {
    let Some(rest) = url.strip_prefix("http://") else {
        return Err(Error::InvalidUrl("only http:// supported".to_string()));
    };
    match rest.split_once('/') {
        Some((host_port, _)) if !host_port.is_empty() => {}
        _ => return Err(Error::InvalidUrl("invalid url".to_string())),
    }
    let parsed = url::Url::parse(url).map_err(|_| Error::InvalidUrl("invalid url".to_string()))?;
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl("invalid url".to_string()));
    }
    Ok(parsed)
}

/// Pulls files from data listeners
#[derive(Clone)]
pub struct DownloadExecutor {
    archive: Arc<dyn ArchiveHandler>,
    client: ControlClient,
    event_tx: broadcast::Sender<Event>,
}

impl DownloadExecutor {
    /// Create an executor using the given archive handler and HTTP client
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

    /// Download, publish progress events, and extract if requested
    ///
    /// Extraction failures are logged and reported as an event; the download
    /// itself still counts as successful.
    pub async fn execute(&self, job: &DownloadJob) -> Result<PathBuf> {
        let tx = self.event_tx.clone();
        let url = job.url.clone();
        let saved = self
            .fetch(job, |downloaded, total| {
                let _ = tx.send(Event::DownloadProgress {
                    url: url.clone(),
                    downloaded,
                    total,
                });
            })
            .await?;

        tracing::info!(url = %job.url, saved = ?saved, "download complete");
        let _ = self.event_tx.send(Event::DownloadComplete {
            url: job.url.clone(),
            saved: saved.clone(),
        });

        if job.auto_extract {
            match self.archive.extract(&saved).await {
                Ok(()) => tracing::info!(path = ?saved, "download extracted"),
                Err(e) => {
                    tracing::warn!(path = ?saved, error = %e, "extraction failed, keeping download");
                    let _ = self.event_tx.send(Event::ExtractFailed {
                        path: saved.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(saved)
    }

    /// Stream `job.url` into the destination file
    ///
    /// `on_progress(downloaded, total)` is called after every chunk when
    /// progress was requested and the response carried a Content-Length.
    /// A failed download leaves whatever was written on disk.
    pub async fn fetch<F>(&self, job: &DownloadJob, mut on_progress: F) -> Result<PathBuf>
    where
        F: FnMut(u64, u64) + Send,
    {
        validate_data_url(&job.url)?;

        let dir = job.save_dir.clone().unwrap_or_else(|| PathBuf::from("."));
        let destination = dir.join(&job.file_name);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Error::CannotOpenDestination {
                path: destination.clone(),
                reason: e.to_string(),
            })?;
        let mut file = tokio::fs::File::create(&destination)
            .await
            .map_err(|e| Error::CannotOpenDestination {
                path: destination.clone(),
                reason: e.to_string(),
            })?;

        let failed = |reason: String| Error::DownloadFailed {
            url: job.url.clone(),
            reason,
        };

        let mut response = self
            .client
            .http()
            .get(&job.url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(failed(format!("status {}", response.status())));
        }

        let total = response.content_length();
        let report = job.progress && total.is_some();
        tracing::debug!(url = %job.url, total = ?total, destination = ?destination, "download started");

        let mut downloaded: u64 = 0;
        loop {
            let chunk = tokio::time::timeout(self.client.timeout(), response.chunk())
                .await
                .map_err(|_| failed("read timed out".to_string()))?
                .map_err(|e| failed(e.to_string()))?;
            let Some(chunk) = chunk else { break };

            file.write_all(&chunk).await?;
            downloaded += chunk.len() as u64;
            if report && let Some(total) = total {
                tracing::trace!(downloaded, total, "download progress");
                on_progress(downloaded, total);
            }
        }
        file.flush().await?;

        Ok(destination)
    }
}
