//! Ephemeral data-plane listener
//!
//! Serves exactly one artifact at `GET /download` for the lifetime of one
//! transfer. The file is opened per request and streamed in chunks, so any
//! number of range reads can be served without loading it into memory.

use crate::error::{Error, Result};
use crate::types::TransferArtifact;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use std::io::SeekFrom;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

/// How long a stopping listener may wait for open connections to drain
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// The single file a data listener exposes
#[derive(Debug)]
struct ServedFile {
    path: PathBuf,
    logical_name: String,
}

/// A running data listener
///
/// Stop it with [`DataServer::shutdown`], which waits for the serving task
/// to finish. Dropping the value without calling it still signals the task
/// to stop.
pub struct DataServer {
    addr: SocketAddr,
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DataServer {
    /// Bind `0.0.0.0:port` and start serving `artifact`
    ///
    /// Port 0 picks a free port; see [`DataServer::local_addr`].
    pub async fn start(port: u16, artifact: &TransferArtifact) -> Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|e| Error::ApiServerError(format!("cannot bind data port {}: {}", port, e)))?;
        let addr = listener.local_addr()?;

        let served = Arc::new(ServedFile {
            path: artifact.path.clone(),
            logical_name: artifact.logical_name.clone(),
        });
        let app = Router::new()
            .route("/download", get(serve_download))
            .with_state(served);

        let token = CancellationToken::new();
        let stop = token.clone();
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(stop.cancelled_owned())
                .await
            {
                tracing::error!(error = %e, "data listener failed");
            }
        });

        tracing::info!(
            data_port = addr.port(),
            path = ?artifact.path,
            name = %artifact.logical_name,
            "data listener started"
        );

        Ok(Self {
            addr,
            token,
            handle: Some(handle),
        })
    }

    /// Address the listener is bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Stop accepting connections and wait for the serving task to end
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(mut handle) = self.handle.take() {
            match tokio::time::timeout(SHUTDOWN_GRACE, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::error!(error = %e, "data listener task panicked"),
                Err(_) => {
                    tracing::warn!(
                        data_port = self.addr.port(),
                        "data listener did not drain in time, aborting"
                    );
                    handle.abort();
                    let _ = handle.await;
                }
            }
        }
        tracing::info!(data_port = self.addr.port(), "data listener stopped");
    }
}

impl Drop for DataServer {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// Outcome of interpreting a `Range` header against a file length
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RangeRequest {
    /// No usable range; serve the whole file
    Full,
    /// Inclusive byte range
    Partial { start: u64, end: u64 },
    /// Syntactically valid but outside the file
    Unsatisfiable,
}

/// Interpret a single `bytes=` range
///
/// Multi-range and malformed headers are ignored and the whole file is served.
fn parse_range(header: &str, len: u64) -> RangeRequest {
    let Some(spec) = header.trim().strip_prefix("bytes=") else {
        return RangeRequest::Full;
    };
    if spec.contains(',') {
        return RangeRequest::Full;
    }
    let Some((first, last)) = spec.split_once('-') else {
        return RangeRequest::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    match (first.is_empty(), last.is_empty()) {
        // bytes=-n: the last n bytes
        (true, false) => match last.parse::<u64>() {
            Ok(0) => RangeRequest::Unsatisfiable,
            Ok(_) if len == 0 => RangeRequest::Unsatisfiable,
            Ok(n) => RangeRequest::Partial {
                start: len.saturating_sub(n),
                end: len - 1,
            },
            Err(_) => RangeRequest::Full,
        },
        // bytes=a-
        (false, true) => match first.parse::<u64>() {
            Ok(start) if start < len => RangeRequest::Partial {
                start,
                end: len - 1,
            },
            Ok(_) => RangeRequest::Unsatisfiable,
            Err(_) => RangeRequest::Full,
        },
        // bytes=a-b
        (false, false) => match (first.parse::<u64>(), last.parse::<u64>()) {
            (Ok(start), Ok(end)) if start > end => RangeRequest::Full,
            (Ok(start), Ok(_)) if start >= len => RangeRequest::Unsatisfiable,
            (Ok(start), Ok(end)) => RangeRequest::Partial {
                start,
                end: end.min(len - 1),
            },
            _ => RangeRequest::Full,
        },
        (true, true) => RangeRequest::Full,
    }
}

fn content_disposition(name: &str) -> String {
    format!(
        "attachment; filename=\"{}\"",
        name.replace('\\', "\\\\").replace('"', "\\\"")
    )
}

async fn serve_download(State(served): State<Arc<ServedFile>>, headers: HeaderMap) -> Response {
    let mut file = match tokio::fs::File::open(&served.path).await {
        Ok(file) => file,
        Err(e) => {
            tracing::error!(path = ?served.path, error = %e, "artifact vanished before download");
            return StatusCode::NOT_FOUND.into_response();
        }
    };
    let len = match file.metadata().await {
        Ok(metadata) => metadata.len(),
        Err(e) => {
            tracing::error!(path = ?served.path, error = %e, "cannot stat artifact");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map_or(RangeRequest::Full, |raw| parse_range(raw, len));

    let common = [
        (header::CONTENT_TYPE, "application/octet-stream".to_string()),
        (
            header::CONTENT_DISPOSITION,
            content_disposition(&served.logical_name),
        ),
        (header::ACCEPT_RANGES, "bytes".to_string()),
    ];

    match range {
        RangeRequest::Full => {
            tracing::debug!(bytes = len, "serving artifact");
            (
                StatusCode::OK,
                common,
                [(header::CONTENT_LENGTH, len.to_string())],
                Body::from_stream(ReaderStream::new(file)),
            )
                .into_response()
        }
        RangeRequest::Partial { start, end } => {
            if let Err(e) = file.seek(SeekFrom::Start(start)).await {
                tracing::error!(path = ?served.path, error = %e, "seek failed");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
            let count = end - start + 1;
            tracing::debug!(start, end, "serving artifact range");
            (
                StatusCode::PARTIAL_CONTENT,
                common,
                [
                    (header::CONTENT_LENGTH, count.to_string()),
                    (
                        header::CONTENT_RANGE,
                        format!("bytes {}-{}/{}", start, end, len),
                    ),
                ],
                Body::from_stream(ReaderStream::new(file.take(count))),
            )
                .into_response()
        }
        RangeRequest::Unsatisfiable => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{}", len))],
        )
            .into_response(),
    }
}
