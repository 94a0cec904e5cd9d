//! Core types for meshcopy
//!
//! Registry records, transfer artifacts, the pack mode enumeration, the
//! control-protocol request/response bodies, and the events a node emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use utoipa::ToSchema;

/// How (or whether) an input path is archived before transfer
///
/// On the wire this is one of `"none"`, `"tar"`, `"gz"` or `"targz"`.
/// Any other string is read as `none`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum PackMode {
    /// Send the file as-is
    #[default]
    None,
    /// tar archive
    Tar,
    /// gzip (a directory becomes `.tar.gz`)
    Gz,
    /// tar + gzip
    #[serde(rename = "targz")]
    TarGz,
}

impl PackMode {
    /// Wire name of this mode
    pub fn as_str(&self) -> &'static str {
        match self {
            PackMode::None => "none",
            PackMode::Tar => "tar",
            PackMode::Gz => "gz",
            PackMode::TarGz => "targz",
        }
    }

    /// Mode actually applied to an input; directories are never sent raw
    pub fn effective(self, is_dir: bool) -> PackMode {
        if is_dir && self == PackMode::None {
            PackMode::Tar
        } else {
            self
        }
    }

    /// File extension of the artifact produced for this mode
    ///
    /// Returns `None` when the input is transferred unpacked.
    pub fn extension(self, is_dir: bool) -> Option<&'static str> {
        match (self.effective(is_dir), is_dir) {
            (PackMode::None, _) => None,
            (PackMode::Tar, _) => Some(".tar"),
            (PackMode::Gz, false) => Some(".gz"),
            (PackMode::Gz, true) | (PackMode::TarGz, _) => Some(".tar.gz"),
        }
    }
}

impl From<&str> for PackMode {
    fn from(value: &str) -> Self {
        match value {
            "tar" => PackMode::Tar,
            "gz" => PackMode::Gz,
            "targz" => PackMode::TarGz,
            _ => PackMode::None,
        }
    }
}

impl From<String> for PackMode {
    fn from(value: String) -> Self {
        PackMode::from(value.as_str())
    }
}

impl std::fmt::Display for PackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node known to the master's registry
///
/// Identity is `(host, ctrl_port)`; `name` and `last_seen` are refreshed on
/// re-registration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    /// Control host
    pub host: String,
    /// Control port
    pub ctrl_port: u16,
    /// Display name (may be empty)
    pub name: String,
    /// Time of the most recent registration
    pub last_seen: DateTime<Utc>,
}

impl NodeRecord {
    /// Whether this record has the given identity key
    pub fn is(&self, host: &str, ctrl_port: u16) -> bool {
        self.host == host && self.ctrl_port == ctrl_port
    }
}

/// A single file ready to be served on the data plane
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferArtifact {
    /// File served to the target
    pub path: PathBuf,
    /// Filename announced to the target
    pub logical_name: String,
    /// Whether the artifact was synthesized for this transfer and must be deleted
    pub delete_after_use: bool,
}

/// Body of `POST /api/register-node`
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterNodeRequest {
    /// Control host of the registering node
    pub host: Option<String>,
    /// Control port of the registering node
    pub ctrl_port: Option<u16>,
    /// Optional display name
    pub name: Option<String>,
}

/// Body of `POST /api/send-file`
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SendFileRequest {
    /// File or directory on the source node
    pub file_path: Option<String>,
    /// Data-plane port (default: 9000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_port: Option<u16>,
    /// Host the target uses to reach this source's data listener
    pub source_host: Option<String>,
    /// Target control host
    pub target_host: Option<String>,
    /// Target control port (default: the source's own control port)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_ctrl_port: Option<u16>,
    /// Directory on the target to save into
    pub target_save: Option<String>,
    /// Pack mode
    pub pack_mode: PackMode,
    /// Extract on the target after download
    pub auto_extract: bool,
    /// Report download progress on the target
    pub progress: bool,
}

/// A validated send-file request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferRequest {
    /// File or directory on the source node
    pub file_path: PathBuf,
    /// Data-plane port
    pub data_port: u16,
    /// Host the target uses to reach the data listener
    pub source_host: String,
    /// Target control host
    pub target_host: String,
    /// Target control port
    pub target_ctrl_port: u16,
    /// Directory on the target to save into (empty = target's working directory)
    pub target_save: String,
    /// Pack mode
    pub pack_mode: PackMode,
    /// Extract on the target after download
    pub auto_extract: bool,
    /// Report download progress on the target
    pub progress: bool,
}

impl SendFileRequest {
    /// Check required fields and fill in defaults
    pub fn into_transfer(
        self,
        default_ctrl_port: u16,
        default_data_port: u16,
    ) -> crate::Result<TransferRequest> {
        match (
            non_empty(self.file_path),
            non_empty(self.source_host),
            non_empty(self.target_host),
        ) {
            (Some(file_path), Some(source_host), Some(target_host)) => Ok(TransferRequest {
                file_path: PathBuf::from(file_path),
                data_port: self.data_port.unwrap_or(default_data_port),
                source_host,
                target_host,
                target_ctrl_port: self.target_ctrl_port.unwrap_or(default_ctrl_port),
                target_save: self.target_save.unwrap_or_default(),
                pack_mode: self.pack_mode,
                auto_extract: self.auto_extract,
                progress: self.progress,
            }),
            _ => Err(crate::Error::MalformedRequest(
                "filePath, sourceHost, targetHost required".to_string(),
            )),
        }
    }
}

impl From<&TransferRequest> for SendFileRequest {
    fn from(req: &TransferRequest) -> Self {
        Self {
            file_path: Some(req.file_path.to_string_lossy().into_owned()),
            data_port: Some(req.data_port),
            source_host: Some(req.source_host.clone()),
            target_host: Some(req.target_host.clone()),
            target_ctrl_port: Some(req.target_ctrl_port),
            target_save: Some(req.target_save.clone()),
            pack_mode: req.pack_mode,
            auto_extract: req.auto_extract,
            progress: req.progress,
        }
    }
}

/// Body of `POST /api/download-file`
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct DownloadFileRequest {
    /// `http://host[:port]/path` of the data listener
    pub url: Option<String>,
    /// Filename to save as
    pub file_name: Option<String>,
    /// Directory to save into (default: working directory)
    pub save_dir: Option<String>,
    /// Report progress
    pub progress: bool,
    /// Extract after download
    pub auto_extract: bool,
}

/// Body of `POST /api/send-all`
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct SendAllRequest {
    /// Source control host
    pub source_host: Option<String>,
    /// File or directory on the source
    pub source_file: Option<String>,
    /// Source control port (default: master's own control port)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ctrl_port: Option<u16>,
    /// Data-plane port on the source (default: 9000)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub send_port: Option<u16>,
    /// Directory every target saves into
    pub target_save: Option<String>,
    /// Pack mode
    pub pack_mode: PackMode,
    /// Extract on every target
    pub auto_extract: bool,
    /// Report progress on every target
    pub progress: bool,
}

/// A validated fan-out request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FanoutRequest {
    /// Source control host
    pub source_host: String,
    /// Source control port
    pub source_ctrl_port: u16,
    /// File or directory on the source
    pub source_file: String,
    /// Data-plane port on the source
    pub send_port: u16,
    /// Directory every target saves into
    pub target_save: String,
    /// Pack mode
    pub pack_mode: PackMode,
    /// Extract on every target
    pub auto_extract: bool,
    /// Report progress on every target
    pub progress: bool,
}

impl SendAllRequest {
    /// Check required fields and fill in defaults
    pub fn into_fanout(
        self,
        default_ctrl_port: u16,
        default_data_port: u16,
    ) -> crate::Result<FanoutRequest> {
        match (non_empty(self.source_host), non_empty(self.source_file)) {
            (Some(source_host), Some(source_file)) => Ok(FanoutRequest {
                source_host,
                source_ctrl_port: self.source_ctrl_port.unwrap_or(default_ctrl_port),
                source_file,
                send_port: self.send_port.unwrap_or(default_data_port),
                target_save: self.target_save.unwrap_or_default(),
                pack_mode: self.pack_mode,
                auto_extract: self.auto_extract,
                progress: self.progress,
            }),
            _ => Err(crate::Error::MalformedRequest(
                "sourceHost, sourceFile required".to_string(),
            )),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Plain `{"status": "ok"}` acknowledgement
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    /// Always "ok"
    pub status: String,
}

impl StatusResponse {
    /// The "ok" acknowledgement
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// Response of `GET /api/health`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Always "ok"
    pub status: String,
    /// Crate version
    pub version: String,
    /// Role of this node
    pub role: crate::config::NodeRole,
}

/// Response of `GET /api/nodes`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct NodesResponse {
    /// Registry snapshot in insertion order
    pub nodes: Vec<NodeRecord>,
}

/// Response of a successful `POST /api/download-file`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct DownloadFileResponse {
    /// Always "ok"
    pub status: String,
    /// Path the file was saved to
    pub saved: String,
}

/// Response of a successful `POST /api/send-file`
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct SendFileResponse {
    /// Always "ok"
    pub status: String,
    /// Target's response body, when it was JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub detail: Option<serde_json::Value>,
    /// Target's response body, when it was not JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail_raw: Option<String>,
}

/// Outcome of pushing to one fan-out target
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TargetOutcome {
    /// Target control host
    pub host: String,
    /// Target control port
    pub ctrl_port: u16,
    /// Whether the source reported success
    pub ok: bool,
    /// Source's response body on success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub detail: Option<serde_json::Value>,
    /// Status code or "no response" on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Response of `POST /api/send-all`
///
/// Partial failure is only visible per target; there is no top-level flag.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FanoutReport {
    /// Source control host
    pub source_host: String,
    /// One entry per attempted target, in registry order
    pub targets: Vec<TargetOutcome>,
}

/// Event emitted by a node
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A node registered (or re-registered) with this master
    NodeRegistered {
        /// Control host
        host: String,
        /// Control port
        ctrl_port: u16,
        /// Display name
        name: String,
    },

    /// A transfer started on this source node
    TransferStarted {
        /// Input path
        path: PathBuf,
        /// Target control host
        target_host: String,
        /// Target control port
        target_ctrl_port: u16,
        /// Data-plane port
        data_port: u16,
    },

    /// A transfer finished on this source node
    TransferFinished {
        /// Input path
        path: PathBuf,
        /// Target control host
        target_host: String,
        /// Target control port
        target_ctrl_port: u16,
        /// Whether the target reported success
        ok: bool,
    },

    /// Bytes received while pulling from a data listener
    DownloadProgress {
        /// Data-plane URL
        url: String,
        /// Bytes written so far
        downloaded: u64,
        /// Total size from Content-Length
        total: u64,
    },

    /// A pull finished and the file is on disk
    DownloadComplete {
        /// Data-plane URL
        url: String,
        /// Saved path
        saved: PathBuf,
    },

    /// Auto-extraction failed after a successful download
    ExtractFailed {
        /// Downloaded archive
        path: PathBuf,
        /// Error message
        error: String,
    },
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_with_no_pack_mode_is_tarred() {
        assert_eq!(PackMode::None.effective(true), PackMode::Tar);
        assert_eq!(PackMode::None.effective(false), PackMode::None);
        assert_eq!(PackMode::TarGz.effective(true), PackMode::TarGz);
        assert_eq!(PackMode::None.extension(true), Some(".tar"));
    }

    #[test]
    fn extensions_follow_mode_and_input_kind() {
        assert_eq!(PackMode::None.extension(false), None);
        assert_eq!(PackMode::Tar.extension(false), Some(".tar"));
        assert_eq!(PackMode::Gz.extension(false), Some(".gz"));
        assert_eq!(PackMode::Gz.extension(true), Some(".tar.gz"));
        assert_eq!(PackMode::TarGz.extension(false), Some(".tar.gz"));
        assert_eq!(PackMode::TarGz.extension(true), Some(".tar.gz"));
    }

    #[test]
    fn unknown_pack_mode_strings_read_as_none() {
        let mode: PackMode = serde_json::from_str("\"zip\"").unwrap();
        assert_eq!(mode, PackMode::None);
        let mode: PackMode = serde_json::from_str("\"targz\"").unwrap();
        assert_eq!(mode, PackMode::TarGz);
        assert_eq!(serde_json::to_string(&PackMode::TarGz).unwrap(), "\"targz\"");
    }

    #[test]
    fn send_file_request_applies_defaults() {
        let req: SendFileRequest = serde_json::from_value(serde_json::json!({
            "filePath": "/data/x.txt",
            "sourceHost": "10.0.0.1",
            "targetHost": "10.0.0.2"
        }))
        .unwrap();

        let transfer = req.into_transfer(7000, 9000).unwrap();
        assert_eq!(transfer.data_port, 9000);
        assert_eq!(transfer.target_ctrl_port, 7000);
        assert_eq!(transfer.pack_mode, PackMode::None);
        assert_eq!(transfer.target_save, "");
        assert!(!transfer.auto_extract);
        assert!(!transfer.progress);
    }

    #[test]
    fn send_file_request_requires_path_and_hosts() {
        let req = SendFileRequest {
            file_path: Some("/data/x.txt".into()),
            source_host: Some(String::new()),
            target_host: Some("10.0.0.2".into()),
            ..Default::default()
        };
        let err = req.into_transfer(7000, 9000).unwrap_err();
        assert_eq!(err.to_string(), "filePath, sourceHost, targetHost required");
    }

    #[test]
    fn transfer_request_round_trips_into_wire_body() {
        let transfer = TransferRequest {
            file_path: PathBuf::from("/data/x.txt"),
            data_port: 9100,
            source_host: "10.0.0.1".into(),
            target_host: "10.0.0.3".into(),
            target_ctrl_port: 7001,
            target_save: "/srv/in".into(),
            pack_mode: PackMode::TarGz,
            auto_extract: true,
            progress: true,
        };
        let body = serde_json::to_value(SendFileRequest::from(&transfer)).unwrap();
        assert_eq!(body["filePath"], "/data/x.txt");
        assert_eq!(body["dataPort"], 9100);
        assert_eq!(body["targetCtrlPort"], 7001);
        assert_eq!(body["packMode"], "targz");
        assert_eq!(body["autoExtract"], true);
    }

    #[test]
    fn send_all_request_requires_source() {
        let err = SendAllRequest {
            source_host: Some("10.0.0.1".into()),
            ..Default::default()
        }
        .into_fanout(7000, 9000)
        .unwrap_err();
        assert_eq!(err.to_string(), "sourceHost, sourceFile required");

        let fanout = SendAllRequest {
            source_host: Some("10.0.0.1".into()),
            source_file: Some("/data/x.txt".into()),
            ..Default::default()
        }
        .into_fanout(7000, 9000)
        .unwrap();
        assert_eq!(fanout.source_ctrl_port, 7000);
        assert_eq!(fanout.send_port, 9000);
    }

    #[test]
    fn node_record_serializes_camel_case() {
        let record = NodeRecord {
            host: "10.0.0.2".into(),
            ctrl_port: 7000,
            name: "worker-a".into(),
            last_seen: Utc::now(),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["ctrlPort"], 7000);
        assert!(json.get("lastSeen").is_some());
        assert!(record.is("10.0.0.2", 7000));
        assert!(!record.is("10.0.0.2", 7001));
    }

    #[test]
    fn fanout_outcome_omits_absent_fields() {
        let outcome = TargetOutcome {
            host: "10.0.0.2".into(),
            ctrl_port: 7000,
            ok: false,
            detail: None,
            error: Some("no response".into()),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["error"], "no response");
        assert!(json.get("detail").is_none());
    }
}
