//! Configuration types for meshcopy

use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, path::PathBuf, time::Duration};
use utoipa::ToSchema;

/// Role a node plays in the cluster, derived from [`Config`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum NodeRole {
    /// Holds the node registry and serves fan-out requests
    Master,
    /// Registers itself with a master at startup
    Worker,
    /// Neither master nor attached to one
    Standalone,
}

impl std::fmt::Display for NodeRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeRole::Master => write!(f, "MASTER"),
            NodeRole::Worker => write!(f, "WORKER"),
            NodeRole::Standalone => write!(f, "STANDALONE"),
        }
    }
}

/// Transfer behavior (data-plane port, timeouts, temporary artifacts)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct TransferConfig {
    /// Data-plane port used when a request does not name one (default: 9000)
    #[serde(default = "default_data_port")]
    pub default_data_port: u16,

    /// Read timeout for every control-plane and data-plane HTTP call (default: 300 seconds)
    #[serde(default = "default_http_timeout", with = "duration_serde")]
    #[schema(value_type = u64)]
    pub http_timeout: Duration,

    /// Where synthesized archives are written (default: OS temp directory)
    #[serde(default)]
    pub temp_dir: Option<PathBuf>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            default_data_port: default_data_port(),
            http_timeout: default_http_timeout(),
            temp_dir: None,
        }
    }
}

impl TransferConfig {
    /// Directory where temporary artifacts are written
    pub fn artifact_dir(&self) -> PathBuf {
        self.temp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// External archive tool paths
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct ArchiveToolsConfig {
    /// Path to tar executable (auto-detected if None)
    #[serde(default)]
    pub tar_path: Option<PathBuf>,

    /// Path to gzip executable (auto-detected if None)
    #[serde(default)]
    pub gzip_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ArchiveToolsConfig {
    fn default() -> Self {
        Self {
            tar_path: None,
            gzip_path: None,
            search_path: true,
        }
    }
}

/// Control API presentation settings
#[derive(Clone, Debug, Default, Serialize, Deserialize, ToSchema)]
pub struct ApiConfig {
    /// Enable Swagger UI at /swagger-ui (default: false)
    #[serde(default)]
    pub swagger_ui: bool,
}

/// Main configuration for a node
///
/// Built once at startup (from CLI flags or a config file) and shared as
/// `Arc<Config>`; nothing mutates it afterwards.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct Config {
    /// Address the control server binds to (default: 0.0.0.0)
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Control server port (default: 7000)
    #[serde(default = "default_ctrl_port")]
    pub bind_port: u16,

    /// Run as master: keep the node registry and serve fan-out
    #[serde(default)]
    pub master: bool,

    /// Master control host a worker registers with
    #[serde(default)]
    pub master_host: Option<String>,

    /// Master control port (default: 7000)
    #[serde(default = "default_ctrl_port")]
    pub master_port: u16,

    /// Host other nodes use to reach this one (falls back to `bind_host`)
    #[serde(default)]
    pub public_host: Option<String>,

    /// Display name reported to the master
    #[serde(default)]
    pub node_name: Option<String>,

    /// Transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Archive tool settings
    #[serde(default)]
    pub archive: ArchiveToolsConfig,

    /// Control API settings
    #[serde(default)]
    pub api: ApiConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: default_bind_host(),
            bind_port: default_ctrl_port(),
            master: false,
            master_host: None,
            master_port: default_ctrl_port(),
            public_host: None,
            node_name: None,
            transfer: TransferConfig::default(),
            archive: ArchiveToolsConfig::default(),
            api: ApiConfig::default(),
        }
    }
}

impl Config {
    /// Role derived from the master flag and master host
    pub fn role(&self) -> NodeRole {
        if self.master {
            NodeRole::Master
        } else if self.master_host.as_deref().is_some_and(|h| !h.is_empty()) {
            NodeRole::Worker
        } else {
            NodeRole::Standalone
        }
    }

    /// Host this node advertises to its peers
    pub fn advertised_host(&self) -> &str {
        match self.public_host.as_deref() {
            Some(host) if !host.is_empty() => host,
            _ => &self.bind_host,
        }
    }

    /// Name used when this node registers itself
    pub fn display_name(&self) -> &str {
        match self.node_name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ if self.master => "master",
            _ => "",
        }
    }

    /// Socket address of the control server
    pub fn bind_address(&self) -> crate::Result<SocketAddr> {
        format!("{}:{}", self.bind_host, self.bind_port)
            .parse()
            .map_err(|e| crate::Error::Config {
                message: format!(
                    "invalid bind address {}:{}: {}",
                    self.bind_host, self.bind_port, e
                ),
                key: Some("bind_host".to_string()),
            })
    }
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ctrl_port() -> u16 {
    7000
}

fn default_data_port() -> u16 {
    9000
}

fn default_http_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_true() -> bool {
    true
}

// Duration serialization helper
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
