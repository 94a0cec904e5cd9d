//! Node registry held by the master
//!
//! The registry is the only mutable state shared between control requests.
//! Every read and write goes through one lock; callers only ever see copies.

use crate::config::Config;
use crate::types::NodeRecord;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::Mutex;

/// In-memory table of known nodes, keyed by `(host, ctrl_port)`
///
/// Records are never removed. A node that stops answering stays in the
/// table and keeps being targeted by fan-out; its `last_seen` simply stops
/// advancing.
#[derive(Debug, Default)]
pub struct NodeRegistry {
    nodes: Mutex<Vec<NodeRecord>>,
}

impl NodeRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node or refresh an existing one
    ///
    /// An existing record keeps its position; its `last_seen` moves forward
    /// and its `name` is replaced only when `name` is non-empty. Returns
    /// `true` when a new record was appended.
    pub async fn upsert(&self, host: &str, ctrl_port: u16, name: &str) -> bool {
        let now = Utc::now();
        let mut nodes = self.nodes.lock().await;

        if let Some(existing) = nodes.iter_mut().find(|n| n.is(host, ctrl_port)) {
            existing.last_seen = advance(existing.last_seen, now);
            if !name.is_empty() {
                existing.name = name.to_string();
            }
            tracing::debug!(host, ctrl_port, "node registration refreshed");
            return false;
        }

        nodes.push(NodeRecord {
            host: host.to_string(),
            ctrl_port,
            name: name.to_string(),
            last_seen: now,
        });
        tracing::info!(host, ctrl_port, name, "node registered");
        true
    }

    /// Snapshot of every record in insertion order
    pub async fn list(&self) -> Vec<NodeRecord> {
        self.nodes.lock().await.clone()
    }

    /// Register the master itself so fan-out excludes it like any other source
    pub async fn self_register(&self, config: &Config) {
        let host = config.advertised_host();
        self.upsert(host, config.bind_port, config.display_name())
            .await;
        tracing::info!(host, ctrl_port = config.bind_port, "master registered itself");
    }
}

// Clock resolution can be coarser than back-to-back registrations.
fn advance(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    let floor = previous + TimeDelta::microseconds(1);
    if now > floor { now } else { floor }
}
