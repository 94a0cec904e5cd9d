//! Application state for the control server

use crate::node::Node;
use std::sync::Arc;

/// Shared application state accessible to all route handlers
///
/// Cloned for each request (cheap Arc clone).
#[derive(Clone)]
pub struct AppState {
    /// The node serving this control API
    pub node: Arc<Node>,
}

impl AppState {
    /// Create a new AppState
    pub fn new(node: Arc<Node>) -> Self {
        Self { node }
    }
}
