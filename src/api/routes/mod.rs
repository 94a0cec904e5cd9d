//! Route handlers for the control API
//!
//! Handlers are organized by domain:
//! - [`system`]: health, OpenAPI, events
//! - [`nodes`]: node registry (master only)
//! - [`transfer`]: send-file, download-file, send-all

use crate::error::{Error, Result};
use serde::de::DeserializeOwned;

mod nodes;
mod system;
mod transfer;

// Re-export all handlers so `routes::function_name` works
pub use nodes::*;
pub use system::*;
pub use transfer::*;

/// Parse a JSON request body
///
/// Bodies are read regardless of their declared content type. Anything
/// that is not a JSON object of the expected shape is reported as
/// `invalid json`.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "rejecting request body");
        Error::MalformedRequest("invalid json".to_string())
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegisterNodeRequest;

    #[test]
    fn parse_json_accepts_objects_and_rejects_garbage() {
        let ok: RegisterNodeRequest = parse_json(br#"{"host":"h","ctrlPort":7000}"#).unwrap();
        assert_eq!(ok.ctrl_port, Some(7000));

        for bad in [&b"not json"[..], b"", br#"{"ctrlPort":"seven"}"#, b"[1,2]"] {
            let err = parse_json::<RegisterNodeRequest>(bad).unwrap_err();
            assert_eq!(err.to_string(), "invalid json");
        }
    }
}
