//! Traits and types for the archive contract

use crate::types::{PackMode, TransferArtifact};
use async_trait::async_trait;
use std::path::Path;

/// Capabilities of an archive handler implementation
#[derive(Debug, Clone, Copy)]
pub struct ArchiveCapabilities {
    /// Can produce tar/gzip artifacts
    pub can_pack: bool,
    /// Can unpack tar/gzip downloads
    pub can_extract: bool,
}

/// Trait for turning paths into transferable artifacts and back
///
/// Implementations may shell out to external binaries or use an in-process
/// codec; callers never see which.
///
/// # Examples
///
/// ```no_run
/// use meshcopy::archive::{ArchiveHandler, CliArchiveHandler};
/// use meshcopy::types::PackMode;
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let handler = CliArchiveHandler::from_path(std::env::temp_dir())
///     .expect("tar/gzip not found");
///
/// let artifact = handler.prepare(Path::new("/srv/logs"), PackMode::None).await?;
/// // Directories are always tarred
/// assert!(artifact.logical_name.ends_with(".tar"));
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ArchiveHandler: Send + Sync {
    /// Produce the single file to serve for `input` under `mode`
    ///
    /// A directory with [`PackMode::None`] is packed as [`PackMode::Tar`].
    /// Artifacts synthesized here come back with `delete_after_use = true`;
    /// a file sent raw comes back with `false`.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::PathNotFound`] if `input` does not exist
    /// - [`crate::Error::ArchivePreparationFailed`] if packing fails
    async fn prepare(&self, input: &Path, mode: PackMode) -> crate::Result<TransferArtifact>;

    /// Unpack a downloaded file next to itself, keyed on its filename suffix
    ///
    /// `.tar.gz`/`.tgz` and `.tar` are unpacked and then removed; `.gz` is
    /// decompressed in place. Any other suffix is left alone and reported as
    /// success.
    async fn extract(&self, archive: &Path) -> crate::Result<()>;

    /// Release an artifact returned by [`ArchiveHandler::prepare`]
    ///
    /// Files sent raw are never touched. Failures are logged, not returned.
    async fn discard(&self, artifact: &TransferArtifact) {
        if !artifact.delete_after_use {
            return;
        }
        if let Err(e) = tokio::fs::remove_file(&artifact.path).await {
            tracing::warn!(path = ?artifact.path, error = %e, "failed to delete temporary artifact");
        }
    }

    /// Query capabilities of this handler
    fn capabilities(&self) -> ArchiveCapabilities;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
