//! Raw-only archive handler for hosts without tar/gzip

use super::traits::{ArchiveCapabilities, ArchiveHandler};
use super::{InputKind, classify_input, detect_archive_kind, raw_artifact};
use crate::types::{PackMode, TransferArtifact};
use async_trait::async_trait;
use std::path::Path;

/// Archive handler used when no tar/gzip binaries are available
///
/// Plain files with [`PackMode::None`] still transfer; anything that needs
/// packing or unpacking fails with `Error::NotSupported`, which the transfer
/// engine reports as an archive preparation failure.
///
/// # Examples
///
/// ```
/// use meshcopy::archive::{ArchiveHandler, NoOpArchiveHandler};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let handler = NoOpArchiveHandler;
///
/// // Unknown suffixes are left alone
/// handler.extract(Path::new("notes.txt")).await?;
///
/// // Archives cannot be unpacked
/// assert!(handler.extract(Path::new("notes.tar")).await.is_err());
/// # Ok(())
/// # }
/// ```
pub struct NoOpArchiveHandler;

#[async_trait]
impl ArchiveHandler for NoOpArchiveHandler {
    async fn prepare(&self, input: &Path, mode: PackMode) -> crate::Result<TransferArtifact> {
        let kind = classify_input(input).await?;
        match mode.effective(kind == InputKind::Directory) {
            PackMode::None => raw_artifact(input),
            other => Err(crate::Error::NotSupported(format!(
                "pack mode {} requires external tar/gzip binaries. \
                 Configure tar_path/gzip_path or ensure they are in PATH.",
                other
            ))),
        }
    }

    async fn extract(&self, archive: &Path) -> crate::Result<()> {
        match detect_archive_kind(archive) {
            None => Ok(()),
            Some(kind) => Err(crate::Error::NotSupported(format!(
                "extracting {:?} archives requires external tar/gzip binaries",
                kind
            ))),
        }
    }

    fn capabilities(&self) -> ArchiveCapabilities {
        ArchiveCapabilities {
            can_pack: false,
            can_extract: false,
        }
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}
