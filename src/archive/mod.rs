//! Archive contract
//!
//! Turns a path into a single transferable file and back. The transfer
//! engine and the download executor only depend on the [`ArchiveHandler`]
//! trait; which implementation is used is decided once when a node starts.
//!
//! ## Implementations
//!
//! - [`CliArchiveHandler`]: shells out to `tar` and `gzip`
//! - [`NoOpArchiveHandler`]: raw files only, used when the binaries are missing
//!
//! ## Usage
//!
//! ```no_run
//! use meshcopy::archive::{ArchiveHandler, CliArchiveHandler};
//! use meshcopy::types::PackMode;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let handler = CliArchiveHandler::from_path(std::env::temp_dir())
//!         .expect("tar/gzip not found");
//!
//!     let artifact = handler.prepare(Path::new("/srv/data"), PackMode::TarGz).await?;
//!     println!("serving {} as {}", artifact.path.display(), artifact.logical_name);
//!     Ok(())
//! }
//! ```

mod cli;
mod noop;
mod traits;

pub use cli::CliArchiveHandler;
pub use noop::NoOpArchiveHandler;
pub use traits::{ArchiveCapabilities, ArchiveHandler};

use crate::error::{Error, Result};
use crate::types::TransferArtifact;
use std::path::Path;

/// Archive format recognized by filename suffix on the receiving side
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArchiveKind {
    /// `.tar.gz` or `.tgz`
    TarGz,
    /// `.tar`
    Tar,
    /// `.gz` (a single gzipped file)
    Gz,
}

/// Detect the archive format of a downloaded file from its name
///
/// Returns `None` for anything that extraction leaves untouched.
pub fn detect_archive_kind(path: &Path) -> Option<ArchiveKind> {
    let name = path.file_name()?.to_string_lossy();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Some(ArchiveKind::TarGz)
    } else if name.ends_with(".tar") {
        Some(ArchiveKind::Tar)
    } else if name.ends_with(".gz") {
        Some(ArchiveKind::Gz)
    } else {
        None
    }
}

/// What an input path is on disk
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InputKind {
    File,
    Directory,
}

/// Classify an input path, rejecting anything that is neither file nor directory
pub(crate) async fn classify_input(input: &Path) -> Result<InputKind> {
    let metadata = tokio::fs::metadata(input).await.map_err(|_| Error::PathNotFound {
        path: input.to_path_buf(),
    })?;

    if metadata.is_dir() {
        Ok(InputKind::Directory)
    } else if metadata.is_file() {
        Ok(InputKind::File)
    } else {
        Err(Error::ArchivePreparationFailed {
            path: input.to_path_buf(),
            reason: "path is neither file nor directory".to_string(),
        })
    }
}

/// Artifact for a file that is sent as-is
pub(crate) fn raw_artifact(input: &Path) -> Result<TransferArtifact> {
    Ok(TransferArtifact {
        path: input.to_path_buf(),
        logical_name: file_name_of(input)?,
        delete_after_use: false,
    })
}

pub(crate) fn file_name_of(input: &Path) -> Result<String> {
    input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| Error::ArchivePreparationFailed {
            path: input.to_path_buf(),
            reason: "path has no file name".to_string(),
        })
}
