//! CLI-based archive handler using external tar and gzip binaries

use super::traits::{ArchiveCapabilities, ArchiveHandler};
use super::{ArchiveKind, InputKind, classify_input, detect_archive_kind, file_name_of, raw_artifact};
use crate::error::{Error, Result};
use crate::types::{PackMode, TransferArtifact};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Archive handler that shells out to `tar` and `gzip`
///
/// Every synthesized artifact gets its own scratch directory under
/// `output_dir` and is written there as `<name><ext>`, so concurrent
/// transfers of the same input never share a file.
///
/// # Examples
///
/// ```no_run
/// use meshcopy::archive::{ArchiveHandler, CliArchiveHandler};
/// use std::path::{Path, PathBuf};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// // Create with explicit paths
/// let handler = CliArchiveHandler::new(
///     PathBuf::from("/usr/bin/tar"),
///     PathBuf::from("/usr/bin/gzip"),
///     std::env::temp_dir(),
/// );
///
/// // Or auto-discover from PATH
/// let handler = CliArchiveHandler::from_path(std::env::temp_dir())
///     .expect("tar/gzip not found in PATH");
///
/// handler.extract(Path::new("/srv/in/data.tar.gz")).await?;
/// # Ok(())
/// # }
/// ```
pub struct CliArchiveHandler {
    tar_path: PathBuf,
    gzip_path: PathBuf,
    output_dir: PathBuf,
}

impl CliArchiveHandler {
    /// Create a new CLI handler with explicit binary paths
    pub fn new(tar_path: PathBuf, gzip_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            tar_path,
            gzip_path,
            output_dir,
        }
    }

    /// Attempt to find tar and gzip in PATH
    ///
    /// Returns `None` unless both binaries are found.
    pub fn from_path(output_dir: PathBuf) -> Option<Self> {
        let tar_path = which::which("tar").ok()?;
        let gzip_path = which::which("gzip").ok()?;
        Some(Self::new(tar_path, gzip_path, output_dir))
    }

    async fn pack(
        &self,
        input: &Path,
        mode: PackMode,
        kind: InputKind,
        output: &Path,
    ) -> Result<()> {
        let base = file_name_of(input)?;
        let parent = match input.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut command = match (mode, kind) {
            (PackMode::Gz, InputKind::File) => {
                let out = tokio::fs::File::create(output).await.map_err(|e| {
                    Error::ArchivePreparationFailed {
                        path: input.to_path_buf(),
                        reason: format!("cannot create {}: {}", output.display(), e),
                    }
                })?;
                let mut cmd = Command::new(&self.gzip_path);
                cmd.arg("-c")
                    .arg(input)
                    .stdout(Stdio::from(out.into_std().await));
                cmd
            }
            (PackMode::Tar, _) => {
                let mut cmd = Command::new(&self.tar_path);
                cmd.arg("-cf")
                    .arg(output)
                    .arg("-C")
                    .arg(&parent)
                    .arg(&base)
                    .stdout(Stdio::null());
                cmd
            }
            _ => {
                let mut cmd = Command::new(&self.tar_path);
                cmd.arg("-czf")
                    .arg(output)
                    .arg("-C")
                    .arg(&parent)
                    .arg(&base)
                    .stdout(Stdio::null());
                cmd
            }
        };

        tracing::info!(?command, "packing transfer artifact");
        run(&mut command).await.map_err(|reason| {
            Error::ArchivePreparationFailed {
                path: input.to_path_buf(),
                reason,
            }
        })
    }
}

/// Run a command to completion, returning stderr on failure
///
/// Stdout is left as configured by the caller (`output()` would replace it
/// with a pipe), so only stderr is captured.
async fn run(command: &mut Command) -> std::result::Result<(), String> {
    let child = command
        .stdin(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| format!("failed to execute: {}", e))?;
    let output = child
        .wait_with_output()
        .await
        .map_err(|e| format!("failed to wait: {}", e))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(status = %output.status, stderr = %stderr.trim(), "command failed");
        Err(format!("{}: {}", output.status, stderr.trim()))
    }
}

#[async_trait]
impl ArchiveHandler for CliArchiveHandler {
    async fn prepare(&self, input: &Path, mode: PackMode) -> Result<TransferArtifact> {
        let kind = classify_input(input).await?;
        let is_dir = kind == InputKind::Directory;
        let mode = mode.effective(is_dir);

        let Some(ext) = mode.extension(is_dir) else {
            return raw_artifact(input);
        };

        let logical_name = format!("{}{}", file_name_of(input)?, ext);
        let scratch = tempfile::Builder::new()
            .prefix("meshcopy-")
            .tempdir_in(&self.output_dir)
            .map_err(|e| Error::ArchivePreparationFailed {
                path: input.to_path_buf(),
                reason: format!("cannot create scratch dir in {}: {}", self.output_dir.display(), e),
            })?;
        let output = scratch.path().join(&logical_name);

        // Dropping `scratch` on failure removes the partial artifact
        self.pack(input, mode, kind, &output).await?;
        let _ = scratch.keep();

        Ok(TransferArtifact {
            path: output,
            logical_name,
            delete_after_use: true,
        })
    }

    async fn extract(&self, archive: &Path) -> Result<()> {
        let Some(kind) = detect_archive_kind(archive) else {
            return Ok(());
        };
        let dir = match archive.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let mut command = match kind {
            ArchiveKind::TarGz => {
                let mut cmd = Command::new(&self.tar_path);
                cmd.arg("-xzf").arg(archive).arg("-C").arg(&dir);
                cmd
            }
            ArchiveKind::Tar => {
                let mut cmd = Command::new(&self.tar_path);
                cmd.arg("-xf").arg(archive).arg("-C").arg(&dir);
                cmd
            }
            ArchiveKind::Gz => {
                // gzip -d replaces x.gz with x
                let mut cmd = Command::new(&self.gzip_path);
                cmd.arg("-d").arg("-f").arg(archive);
                cmd
            }
        };

        command.stdout(Stdio::null());
        tracing::info!(?command, "extracting download");
        run(&mut command).await.map_err(|reason| {
            Error::ExternalTool(format!(
                "extraction of {} failed: {}",
                archive.display(),
                reason
            ))
        })?;

        if kind != ArchiveKind::Gz {
            tokio::fs::remove_file(archive).await?;
        }
        Ok(())
    }

    async fn discard(&self, artifact: &TransferArtifact) {
        if !artifact.delete_after_use {
            return;
        }
        // Only scratch directories created by `prepare` are removed whole
        let scratch = artifact
            .path
            .parent()
            .filter(|dir| dir.parent() == Some(self.output_dir.as_path()));
        let result = match scratch {
            Some(dir) => tokio::fs::remove_dir_all(dir).await,
            None => tokio::fs::remove_file(&artifact.path).await,
        };
        if let Err(e) = result {
            tracing::warn!(path = ?artifact.path, error = %e, "failed to delete temporary artifact");
        }
    }

    fn capabilities(&self) -> ArchiveCapabilities {
        ArchiveCapabilities {
            can_pack: true,
            can_extract: true,
        }
    }

    fn name(&self) -> &'static str {
        "cli-tar"
    }
}
