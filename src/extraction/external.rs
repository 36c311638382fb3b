//! Extraction through an external 7-Zip executable

use crate::config::ToolsConfig;
use crate::error::{Error, ExtractionError, Result};
use crate::types::ExtractProgress;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::shared::{ProgressFn, collect_files, validate_extracted_paths};

/// Binary names probed on PATH, in order
const CANDIDATES: &[&str] = &["7z", "7za", "7zz"];

/// Extractor that shells out to `7z x`
///
/// The tool does not report per-entry progress, so progress jumps from `0/1` to `1/1`.
/// A non-zero exit code becomes [`ExtractionError::ToolFailed`].
///
/// # Examples
///
/// ```no_run
/// use romm_dl::extraction::ExternalExtractor;
/// use std::path::PathBuf;
///
/// // Explicit binary
/// let tool = ExternalExtractor::new(PathBuf::from("/usr/bin/7z"));
///
/// // Or auto-discover from PATH
/// let tool = ExternalExtractor::from_path();
/// ```
#[derive(Clone, Debug)]
pub struct ExternalExtractor {
    binary_path: PathBuf,
}

impl ExternalExtractor {
    /// Create an extractor with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find a 7-Zip binary in PATH
    pub fn from_path() -> Option<Self> {
        CANDIDATES
            .iter()
            .find_map(|name| which::which(name).ok())
            .map(Self::new)
    }

    /// Resolve the tool from configuration: explicit path first, then PATH if allowed
    pub fn from_config(tools: &ToolsConfig) -> Option<Self> {
        match &tools.sevenzip_path {
            Some(path) => Some(Self::new(path.clone())),
            None if tools.search_path => Self::from_path(),
            None => None,
        }
    }

    /// Path of the executable that will be invoked
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }

    /// Extract `archive_path` into `dest_path`
    ///
    /// The child process is killed if `cancel` fires. Returns every file found under
    /// `dest_path` afterwards.
    pub async fn extract(
        &self,
        archive_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
        progress: &ProgressFn,
    ) -> Result<Vec<PathBuf>> {
        debug!(binary = ?self.binary_path, ?archive_path, ?dest_path, "extracting with external tool");

        tokio::fs::create_dir_all(dest_path).await?;
        progress(ExtractProgress { done: 0, total: 1 });

        let mut out_arg = std::ffi::OsString::from("-o");
        out_arg.push(dest_path.as_os_str());

        let mut command = Command::new(&self.binary_path);
        command
            .arg("x")
            .arg("-y")
            .arg(out_arg)
            .arg(archive_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::select! {
            output = command.output() => output.map_err(|e| {
                Error::ExternalTool(format!(
                    "Failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?,
            _ = cancel.cancelled() => {
                debug!(?archive_path, "external extraction canceled, child killed");
                return Err(Error::Cancelled);
            }
        };

        if !output.status.success() {
            return Err(Error::Extraction(ExtractionError::ToolFailed {
                tool: self.binary_path.clone(),
                archive: archive_path.to_path_buf(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }));
        }

        let dest = dest_path.to_path_buf();
        let archive = archive_path.to_path_buf();
        let files = tokio::task::spawn_blocking(move || {
            validate_extracted_paths(&dest, &archive)?;
            collect_files(&dest)
        })
        .await
        .map_err(|e| {
            Error::Extraction(ExtractionError::TaskFailed {
                archive: archive_path.to_path_buf(),
                reason: e.to_string(),
            })
        })??;

        progress(ExtractProgress { done: 1, total: 1 });
        info!(
            ?archive_path,
            file_count = files.len(),
            "external extraction successful"
        );

        Ok(files)
    }
}
