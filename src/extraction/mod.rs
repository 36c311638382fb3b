//! Archive extraction
//!
//! This module unpacks ZIP, 7z and RAR archives into an install directory, reporting
//! per-entry progress and honoring cancellation between entries. Format detection
//! sniffs magic bytes; `.iso` images are never treated as archives.
//!
//! Nested archives (an archive inside the bundle the server sent) are unpacked into the
//! same directory by [`Extractor::extract_nested`].

mod external;
mod rar;
mod sevenz;
mod shared;
mod zip;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use external::ExternalExtractor;
pub use rar::RarExtractor;
pub use sevenz::SevenZipExtractor;
pub(crate) use shared::collect_files;
pub use shared::{ProgressFn, detect_archive_type, is_archive};
pub use zip::ZipExtractor;

use crate::config::Config;
use crate::error::{Error, ExtractionError, Result};
use crate::types::ArchiveType;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Unified archive extraction dispatcher
///
/// Detects the archive type and routes to the matching native extractor, or to the
/// external 7-Zip tool for the kinds configured in [`ToolsConfig`](crate::config::ToolsConfig).
#[derive(Clone, Debug)]
pub struct Extractor {
    external: Option<ExternalExtractor>,
    external_kinds: Vec<ArchiveType>,
    max_recursion_depth: Option<u32>,
}

impl Extractor {
    /// Build an extractor from configuration
    ///
    /// When the external tool is enabled but cannot be found, native extraction is used
    /// for every kind.
    pub fn new(config: &Config) -> Self {
        let external = if config.tools.use_external_extractor {
            let tool = ExternalExtractor::from_config(&config.tools);
            match &tool {
                Some(t) => info!(binary = ?t.binary_path(), "using external extractor"),
                None => warn!("external extractor enabled but no 7z binary found, using native extraction"),
            }
            tool
        } else {
            None
        };

        Self {
            external,
            external_kinds: config.tools.external_kinds.clone(),
            max_recursion_depth: config.extraction.max_recursion_depth,
        }
    }

    /// Extract a single archive into `dest_path`
    ///
    /// Returns the paths written. Fails with [`Error::Cancelled`] if `cancel` fires
    /// between entries.
    pub async fn extract(
        &self,
        archive_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
        progress: Arc<ProgressFn>,
    ) -> Result<Vec<PathBuf>> {
        let probe = archive_path.to_path_buf();
        let archive_type = spawn_blocking(move || detect_archive_type(&probe))
            .await
            .map_err(|e| task_failed(archive_path, e))?
            .ok_or_else(|| {
                Error::Extraction(ExtractionError::UnsupportedFormat {
                    archive: archive_path.to_path_buf(),
                })
            })?;

        info!(
            ?archive_path,
            ?archive_type,
            "dispatching extraction to appropriate extractor"
        );

        if let Some(tool) = &self.external
            && self.external_kinds.contains(&archive_type)
        {
            return tool
                .extract(archive_path, dest_path, cancel, progress.as_ref())
                .await;
        }

        let archive = archive_path.to_path_buf();
        let dest = dest_path.to_path_buf();
        let cancel = cancel.clone();
        spawn_blocking(move || {
            let progress = progress.as_ref();
            match archive_type {
                ArchiveType::Zip => ZipExtractor::extract(&archive, &dest, &cancel, progress),
                ArchiveType::SevenZip => {
                    SevenZipExtractor::extract(&archive, &dest, &cancel, progress)
                }
                ArchiveType::Rar => RarExtractor::extract(&archive, &dest, &cancel, progress),
            }
        })
        .await
        .map_err(|e| task_failed(archive_path, e))?
    }

    /// Unpack archives found among the immediate files of `dir`
    ///
    /// Each archive is extracted into `dir` itself and deleted afterwards; the directory
    /// is then rescanned so archives that came out of archives are handled too. `exclude`
    /// (the top-level download) is never touched. Depth is unbounded unless
    /// `extraction.max_recursion_depth` is set.
    ///
    /// A nested archive that fails to extract fails the whole pass, as does cancellation.
    /// Returns the archives that were unpacked.
    pub async fn extract_nested(
        &self,
        dir: &Path,
        exclude: &Path,
        cancel: &CancellationToken,
        progress: Arc<ProgressFn>,
    ) -> Result<Vec<PathBuf>> {
        let mut unpacked = Vec::new();
        let mut skipped: HashSet<PathBuf> = HashSet::new();
        skipped.insert(exclude.to_path_buf());
        let mut depth: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            let candidates = scan_for_archives(dir, &skipped).await?;
            if candidates.is_empty() {
                break;
            }

            if let Some(max) = self.max_recursion_depth
                && depth >= max
            {
                debug!(?dir, depth, max, "reached maximum recursion depth, leaving nested archives");
                break;
            }

            for nested in candidates {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                info!(?nested, depth, "found nested archive, extracting");
                let files = self
                    .extract(&nested, dir, cancel, progress.clone())
                    .await
                    .inspect_err(|e| {
                        if !e.is_cancelled() {
                            warn!(?nested, error = %e, "failed to extract nested archive");
                        }
                    })?;
                debug!(?nested, file_count = files.len(), "nested archive extracted");

                if let Err(e) = tokio::fs::remove_file(&nested).await {
                    warn!(?nested, error = %e, "failed to delete nested archive");
                    skipped.insert(nested.clone());
                }
                unpacked.push(nested);
            }

            depth += 1;
        }

        Ok(unpacked)
    }
}

/// List immediate files of `dir` that are archives and not in `skipped`
async fn scan_for_archives(dir: &Path, skipped: &HashSet<PathBuf>) -> Result<Vec<PathBuf>> {
    let dir = dir.to_path_buf();
    let skipped = skipped.clone();
    let scan_dir = dir.clone();

    spawn_blocking(move || -> Result<Vec<PathBuf>> {
        let mut archives = Vec::new();
        for entry in std::fs::read_dir(&scan_dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if !skipped.contains(&path) && is_archive(&path) {
                archives.push(path);
            }
        }
        archives.sort();
        Ok(archives)
    })
    .await
    .map_err(|e| task_failed(&dir, e))?
}

fn task_failed(archive: &Path, e: tokio::task::JoinError) -> Error {
    Error::Extraction(ExtractionError::TaskFailed {
        archive: archive.to_path_buf(),
        reason: e.to_string(),
    })
}
