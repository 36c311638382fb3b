//! Resolving the installable files of a finished job
//!
//! After transfer and extraction, a job reports which files an emulator should launch.
//! [`resolve_installed_files`] is the default policy; requests may bring their own.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Extension of playlist files that reference the discs of a multi-disc game
pub const MANIFEST_EXTENSION: &str = "m3u";

/// Per-mapping policy for result resolution
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Prefer a single `.m3u` playlist over the files it references
    #[serde(default)]
    pub use_manifest: bool,

    /// Extensions (without dot) the target emulator accepts; empty means every file
    #[serde(default)]
    pub supported_extensions: Vec<String>,
}

/// Resolve the installable files for a job
///
/// - If `download_path` still exists (nothing was extracted), it is the only result.
/// - Otherwise files under `install_dir` are collected, filtered by
///   `supported_extensions` in the order given.
/// - With `use_manifest`, the first `.m3u` found wins on its own.
/// - Without it, `.m3u` files are left out so discs are not listed twice.
///
/// Fails with [`Error::InvalidPath`] when an extension contains a path separator or `..`.
pub fn resolve_installed_files(
    download_path: &Path,
    install_dir: &Path,
    options: &ResolveOptions,
) -> Result<Vec<PathBuf>> {
    if download_path.is_file() {
        return Ok(vec![download_path.to_path_buf()]);
    }

    let candidates = collect_rom_files(install_dir, &options.supported_extensions)?;

    if options.use_manifest
        && let Some(manifest) = candidates.iter().find(|p| is_manifest(p))
    {
        return Ok(vec![manifest.clone()]);
    }

    Ok(candidates.into_iter().filter(|p| !is_manifest(p)).collect())
}

fn is_manifest(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION))
}

fn collect_rom_files(install_dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    for ext in extensions {
        if ext.contains("..") || ext.contains('/') || ext.contains('\\') {
            return Err(Error::InvalidPath {
                path: PathBuf::from(ext),
                reason: "extension contains a path component".to_string(),
            });
        }
    }

    if !install_dir.is_dir() {
        return Ok(Vec::new());
    }

    let all_files = crate::extraction::collect_files(install_dir)?;

    if extensions.is_empty() {
        return Ok(all_files);
    }

    let mut selected = Vec::new();
    for ext in extensions {
        let ext = ext.trim_start_matches('.');
        for file in &all_files {
            let matches = file
                .extension()
                .is_some_and(|e| e.eq_ignore_ascii_case(ext));
            if matches && !selected.contains(file) {
                selected.push(file.clone());
            }
        }
    }
    Ok(selected)
}
