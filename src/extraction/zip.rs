use crate::error::Result;
use crate::types::ExtractProgress;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::shared::{ProgressFn, ensure_not_cancelled, failed, path_traversal, write_entry};

/// Archive extractor for ZIP files
pub struct ZipExtractor;

impl ZipExtractor {
    /// Extract every file entry of a ZIP archive into `dest_path`
    ///
    /// Blocking. Directory entries are skipped (their paths are created on demand). An
    /// entry whose name would escape `dest_path` fails the whole extraction.
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
        progress: &ProgressFn,
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting ZIP archive");

        std::fs::create_dir_all(dest_path)?;

        let file = std::fs::File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| failed(archive_path, format!("failed to read ZIP archive: {}", e)))?;

        let total = archive.file_names().filter(|n| !n.ends_with('/')).count();
        progress(ExtractProgress { done: 0, total });

        let mut extracted_files = Vec::with_capacity(total);
        let mut done = 0;

        for i in 0..archive.len() {
            ensure_not_cancelled(cancel)?;

            let mut entry = archive
                .by_index(i)
                .map_err(|e| failed(archive_path, format!("failed to read ZIP entry: {}", e)))?;

            if entry.is_dir() {
                continue;
            }

            let target = match entry.enclosed_name() {
                Some(relative) => dest_path.join(relative),
                None => return Err(path_traversal(archive_path, entry.name())),
            };
            write_entry(&mut entry, &target, archive_path)?;
            extracted_files.push(target);

            done += 1;
            progress(ExtractProgress { done, total });
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "ZIP extraction successful"
        );

        Ok(extracted_files)
    }
}
