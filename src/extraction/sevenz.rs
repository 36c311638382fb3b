use crate::error::{Error, Result};
use crate::types::ExtractProgress;
use crate::utils::sanitize_entry_path;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::shared::{ProgressFn, failed, path_traversal, write_entry};

/// Archive extractor for 7z files
pub struct SevenZipExtractor;

impl SevenZipExtractor {
    /// Extract every file entry of a 7z archive into `dest_path`
    ///
    /// Blocking. Entries are decoded in archive order because solid blocks can only be
    /// read sequentially; cancellation is checked before each entry. An entry whose name
    /// would escape `dest_path` stops the extraction with a path traversal error.
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
        progress: &ProgressFn,
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting 7z archive");

        std::fs::create_dir_all(dest_path)?;

        let mut reader =
            sevenz_rust::SevenZReader::open(archive_path, sevenz_rust::Password::empty())
                .map_err(|e| failed(archive_path, format!("failed to open 7z archive: {}", e)))?;

        let total = reader
            .archive()
            .files
            .iter()
            .filter(|entry| !entry.is_directory())
            .count();
        progress(ExtractProgress { done: 0, total });

        let mut extracted_files = Vec::with_capacity(total);
        let mut done = 0;
        // The callback can only signal "stop"; the reason is parked here.
        let mut stopped: Option<Error> = None;

        let result = reader.for_each_entries(|entry, data| {
            if entry.is_directory() {
                return Ok(true);
            }
            if cancel.is_cancelled() {
                stopped = Some(Error::Cancelled);
                return Ok(false);
            }

            let Some(relative) = sanitize_entry_path(Path::new(entry.name())) else {
                stopped = Some(path_traversal(archive_path, entry.name()));
                return Ok(false);
            };
            let target = dest_path.join(relative);
            if let Err(e) = write_entry(data, &target, archive_path) {
                stopped = Some(e);
                return Ok(false);
            }
            extracted_files.push(target);

            done += 1;
            progress(ExtractProgress { done, total });
            Ok(true)
        });

        if let Some(e) = stopped {
            return Err(e);
        }
        result.map_err(|e| failed(archive_path, format!("failed to extract 7z archive: {}", e)))?;

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "7z extraction successful"
        );

        Ok(extracted_files)
    }
}
