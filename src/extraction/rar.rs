use crate::error::Result;
use crate::types::ExtractProgress;
use crate::utils::sanitize_entry_path;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::shared::{ProgressFn, ensure_not_cancelled, failed, path_traversal};

/// Archive extractor for RAR files
pub struct RarExtractor;

impl RarExtractor {
    /// Count the file entries of a RAR archive without decompressing anything
    fn count_files(archive_path: &Path) -> Result<usize> {
        let listing = unrar::Archive::new(archive_path)
            .open_for_listing()
            .map_err(|e| failed(archive_path, format!("failed to list RAR archive: {}", e)))?;

        let mut total = 0;
        for header in listing {
            let header =
                header.map_err(|e| failed(archive_path, format!("failed to read RAR header: {}", e)))?;
            if !header.is_directory() {
                total += 1;
            }
        }
        Ok(total)
    }

    /// Extract every file entry of a RAR archive into `dest_path`
    ///
    /// Blocking. The archive is listed once to learn the entry count, then processed. An
    /// entry whose name would escape `dest_path` fails the extraction.
    pub fn extract(
        archive_path: &Path,
        dest_path: &Path,
        cancel: &CancellationToken,
        progress: &ProgressFn,
    ) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "extracting RAR archive");

        std::fs::create_dir_all(dest_path)?;

        let total = Self::count_files(archive_path)?;
        progress(ExtractProgress { done: 0, total });

        let mut at_header = unrar::Archive::new(archive_path)
            .open_for_processing()
            .map_err(|e| failed(archive_path, format!("failed to open RAR archive: {}", e)))?;

        let mut extracted_files = Vec::with_capacity(total);
        let mut done = 0;

        loop {
            ensure_not_cancelled(cancel)?;

            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => {
                    return Err(failed(archive_path, format!("failed to read RAR header: {}", e)));
                }
            };

            let header = at_file.entry();
            if header.is_directory() {
                at_header = at_file
                    .skip()
                    .map_err(|e| failed(archive_path, format!("failed to skip directory: {}", e)))?;
                continue;
            }

            let Some(relative) = sanitize_entry_path(&header.filename) else {
                return Err(path_traversal(archive_path, header.filename.clone()));
            };
            let target = dest_path.join(relative);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            at_header = at_file
                .extract_to(&target)
                .map_err(|e| failed(archive_path, format!("failed to extract entry: {}", e)))?;
            extracted_files.push(target);

            done += 1;
            progress(ExtractProgress { done, total });
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "RAR extraction successful"
        );

        Ok(extracted_files)
    }
}
