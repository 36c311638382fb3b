use crate::error::{Error, ExtractionError, Result};
use crate::types::{ArchiveType, ExtractProgress};
use std::io::Read;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Callback receiving per-entry extraction progress
///
/// Invoked from the blocking extraction thread, so it must be cheap and thread-safe.
pub type ProgressFn = dyn Fn(ExtractProgress) + Send + Sync;

const ZIP_LOCAL_HEADER: &[u8] = b"PK\x03\x04";
const ZIP_EMPTY_ARCHIVE: &[u8] = b"PK\x05\x06";
const ZIP_SPANNED: &[u8] = b"PK\x07\x08";
const SEVENZ_SIGNATURE: &[u8] = b"7z\xBC\xAF\x27\x1C";
const RAR_SIGNATURE: &[u8] = b"Rar!\x1A\x07";

/// Detect archive type by probing the file's magic bytes
///
/// The extension is ignored. Returns `None` for anything that is not a ZIP, 7z or RAR
/// container, including files too short to carry a signature or that cannot be opened.
pub fn detect_archive_type(path: &Path) -> Option<ArchiveType> {
    let mut header = [0u8; 8];
    let mut file = std::fs::File::open(path).ok()?;
    let mut filled = 0;
    while filled < header.len() {
        match file.read(&mut header[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(_) => return None,
        }
    }
    sniff(&header[..filled])
}

fn sniff(header: &[u8]) -> Option<ArchiveType> {
    if [ZIP_LOCAL_HEADER, ZIP_EMPTY_ARCHIVE, ZIP_SPANNED]
        .iter()
        .any(|sig| header.starts_with(sig))
    {
        Some(ArchiveType::Zip)
    } else if header.starts_with(SEVENZ_SIGNATURE) {
        Some(ArchiveType::SevenZip)
    } else if header.starts_with(RAR_SIGNATURE) {
        Some(ArchiveType::Rar)
    } else {
        None
    }
}

/// Check whether a file is a supported archive
///
/// `.iso` images are never treated as archives: they are mounted by emulators, not
/// unpacked. Everything else is decided by [`detect_archive_type`].
pub fn is_archive(path: &Path) -> bool {
    let is_iso = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("iso"));
    !is_iso && detect_archive_type(path).is_some()
}

/// Return `Err(Error::Cancelled)` once the token has fired
pub(crate) fn ensure_not_cancelled(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        Err(Error::Cancelled)
    } else {
        Ok(())
    }
}

/// Write one entry's bytes to `target`, replacing an existing file
pub(crate) fn write_entry(reader: &mut dyn Read, target: &Path, archive: &Path) -> Result<()> {
    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            failed(
                archive,
                format!("failed to create {}: {}", parent.display(), e),
            )
        })?;
    }

    let mut outfile = std::fs::File::create(target)
        .map_err(|e| failed(archive, format!("failed to create {}: {}", target.display(), e)))?;
    std::io::copy(reader, &mut outfile)
        .map_err(|e| failed(archive, format!("failed to write {}: {}", target.display(), e)))?;
    Ok(())
}

/// Build an [`ExtractionError::Failed`] for `archive`
pub(crate) fn failed(archive: &Path, reason: impl Into<String>) -> Error {
    Error::Extraction(ExtractionError::Failed {
        archive: archive.to_path_buf(),
        reason: reason.into(),
    })
}

/// Build an [`ExtractionError::PathTraversal`] for an entry that escapes the destination
pub(crate) fn path_traversal(archive: &Path, entry: impl Into<PathBuf>) -> Error {
    Error::Extraction(ExtractionError::PathTraversal {
        archive: archive.to_path_buf(),
        entry: entry.into(),
    })
}

/// Recursively collect all files (not directories) below `dir`
pub(crate) fn collect_files(dir: &Path) -> Result<Vec<PathBuf>> {
    fn visit_dir(dir: &Path, files: &mut Vec<PathBuf>) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_dir() {
                visit_dir(&path, files)?;
            } else {
                files.push(path);
            }
        }
        Ok(())
    }

    let mut files = Vec::new();
    visit_dir(dir, &mut files)?;
    files.sort();
    Ok(files)
}

/// Verify that nothing under `dest` resolves to a location outside it
///
/// Used after extractions whose entry names were not under our control (external tool).
pub(crate) fn validate_extracted_paths(dest: &Path, archive: &Path) -> Result<()> {
    let canonical_dest = dest.canonicalize()?;

    fn check_dir(dir: &Path, canonical_dest: &Path, archive: &Path) -> Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let canonical = path.canonicalize()?;

            if !canonical.starts_with(canonical_dest) {
                return Err(path_traversal(archive, path));
            }

            if path.is_dir() {
                check_dir(&path, canonical_dest, archive)?;
            }
        }
        Ok(())
    }

    check_dir(dest, &canonical_dest, archive)
}
