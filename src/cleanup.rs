//! Best-effort removal of partial installs
//!
//! Runs on the cancel and failure paths. Nothing in here returns an error: every
//! problem is logged as a warning and swallowed so the job can still report its outcome.

use crate::config::CleanupConfig;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, warn};

/// Remove a partially downloaded file and the install directory
///
/// Safe to call when either path is already gone.
pub async fn cleanup_partial_install(download_path: &Path, install_dir: &Path, config: &CleanupConfig) {
    debug!(?download_path, ?install_dir, "cleaning up partial install");

    let file_removed = delete_file_with_retry(download_path, config).await;
    let dir_removed = delete_dir_with_retry(install_dir, config).await;

    if file_removed && dir_removed {
        info!(?install_dir, "partial install removed");
    } else {
        warn!(
            ?download_path,
            ?install_dir,
            file_removed,
            dir_removed,
            "partial install could not be fully removed"
        );
    }
}

/// Delete a single file, retrying on transient errors
///
/// Returns true once the file no longer exists.
pub async fn delete_file_with_retry(path: &Path, config: &CleanupConfig) -> bool {
    let attempts = config.retries.max(1);

    for attempt in 1..=attempts {
        let metadata = match fs::symlink_metadata(path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                warn!(?path, attempt, error = %e, "failed to stat file for deletion");
                tokio::time::sleep(config.retry_delay).await;
                continue;
            }
        };

        if metadata.is_dir() {
            warn!(?path, "expected a file but found a directory, leaving it for directory cleanup");
            return false;
        }

        clear_readonly(path, &metadata).await;

        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(?path, attempt, "deleted file");
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                warn!(?path, attempt, attempts, error = %e, "failed to delete file");
                if attempt < attempts {
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }

    false
}

/// Delete a directory tree, retrying on transient errors
///
/// Read-only markers are cleared on every child before each attempt. Returns true once
/// the directory no longer exists.
pub async fn delete_dir_with_retry(path: &Path, config: &CleanupConfig) -> bool {
    let attempts = config.retries.max(1);

    for attempt in 1..=attempts {
        match fs::symlink_metadata(path).await {
            Ok(m) if m.is_dir() => {}
            Ok(_) => {
                warn!(?path, "expected a directory but found a file");
                return delete_file_with_retry(path, config).await;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                warn!(?path, attempt, error = %e, "failed to stat directory for deletion");
                tokio::time::sleep(config.retry_delay).await;
                continue;
            }
        }

        clear_attributes_recursive(path).await;

        match fs::remove_dir_all(path).await {
            Ok(()) => {
                debug!(?path, attempt, "deleted directory");
                return true;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return true,
            Err(e) => {
                warn!(?path, attempt, attempts, error = %e, "failed to delete directory");
                if attempt < attempts {
                    tokio::time::sleep(config.retry_delay).await;
                }
            }
        }
    }

    false
}

/// Clear read-only markers on a directory and everything below it
fn clear_attributes_recursive<'a>(
    dir: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + Send + 'a>> {
    Box::pin(async move {
        if let Ok(metadata) = fs::symlink_metadata(dir).await {
            clear_readonly(dir, &metadata).await;
        }

        let mut entries = match fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) => {
                debug!(?dir, error = %e, "failed to read directory while clearing attributes");
                return;
            }
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let entry_path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(_) => continue,
            };

            if file_type.is_dir() {
                clear_attributes_recursive(&entry_path).await;
            } else if !file_type.is_symlink()
                && let Ok(metadata) = entry.metadata().await
            {
                clear_readonly(&entry_path, &metadata).await;
            }
        }
    })
}

async fn clear_readonly(path: &Path, metadata: &std::fs::Metadata) {
    if metadata.file_type().is_symlink() {
        return;
    }

    let mut perms = metadata.permissions();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = perms.mode();
        let wanted = if metadata.is_dir() { mode | 0o700 } else { mode | 0o200 };
        if wanted == mode {
            return;
        }
        perms.set_mode(wanted);
    }

    #[cfg(not(unix))]
    {
        if !perms.readonly() {
            return;
        }
        #[allow(clippy::permissions_set_readonly_false)]
        perms.set_readonly(false);
    }

    if let Err(e) = fs::set_permissions(path, perms).await {
        debug!(?path, error = %e, "failed to clear read-only attribute");
    }
}
