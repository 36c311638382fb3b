//! Utility functions for path validation and disk space probing

use crate::config::DiskSpaceConfig;
use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Validate the destination paths of a request before any I/O happens
///
/// Both paths come (at least partly) from server-supplied names, so they are checked
/// lexically:
/// - neither path may contain a `..` component
/// - `download_path` must live inside `install_dir`, must not equal it, and must name a file
///
/// # Examples
///
/// ```
/// use romm_dl::utils::validate_request_paths;
/// use std::path::Path;
///
/// let dir = Path::new("/roms/snes/Chrono Trigger");
/// assert!(validate_request_paths(dir, &dir.join("Chrono Trigger.zip")).is_ok());
/// assert!(validate_request_paths(dir, &dir.join("../escape.zip")).is_err());
/// ```
pub fn validate_request_paths(install_dir: &Path, download_path: &Path) -> Result<()> {
    for path in [install_dir, download_path] {
        if path.as_os_str().is_empty() {
            return Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "path is empty".to_string(),
            });
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Error::InvalidPath {
                path: path.to_path_buf(),
                reason: "parent directory component".to_string(),
            });
        }
    }

    if !download_path.starts_with(install_dir) || download_path == install_dir {
        return Err(Error::InvalidPath {
            path: download_path.to_path_buf(),
            reason: format!("not inside install directory {}", install_dir.display()),
        });
    }

    if download_path.file_name().is_none() {
        return Err(Error::InvalidPath {
            path: download_path.to_path_buf(),
            reason: "no file name".to_string(),
        });
    }

    Ok(())
}

/// Reduce an archive entry name to its normal components
///
/// Root, prefix, `.` and `..` components are dropped. Returns `None` when nothing
/// usable is left (for example an entry named `../..`), in which case the entry must
/// be skipped.
#[must_use]
pub fn sanitize_entry_path(name: &Path) -> Option<PathBuf> {
    let sanitized = name
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect::<PathBuf>();

    if sanitized.as_os_str().is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

/// Whole-number percentage used in status texts ("Downloading... 42%")
#[must_use]
pub fn format_percent(done: f64, total: f64) -> String {
    let pct = if total > 0.0 {
        (done / total * 100.0).clamp(0.0, 100.0)
    } else {
        100.0
    };
    format!("{pct:.0}%")
}

/// Get available disk space for a given path
///
/// Uses platform-specific APIs to query filesystem statistics:
/// - Linux: statvfs
/// - macOS: statvfs
/// - Windows: GetDiskFreeSpaceExW
///
/// # Examples
///
/// ```ignore
/// let available = get_available_space(Path::new("/roms"))?;
/// println!("Available space: {} GB", available / (1024 * 1024 * 1024));
/// ```
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zero-initialized and only
        // read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }

            // f_bavail is what an unprivileged user may allocate
            #[allow(clippy::unnecessary_cast)]
            let available_bytes = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
            Ok(available_bytes)
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and every out-pointer refers to a live u64.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut _total_bytes: u64 = 0;
            let mut _total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut _total_bytes as *mut u64 as *mut _,
                &mut _total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }

            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "Disk space checking is not supported on this platform",
        ))
    }
}

/// Check that `target_dir` has room for a download of `size_bytes`
///
/// Required space is `size_bytes * size_multiplier + min_free_space`. The install
/// directory usually does not exist yet, so the nearest existing ancestor is probed.
pub fn check_disk_space(config: &DiskSpaceConfig, target_dir: &Path, size_bytes: u64) -> Result<()> {
    if !config.enabled {
        return Ok(());
    }

    let required = (size_bytes as f64 * config.size_multiplier) as u64;
    let required_with_buffer = required.saturating_add(config.min_free_space);

    let check_path = target_dir
        .ancestors()
        .find(|p| !p.as_os_str().is_empty() && p.exists())
        .ok_or_else(|| {
            Error::DiskSpaceCheckFailed(format!(
                "no existing ancestor for '{}'",
                target_dir.display()
            ))
        })?;

    let available = get_available_space(check_path).map_err(|e| {
        Error::DiskSpaceCheckFailed(format!(
            "Failed to check disk space for '{}': {}",
            check_path.display(),
            e
        ))
    })?;

    if available < required_with_buffer {
        return Err(Error::InsufficientSpace {
            required: required_with_buffer,
            available,
        });
    }

    Ok(())
}
