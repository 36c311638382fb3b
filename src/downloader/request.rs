//! Install requests and their terminal callbacks

use crate::error::{Error, Result};
use crate::installed::ResolveOptions;
use crate::types::{InstallResult, JobId};
use std::path::{Path, PathBuf};

/// Resolves the installable files of a finished job from `(download_path, install_dir)`
pub type ResultBuilderFn = dyn FnOnce(&Path, &Path) -> Result<Vec<PathBuf>> + Send;

type InstalledFn = Box<dyn FnOnce(InstallResult) + Send>;
type CanceledFn = Box<dyn FnOnce() + Send>;
type FailedFn = Box<dyn FnOnce(Error) + Send>;

/// One request to fetch and install a single asset
///
/// Built by the catalog side and handed to
/// [`QueueController::enqueue`](super::QueueController::enqueue). Exactly one of the
/// installed, canceled or failed callbacks runs, once, for every accepted request.
///
/// # Examples
///
/// ```no_run
/// use romm_dl::DownloadRequest;
///
/// let request = DownloadRequest::new(
///     "Chrono Trigger",
///     "https://romm.local/api/roms/42/content/Chrono%20Trigger.zip",
///     "/games/snes/Chrono Trigger",
///     "/games/snes/Chrono Trigger/Chrono Trigger.zip",
/// )
/// .auto_extract(true)
/// .on_installed(|result| println!("installed {:?}", result.files))
/// .on_failed(|e| eprintln!("install failed: {e}"));
/// ```
pub struct DownloadRequest {
    /// Job ID (fresh UUID unless set with [`DownloadRequest::with_id`])
    pub id: JobId,
    /// Display name
    pub name: String,
    /// Source URL
    pub url: String,
    /// Directory the asset is installed into
    pub install_dir: PathBuf,
    /// Where the downloaded file is written; must lie inside `install_dir`
    pub download_path: PathBuf,
    /// Server says the asset is a multi-file bundle wrapped in an archive
    pub has_multiple_files: bool,
    /// Extract downloads that turn out to be archives
    pub auto_extract: bool,
    /// Policy for the default result builder
    pub resolve: ResolveOptions,
    pub(crate) result_builder: Option<Box<ResultBuilderFn>>,
    pub(crate) callbacks: Callbacks,
}

impl DownloadRequest {
    /// Create a request with a fresh job ID and no callbacks
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        install_dir: impl Into<PathBuf>,
        download_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            id: JobId::new(),
            name: name.into(),
            url: url.into(),
            install_dir: install_dir.into(),
            download_path: download_path.into(),
            has_multiple_files: false,
            auto_extract: false,
            resolve: ResolveOptions::default(),
            result_builder: None,
            callbacks: Callbacks::default(),
        }
    }

    /// Use a caller-chosen job ID
    pub fn with_id(mut self, id: JobId) -> Self {
        self.id = id;
        self
    }

    /// Mark the asset as a multi-file bundle (always extracted)
    pub fn has_multiple_files(mut self, value: bool) -> Self {
        self.has_multiple_files = value;
        self
    }

    /// Enable extraction of archive downloads
    pub fn auto_extract(mut self, value: bool) -> Self {
        self.auto_extract = value;
        self
    }

    /// Set the policy used by the default result builder
    pub fn resolve_options(mut self, options: ResolveOptions) -> Self {
        self.resolve = options;
        self
    }

    /// Replace the default result builder
    ///
    /// The builder runs on a blocking thread once transfer and extraction are done.
    pub fn result_builder<F>(mut self, builder: F) -> Self
    where
        F: FnOnce(&Path, &Path) -> Result<Vec<PathBuf>> + Send + 'static,
    {
        self.result_builder = Some(Box::new(builder));
        self
    }

    /// Called with the resolved files when the job completes
    pub fn on_installed<F>(mut self, f: F) -> Self
    where
        F: FnOnce(InstallResult) + Send + 'static,
    {
        self.callbacks.installed = Some(Box::new(f));
        self
    }

    /// Called after cleanup when the job is canceled
    pub fn on_canceled<F>(mut self, f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        self.callbacks.canceled = Some(Box::new(f));
        self
    }

    /// Called after cleanup when the job fails
    pub fn on_failed<F>(mut self, f: F) -> Self
    where
        F: FnOnce(Error) + Send + 'static,
    {
        self.callbacks.failed = Some(Box::new(f));
        self
    }
}

impl std::fmt::Debug for DownloadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadRequest")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("url", &self.url)
            .field("install_dir", &self.install_dir)
            .field("download_path", &self.download_path)
            .field("has_multiple_files", &self.has_multiple_files)
            .field("auto_extract", &self.auto_extract)
            .field("resolve", &self.resolve)
            .field("custom_result_builder", &self.result_builder.is_some())
            .finish_non_exhaustive()
    }
}

/// Terminal callbacks of a request
///
/// Each firing method consumes the set, so at most one of them can ever run.
#[derive(Default)]
pub(crate) struct Callbacks {
    installed: Option<InstalledFn>,
    canceled: Option<CanceledFn>,
    failed: Option<FailedFn>,
}

impl Callbacks {
    pub(crate) fn installed(self, result: InstallResult) {
        if let Some(f) = self.installed {
            f(result);
        }
    }

    pub(crate) fn canceled(self) {
        if let Some(f) = self.canceled {
            f();
        }
    }

    pub(crate) fn failed(self, error: Error) {
        if let Some(f) = self.failed {
            f(error);
        }
    }
}
