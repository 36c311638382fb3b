//! Job context: shared state for one worker and the guard that releases it.

use crate::config::Config;
use crate::extraction::Extractor;
use crate::installed::ResolveOptions;
use crate::transfer::TransferEngine;
use crate::types::JobId;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::CancellationToken;

use super::super::ResultBuilderFn;
use super::super::item::ItemHandle;
use super::super::request::{Callbacks, DownloadRequest};

/// Shared context for a single job, reducing parameter passing between phases.
pub(crate) struct JobContext {
    pub(crate) id: JobId,
    pub(crate) config: Arc<Config>,
    pub(crate) engine: TransferEngine,
    pub(crate) extractor: Extractor,
    pub(crate) item: ItemHandle,
    pub(crate) gate: Arc<Semaphore>,
    pub(crate) active: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    pub(crate) cancel_token: CancellationToken,
}

/// The data half of a [`DownloadRequest`]
///
/// The result builder and callbacks are `Send` but not `Sync`, so they travel by value
/// next to it instead of being borrowed across awaits.
pub(super) struct Job {
    pub(super) url: String,
    pub(super) install_dir: PathBuf,
    pub(super) download_path: PathBuf,
    pub(super) has_multiple_files: bool,
    pub(super) auto_extract: bool,
    pub(super) resolve: ResolveOptions,
}

impl Job {
    pub(super) fn split(request: DownloadRequest) -> (Self, Option<Box<ResultBuilderFn>>, Callbacks) {
        let DownloadRequest {
            url,
            install_dir,
            download_path,
            has_multiple_files,
            auto_extract,
            resolve,
            result_builder,
            callbacks,
            ..
        } = request;

        let job = Self {
            url,
            install_dir,
            download_path,
            has_multiple_files,
            auto_extract,
            resolve,
        };
        (job, result_builder, callbacks)
    }

    /// Extraction runs for bundles, and for archive downloads when auto-extract is on
    pub(super) fn extraction_required(&self, is_archive: bool) -> bool {
        self.has_multiple_files || (self.auto_extract && is_archive)
    }

    /// Nested archives are only unpacked for bundles with auto-extract on
    pub(super) fn nested_extraction(&self) -> bool {
        self.has_multiple_files && self.auto_extract
    }
}

/// Deregisters the job and releases its concurrency slot when dropped
///
/// Held for the whole worker body so both happen on every exit path, unwinding included.
pub(super) struct JobGuard {
    id: JobId,
    active: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    pub(super) permit: Option<OwnedSemaphorePermit>,
}

impl JobGuard {
    pub(super) fn new(ctx: &JobContext) -> Self {
        Self {
            id: ctx.id,
            active: ctx.active.clone(),
            permit: None,
        }
    }
}

impl Drop for JobGuard {
    fn drop(&mut self) {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&self.id);
        let held_slot = self.permit.take().is_some();
        tracing::debug!(job_id = %self.id, held_slot, "job deregistered");
    }
}
