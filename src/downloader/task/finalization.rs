//! Job finalization: terminal status, cleanup, callback, grace delay.

use crate::cleanup::cleanup_partial_install;
use crate::error::Result;
use crate::types::{InstallResult, Status};

use super::super::request::Callbacks;
use super::context::{Job, JobContext, JobGuard};

/// Whether a failed or canceled job's partial install is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Cleanup {
    /// The request passed validation; its paths may hold partial output
    Run,
    /// The request was rejected before any I/O
    Skip,
}

/// Settle a job's outcome.
///
/// Exactly one callback fires. Unless `cleanup` is [`Cleanup::Skip`], the partial
/// install is removed before the canceled or failed callback. The guard is dropped (deregistering the job and freeing its slot) before
/// the grace delay, after which the row leaves the visible queue.
pub(super) async fn finalize_job(
    ctx: JobContext,
    guard: JobGuard,
    job: &Job,
    callbacks: Callbacks,
    outcome: Result<InstallResult>,
    cleanup: Cleanup,
) {
    let id = ctx.id;
    let queue = &ctx.config.queue;

    let grace = match outcome {
        Ok(result) => {
            let maximum = ctx
                .item
                .snapshot()
                .map_or(1.0, |item| item.progress_maximum);
            ctx.item.set_status(Status::Completed, "Completed");
            ctx.item.set_progress(maximum, maximum, false);

            tracing::info!(job_id = %id, files = result.files.len(), "job completed");
            callbacks.installed(result);
            queue.success_grace
        }
        Err(e) if e.is_cancelled() => {
            ctx.item.set_status(Status::Canceled, "Canceled");
            ctx.item.set_progress(0.0, 1.0, false);

            cleanup_partial_install(&job.download_path, &job.install_dir, &ctx.config.cleanup)
                .await;

            tracing::info!(job_id = %id, "job canceled");
            callbacks.canceled();
            queue.cancel_grace
        }
        Err(e) => {
            ctx.item.set_status(Status::Failed, "Failed");

            if cleanup == Cleanup::Skip {
                tracing::warn!(job_id = %id, "request rejected, skipping cleanup of untrusted paths");
            } else {
                cleanup_partial_install(&job.download_path, &job.install_dir, &ctx.config.cleanup)
                    .await;
            }

            tracing::error!(job_id = %id, error = %e, "job failed");
            callbacks.failed(e);
            queue.failure_grace
        }
    };

    drop(guard);

    tokio::time::sleep(grace).await;
    ctx.item.remove();
    tracing::debug!(job_id = %id, "job removed from queue");
}
