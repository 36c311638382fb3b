//! Job orchestration: top-level lifecycle for a single request.

use crate::error::{Error, Result};
use crate::extraction::{ProgressFn, is_archive};
use crate::installed::resolve_installed_files;
use crate::types::{ExtractProgress, InstallResult, Status, TransferProgress};
use crate::utils::{format_percent, validate_request_paths};
use std::sync::Arc;
use tokio::task::spawn_blocking;

use super::super::{DownloadRequest, ResultBuilderFn};
use super::super::item::ItemHandle;
use super::context::{Job, JobContext, JobGuard};
use super::finalization::{Cleanup, finalize_job};

/// Core worker -- drives one request from Queued to a terminal state.
///
/// Phases:
/// 1. Validate paths and URL (no I/O before this passes)
/// 2. Wait for a concurrency slot, or for cancellation
/// 3. Transfer the file
/// 4. Extract when the request or the file calls for it
/// 5. Resolve the installed files
/// 6. Finalize: terminal status, cleanup, callback, grace delay
pub(crate) async fn run_job(ctx: JobContext, request: DownloadRequest) {
    let (job, result_builder, callbacks) = Job::split(request);
    let mut guard = JobGuard::new(&ctx);

    // A rejected request never touched the disk, and its paths are not safe to clean
    let (outcome, cleanup) = match validate(&job) {
        Ok(url) => (
            process(&ctx, &mut guard, &job, url, result_builder).await,
            Cleanup::Run,
        ),
        Err(e) => (Err(e), Cleanup::Skip),
    };

    finalize_job(ctx, guard, &job, callbacks, outcome, cleanup).await;
}

async fn process(
    ctx: &JobContext,
    guard: &mut JobGuard,
    job: &Job,
    url: url::Url,
    result_builder: Option<Box<ResultBuilderFn>>,
) -> Result<InstallResult> {
    admit(ctx, guard).await?;

    download(ctx, &url, job).await?;

    let detected_archive = if job.has_multiple_files || !job.auto_extract {
        false
    } else {
        let probe = job.download_path.clone();
        spawn_blocking(move || is_archive(&probe))
            .await
            .map_err(|e| Error::Other(format!("archive probe task failed: {}", e)))?
    };

    if job.extraction_required(detected_archive) {
        extract(ctx, job).await?;
    }

    if ctx.cancel_token.is_cancelled() {
        return Err(Error::Cancelled);
    }

    resolve(ctx, job, result_builder).await
}

fn validate(job: &Job) -> Result<url::Url> {
    validate_request_paths(&job.install_dir, &job.download_path)?;
    url::Url::parse(&job.url).map_err(|source| Error::InvalidUrl {
        url: job.url.clone(),
        source,
    })
}

/// Acquire a gate slot; a cancel while waiting never takes one
async fn admit(ctx: &JobContext, guard: &mut JobGuard) -> Result<()> {
    let permit = tokio::select! {
        biased;
        _ = ctx.cancel_token.cancelled() => {
            tracing::debug!(job_id = %ctx.id, "canceled while waiting for a slot");
            return Err(Error::Cancelled);
        }
        permit = ctx.gate.clone().acquire_owned() => permit.map_err(|_| Error::ShuttingDown)?,
    };

    guard.permit = Some(permit);
    tracing::debug!(job_id = %ctx.id, "slot acquired");
    Ok(())
}

async fn download(ctx: &JobContext, url: &url::Url, job: &Job) -> Result<()> {
    ctx.item.set_status(Status::Downloading, "Downloading...");
    ctx.item.set_progress(0.0, 1.0, true);

    let item = ctx.item.clone();
    let mut on_progress = move |p: TransferProgress| report_transfer(&item, p);

    let outcome = ctx
        .engine
        .transfer(url, &job.download_path, &ctx.cancel_token, &mut on_progress)
        .await?;

    tracing::info!(
        job_id = %ctx.id,
        bytes = outcome.bytes_written,
        declared = ?outcome.total,
        "transfer complete"
    );
    Ok(())
}

fn report_transfer(item: &ItemHandle, progress: TransferProgress) {
    let written = progress.bytes_written as f64;
    match progress.total {
        Some(total) if total > 0 => {
            let total = total as f64;
            item.set_progress(written, total, false);
            item.set_status(
                Status::Downloading,
                format!("Downloading... {}", format_percent(written, total)),
            );
        }
        // Unknown length: the running count doubles as the maximum
        _ => {
            item.set_progress(written, written, true);
            item.set_status(Status::Downloading, "Downloading...");
        }
    }
}

async fn extract(ctx: &JobContext, job: &Job) -> Result<()> {
    ctx.item.set_status(Status::Extracting, "Extracting...");
    ctx.item.set_progress(0.0, 1.0, false);

    let item = ctx.item.clone();
    let progress: Arc<ProgressFn> = Arc::new(move |p: ExtractProgress| report_extract(&item, p));

    let files = ctx
        .extractor
        .extract(
            &job.download_path,
            &job.install_dir,
            &ctx.cancel_token,
            progress.clone(),
        )
        .await?;
    tracing::info!(job_id = %ctx.id, file_count = files.len(), "archive extracted");

    if job.nested_extraction() {
        let nested = ctx
            .extractor
            .extract_nested(
                &job.install_dir,
                &job.download_path,
                &ctx.cancel_token,
                progress,
            )
            .await?;
        if !nested.is_empty() {
            tracing::info!(job_id = %ctx.id, nested = nested.len(), "nested archives extracted");
        }
    }

    match tokio::fs::remove_file(&job.download_path).await {
        Ok(()) => tracing::debug!(job_id = %ctx.id, path = ?job.download_path, "archive deleted"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn report_extract(item: &ItemHandle, progress: ExtractProgress) {
    let (done, total) = if progress.total == 0 {
        (1.0, 1.0)
    } else {
        (progress.done as f64, progress.total as f64)
    };
    item.set_progress(done, total, false);
    item.set_status(
        Status::Extracting,
        format!("Extracting... {}", format_percent(done, total)),
    );
}

async fn resolve(
    ctx: &JobContext,
    job: &Job,
    builder: Option<Box<ResultBuilderFn>>,
) -> Result<InstallResult> {
    let download_path = job.download_path.clone();
    let install_dir = job.install_dir.clone();
    let options = job.resolve.clone();

    let files = spawn_blocking(move || match builder {
        Some(build) => build(&download_path, &install_dir),
        None => resolve_installed_files(&download_path, &install_dir, &options),
    })
    .await
    .map_err(|e| Error::Other(format!("result builder task failed: {}", e)))??;

    tracing::debug!(job_id = %ctx.id, file_count = files.len(), "installed files resolved");

    Ok(InstallResult {
        install_dir: job.install_dir.clone(),
        files,
    })
}
