//! Job control: cancel, introspection, shutdown.

use crate::types::JobId;
use std::sync::atomic::Ordering;

use super::QueueController;

impl QueueController {
    /// Cancel a job
    ///
    /// Signals the job's cancellation token. The worker aborts its current transfer or
    /// extraction, runs cleanup, then fires the canceled callback. A job that is still
    /// waiting for a slot is canceled without ever taking one.
    ///
    /// Unknown or already finished jobs are ignored: cancel racing natural completion is
    /// expected. Returns whether a live job was signaled.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # use romm_dl::*;
    /// # fn example(controller: QueueController, id: JobId) {
    /// if !controller.cancel(id) {
    ///     println!("job already finished");
    /// }
    /// # }
    /// ```
    pub fn cancel(&self, id: JobId) -> bool {
        let active = self
            .queue_state
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        match active.get(&id) {
            Some(token) => {
                tracing::debug!(job_id = %id, "signaling cancellation");
                token.cancel();
                true
            }
            None => {
                tracing::debug!(job_id = %id, "cancel ignored, job not active");
                false
            }
        }
    }

    /// Whether the job is registered (queued or running, not yet finalized)
    pub fn is_active(&self, id: JobId) -> bool {
        self.queue_state
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id)
    }

    /// IDs of every registered job
    pub fn active_jobs(&self) -> Vec<JobId> {
        self.queue_state
            .active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }

    /// Number of concurrency slots currently held
    pub fn running_jobs(&self) -> usize {
        self.config
            .max_concurrent()
            .saturating_sub(self.queue_state.gate.available_permits())
    }

    /// Gracefully shut down the controller
    ///
    /// 1. Stops accepting new requests ([`Error::ShuttingDown`](crate::Error::ShuttingDown))
    /// 2. Cancels every registered job
    /// 3. Waits for every worker to finish, grace delays included
    ///
    /// Canceled jobs still clean up and fire their canceled callbacks.
    pub async fn shutdown(&self) {
        tracing::info!("initiating graceful shutdown");

        self.queue_state.accepting_new.store(false, Ordering::SeqCst);

        {
            let active = self
                .queue_state
                .active
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            tracing::debug!(active_count = active.len(), "canceling all active jobs");
            for token in active.values() {
                token.cancel();
            }
        }

        self.queue_state.tracker.close();
        self.queue_state.tracker.wait().await;

        tracing::info!("graceful shutdown complete");
    }
}
