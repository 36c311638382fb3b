//! Enqueueing and the observable queue.

use crate::error::{Error, Result};
use crate::types::{Event, JobId, QueueItem};
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::item::ItemHandle;
use super::task::{JobContext, run_job};
use super::{DownloadRequest, QueueController};

impl QueueController {
    /// Add a request to the queue and start its worker
    ///
    /// The item is visible in [`items`](Self::items) and a [`Event::Queued`] is published
    /// before this returns. The call never waits for a concurrency slot; the worker does.
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::ShuttingDown`] after [`shutdown`](Self::shutdown) has started
    /// - [`Error::AlreadyQueued`] if a job with the same ID is still live or visible
    ///
    /// A rejected request's callbacks never run.
    pub fn enqueue(&self, request: DownloadRequest) -> Result<JobId> {
        if !self.queue_state.accepting_new.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = request.id;
        let cancel_token = CancellationToken::new();

        {
            let mut active = self
                .queue_state
                .active
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            if active.contains_key(&id) || self.get(id).is_some() {
                return Err(Error::AlreadyQueued(id));
            }
            active.insert(id, cancel_token.clone());
        }

        let item = QueueItem::new(id, request.name.clone());
        self.queue_state
            .items
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(item);
        self.event_tx
            .send(Event::Queued {
                id,
                name: request.name.clone(),
            })
            .ok();

        tracing::info!(job_id = %id, name = %request.name, url = %request.url, "job queued");

        let ctx = JobContext {
            id,
            config: self.config.clone(),
            engine: self.engine.clone(),
            extractor: self.extractor.clone(),
            item: ItemHandle::new(id, self.queue_state.items.clone(), self.event_tx.clone()),
            gate: self.queue_state.gate.clone(),
            active: self.queue_state.active.clone(),
            cancel_token,
        };
        self.queue_state.tracker.spawn(run_job(ctx, request));

        Ok(id)
    }

    /// Snapshot of the visible queue, in enqueue order
    pub fn items(&self) -> Vec<QueueItem> {
        self.queue_state
            .items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Snapshot of one queue item
    pub fn get(&self, id: JobId) -> Option<QueueItem> {
        self.queue_state
            .items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|item| item.id == id)
            .cloned()
    }

    /// Number of items currently visible, terminal ones included
    pub fn len(&self) -> usize {
        self.queue_state
            .items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// True when the visible queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
