//! Worker-side handle on a job's queue row
//!
//! Every change is applied to the shared [`QueueItem`] first and published as an
//! [`Event`] second, so a subscriber that reacts by calling
//! [`QueueController::get`](super::QueueController::get) sees the new state.

use crate::types::{Event, JobId, QueueItem, Status};
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

/// Mutates one [`QueueItem`] in the visible queue and notifies observers
#[derive(Clone)]
pub(crate) struct ItemHandle {
    id: JobId,
    items: Arc<RwLock<Vec<QueueItem>>>,
    event_tx: broadcast::Sender<Event>,
}

impl ItemHandle {
    pub(crate) fn new(
        id: JobId,
        items: Arc<RwLock<Vec<QueueItem>>>,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            id,
            items,
            event_tx,
        }
    }

    /// Set status and text; publishes nothing when neither changed
    pub(crate) fn set_status(&self, status: Status, text: impl Into<String>) {
        let text = text.into();
        let changed = self.update(|item| {
            if item.status == status && item.status_text == text {
                return false;
            }
            item.set_status(status, text.clone());
            true
        });

        if changed {
            self.event_tx
                .send(Event::StatusChanged {
                    id: self.id,
                    status,
                    text,
                })
                .ok();
        }
    }

    pub(crate) fn set_progress(&self, value: f64, maximum: f64, indeterminate: bool) {
        let applied = self.update(|item| {
            item.set_progress(value, maximum, indeterminate);
            true
        });

        if applied {
            // Publish the clamped maximum the item actually holds
            self.event_tx
                .send(Event::Progress {
                    id: self.id,
                    value,
                    maximum: maximum.max(1.0),
                    indeterminate,
                })
                .ok();
        }
    }

    /// Current state of the row, if it is still visible
    pub(crate) fn snapshot(&self) -> Option<QueueItem> {
        self.items
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .find(|item| item.id == self.id)
            .cloned()
    }

    /// Drop the row from the visible queue
    pub(crate) fn remove(&self) {
        let removed = {
            let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
            let before = items.len();
            items.retain(|item| item.id != self.id);
            items.len() != before
        };

        if removed {
            self.event_tx.send(Event::Removed { id: self.id }).ok();
        }
    }

    fn update(&self, f: impl FnOnce(&mut QueueItem) -> bool) -> bool {
        let mut items = self.items.write().unwrap_or_else(|e| e.into_inner());
        match items.iter_mut().find(|item| item.id == self.id) {
            Some(item) => f(item),
            None => false,
        }
    }
}
