//! Outcome recording and event collection for integration tests

use romm_dl::{DownloadRequest, Error, Event, InstallResult, JobId, Status};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// Which terminal callbacks fired for the requests it was attached to
#[derive(Clone, Default)]
pub struct Outcomes {
    pub installed: Arc<Mutex<Vec<InstallResult>>>,
    pub canceled: Arc<Mutex<usize>>,
    pub failed: Arc<Mutex<Vec<String>>>,
}

impl Outcomes {
    /// Wire all three callbacks of `request` to this recorder
    pub fn attach(&self, request: DownloadRequest) -> DownloadRequest {
        let installed = self.installed.clone();
        let canceled = self.canceled.clone();
        let failed = self.failed.clone();
        request
            .on_installed(move |result| installed.lock().unwrap().push(result))
            .on_canceled(move || *canceled.lock().unwrap() += 1)
            .on_failed(move |e: Error| failed.lock().unwrap().push(e.to_string()))
    }

    pub fn installed(&self) -> Vec<InstallResult> {
        self.installed.lock().unwrap().clone()
    }

    pub fn canceled(&self) -> usize {
        *self.canceled.lock().unwrap()
    }

    pub fn failed(&self) -> Vec<String> {
        self.failed.lock().unwrap().clone()
    }

    pub fn total(&self) -> usize {
        self.installed().len() + self.canceled() + self.failed().len()
    }
}

/// Everything published about one job, in order
#[derive(Debug, Default)]
pub struct JobTimeline {
    pub statuses: Vec<(Status, String)>,
    pub progress: Vec<(f64, f64, bool)>,
    pub removed: bool,
}

impl JobTimeline {
    /// Distinct statuses in the order they were first entered
    pub fn status_sequence(&self) -> Vec<Status> {
        let mut sequence: Vec<Status> = Vec::new();
        for (status, _) in &self.statuses {
            if sequence.last() != Some(status) {
                sequence.push(*status);
            }
        }
        sequence
    }

    pub fn texts(&self) -> Vec<&str> {
        self.statuses.iter().map(|(_, text)| text.as_str()).collect()
    }
}

/// Collect events for `id` until it is removed from the queue or `timeout` elapses
///
/// Returns `None` on timeout or if the channel closes first.
pub async fn collect_until_removed(
    events: &mut broadcast::Receiver<Event>,
    id: JobId,
    timeout: Duration,
) -> Option<JobTimeline> {
    let mut timeline = JobTimeline::default();

    let result = tokio::time::timeout(timeout, async {
        loop {
            match events.recv().await {
                Ok(Event::StatusChanged {
                    id: event_id,
                    status,
                    text,
                }) if event_id == id => timeline.statuses.push((status, text)),
                Ok(Event::Progress {
                    id: event_id,
                    value,
                    maximum,
                    indeterminate,
                }) if event_id == id => timeline.progress.push((value, maximum, indeterminate)),
                Ok(Event::Removed { id: event_id }) if event_id == id => {
                    timeline.removed = true;
                    return true;
                }
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return false,
            }
        }
    })
    .await;

    match result {
        Ok(true) => Some(timeline),
        _ => None,
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` elapses
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
