//! Download queue controller split into focused submodules.
//!
//! The `QueueController` struct and its methods are organized by domain:
//! - [`request`] - Install requests and terminal callbacks
//! - [`queue`] - Enqueueing and the observable queue
//! - [`control`] - Cancellation, introspection and shutdown
//! - [`item`] - Publishing per-job state changes
//! - [`task`] - The per-job worker (gate, transfer, extract, finalize)

mod control;
mod item;
mod queue;
pub mod request;
mod task;


pub use request::{DownloadRequest, ResultBuilderFn};

use crate::config::Config;
use crate::error::Result;
use crate::extraction::Extractor;
use crate::transfer::TransferEngine;
use crate::types::{Event, JobId, QueueItem};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, RwLock};
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Queue and job state shared by the controller and its workers
#[derive(Clone)]
pub(crate) struct QueueState {
    /// Visible queue, in enqueue order
    pub(crate) items: Arc<RwLock<Vec<QueueItem>>>,
    /// Concurrency gate (capacity = max_concurrent_downloads)
    pub(crate) gate: Arc<Semaphore>,
    /// Map of live jobs to their cancellation tokens
    pub(crate) active: Arc<Mutex<HashMap<JobId, CancellationToken>>>,
    /// Flag to indicate whether new requests are accepted (set to false during shutdown)
    pub(crate) accepting_new: Arc<AtomicBool>,
    /// Tracks worker tasks so shutdown can wait for them
    pub(crate) tracker: TaskTracker,
}

/// Bounded-concurrency download, extract and install queue (cloneable - all fields are Arc-wrapped)
///
/// Each enqueued request gets its own worker task. At most
/// `download.max_concurrent_downloads` workers are past the gate at any time; the rest wait
/// in the Queued state.
///
/// # Examples
///
/// ```no_run
/// use romm_dl::{Config, DownloadRequest, QueueController};
///
/// # async fn example() -> romm_dl::Result<()> {
/// let controller = QueueController::new(Config::default())?;
/// let mut events = controller.subscribe();
///
/// let id = controller.enqueue(DownloadRequest::new(
///     "Super Metroid",
///     "https://romm.local/api/roms/7/content/Super%20Metroid.sfc",
///     "/games/snes/Super Metroid",
///     "/games/snes/Super Metroid/Super Metroid.sfc",
/// ))?;
///
/// while let Ok(event) = events.recv().await {
///     println!("{:?}", event);
/// }
/// # let _ = id;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueueController {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// HTTP transfer engine (one client for every job)
    pub(crate) engine: TransferEngine,
    /// Archive extraction dispatcher
    pub(crate) extractor: Extractor,
    /// Queue and job state management
    pub(crate) queue_state: QueueState,
}

impl QueueController {
    /// Create a controller, building its HTTP client from `config`
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the configuration is invalid or
    /// the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let engine = TransferEngine::new(&config)?;
        Ok(Self::build(config, engine))
    }

    /// Create a controller around an existing HTTP client
    pub fn with_client(config: Config, client: reqwest::Client) -> Result<Self> {
        config.validate()?;
        let engine = TransferEngine::with_client(client, &config);
        Ok(Self::build(config, engine))
    }

    fn build(config: Config, engine: TransferEngine) -> Self {
        let (event_tx, _rx) = broadcast::channel(config.queue.event_buffer);
        let extractor = Extractor::new(&config);

        let queue_state = QueueState {
            items: Arc::new(RwLock::new(Vec::new())),
            gate: Arc::new(Semaphore::new(config.max_concurrent())),
            active: Arc::new(Mutex::new(HashMap::new())),
            accepting_new: Arc::new(AtomicBool::new(true)),
            tracker: TaskTracker::new(),
        };

        tracing::debug!(
            max_concurrent = config.max_concurrent(),
            "queue controller created"
        );

        Self {
            config: Arc::new(config),
            event_tx,
            engine,
            extractor,
            queue_state,
        }
    }

    /// Subscribe to queue events
    ///
    /// Each subscriber has its own buffer of `queue.event_buffer` events; a subscriber
    /// that falls behind receives `RecvError::Lagged` and skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Configuration this controller was built with
    pub fn config(&self) -> &Config {
        &self.config
    }
}
