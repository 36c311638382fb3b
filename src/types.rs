//! Core types for romm-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Unique identifier for an install job
///
/// The catalog side usually derives this from the game's own id so that a later
/// cancel request can be routed without keeping extra state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub uuid::Uuid);

impl JobId {
    /// Create a fresh random JobId
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Get the inner UUID
    pub fn get(&self) -> uuid::Uuid {
        self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for JobId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Job status
///
/// `Queued -> Downloading -> (Extracting)? -> Completed`, or `-> Canceled` / `-> Failed`
/// from any non-terminal state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Waiting for a concurrency slot
    Queued,
    /// Transferring bytes from the server
    Downloading,
    /// Unpacking the downloaded archive
    Extracting,
    /// Installed successfully
    Completed,
    /// Failed with error
    Failed,
    /// Canceled by the caller
    Canceled,
}

impl Status {
    /// Completed, Failed and Canceled are final
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Completed | Status::Failed | Status::Canceled)
    }

    /// Downloading or Extracting, i.e. holding a concurrency slot
    pub fn is_running(&self) -> bool {
        matches!(self, Status::Downloading | Status::Extracting)
    }
}

/// Observable record of one job's lifecycle
///
/// This is plain data. The controller mutates it through [`QueueItem::set_status`] and
/// [`QueueItem::set_progress`] and publishes an [`Event`] for each change; observers
/// only ever see clones.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Job ID
    pub id: JobId,
    /// Display name
    pub name: String,
    /// When the job was enqueued
    pub queued_at: DateTime<Utc>,
    /// Current status
    pub status: Status,
    /// Human-readable status, including a live percentage while running
    pub status_text: String,
    /// Progress value (bytes while downloading, entries while extracting)
    pub progress_value: f64,
    /// Progress maximum, never below 1
    pub progress_maximum: f64,
    /// True when the maximum is unknown and a spinner should be shown
    pub is_indeterminate: bool,
}

impl QueueItem {
    /// Create a new item in the Queued state with indeterminate progress
    pub fn new(id: JobId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            queued_at: Utc::now(),
            status: Status::Queued,
            status_text: "Queued".to_string(),
            progress_value: 0.0,
            progress_maximum: 1.0,
            is_indeterminate: true,
        }
    }

    /// Set status and status text
    pub fn set_status(&mut self, status: Status, text: impl Into<String>) {
        self.status = status;
        self.status_text = text.into();
    }

    /// Set progress; a maximum below 1 is coerced to 1
    pub fn set_progress(&mut self, value: f64, maximum: f64, indeterminate: bool) {
        self.progress_value = value;
        self.progress_maximum = if maximum < 1.0 { 1.0 } else { maximum };
        self.is_indeterminate = indeterminate;
    }

    /// Progress as a percentage (0.0 to 100.0)
    pub fn percent(&self) -> f64 {
        (self.progress_value / self.progress_maximum * 100.0).clamp(0.0, 100.0)
    }
}

/// Archive container detected by magic bytes
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArchiveType {
    /// ZIP archive
    Zip,
    /// 7-Zip archive
    SevenZip,
    /// RAR archive (v4 or v5)
    Rar,
}

/// Byte-level progress reported by the transfer engine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    /// Bytes written to disk so far
    pub bytes_written: u64,
    /// Content length declared by the server, if any
    pub total: Option<u64>,
}

/// Entry-level progress reported by the extractor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ExtractProgress {
    /// Entries written so far
    pub done: usize,
    /// Number of file entries in the archive
    pub total: usize,
}

impl ExtractProgress {
    /// Percentage complete; an empty archive counts as complete
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.done as f64 / self.total as f64 * 100.0
        }
    }
}

/// Outcome handed to the installed callback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallResult {
    /// Install directory of the job
    pub install_dir: PathBuf,
    /// Resolved installable files
    pub files: Vec<PathBuf>,
}

/// Event emitted to queue observers
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job added to the visible queue
    Queued {
        /// Job ID
        id: JobId,
        /// Display name
        name: String,
    },

    /// Job status or status text changed
    StatusChanged {
        /// Job ID
        id: JobId,
        /// New status
        status: Status,
        /// New status text
        text: String,
    },

    /// Job progress changed
    Progress {
        /// Job ID
        id: JobId,
        /// Progress value
        value: f64,
        /// Progress maximum (at least 1)
        maximum: f64,
        /// Whether the maximum is unknown
        indeterminate: bool,
    },

    /// Job removed from the visible queue after its grace delay
    Removed {
        /// Job ID
        id: JobId,
    },
}

impl Event {
    /// Job this event refers to
    pub fn job_id(&self) -> JobId {
        match self {
            Event::Queued { id, .. }
            | Event::StatusChanged { id, .. }
            | Event::Progress { id, .. }
            | Event::Removed { id } => *id,
        }
    }
}
