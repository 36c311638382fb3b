//! Configuration types for romm-dl

use crate::error::{Error, Result};
use crate::types::ArchiveType;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Transfer behavior configuration (concurrency, chunking, HTTP client)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Maximum concurrent downloads (default: 3, values below 1 are treated as 1)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_downloads: usize,

    /// Read buffer size for streaming the response body (default: 256 KiB)
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Minimum number of new bytes between progress reports (default: 512 KiB)
    #[serde(default = "default_progress_threshold")]
    pub progress_threshold: u64,

    /// TCP connect timeout (default: 30s)
    #[serde(default = "default_connect_timeout", with = "duration_ms_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: default_max_concurrent(),
            chunk_size: default_chunk_size(),
            progress_threshold: default_progress_threshold(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// HTTP basic-auth credentials for the asset server
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// External extraction tool configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Route the kinds in `external_kinds` through an external 7z executable (default: false)
    #[serde(default)]
    pub use_external_extractor: bool,

    /// Path to 7z executable (auto-detected if None)
    #[serde(default)]
    pub sevenzip_path: Option<PathBuf>,

    /// Whether to search PATH for the executable if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,

    /// Archive kinds handled by the external tool when enabled (default: 7z and RAR)
    #[serde(default = "default_external_kinds")]
    pub external_kinds: Vec<ArchiveType>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            use_external_extractor: false,
            sevenzip_path: None,
            search_path: true,
            external_kinds: default_external_kinds(),
        }
    }
}

/// Archive extraction configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Maximum depth for nested archive extraction (default: None = unbounded)
    #[serde(default)]
    pub max_recursion_depth: Option<u32>,
}

/// Partial-install cleanup configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Delete attempts per path (default: 6)
    #[serde(default = "default_cleanup_retries")]
    pub retries: u32,

    /// Fixed delay between attempts (default: 150ms)
    #[serde(default = "default_cleanup_delay", with = "duration_ms_serde")]
    pub retry_delay: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            retries: default_cleanup_retries(),
            retry_delay: default_cleanup_delay(),
        }
    }
}

/// Visible-queue behavior
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueueConfig {
    /// How long a completed job stays visible (default: 1000ms)
    #[serde(default = "default_success_grace", with = "duration_ms_serde")]
    pub success_grace: Duration,

    /// How long a canceled job stays visible (default: 500ms)
    #[serde(default = "default_cancel_grace", with = "duration_ms_serde")]
    pub cancel_grace: Duration,

    /// How long a failed job stays visible (default: 1500ms)
    #[serde(default = "default_failure_grace", with = "duration_ms_serde")]
    pub failure_grace: Duration,

    /// Event broadcast buffer per subscriber (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            success_grace: default_success_grace(),
            cancel_grace: default_cancel_grace(),
            failure_grace: default_failure_grace(),
            event_buffer: default_event_buffer(),
        }
    }
}

/// Disk space checking configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DiskSpaceConfig {
    /// Enable disk space checking (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum free space to keep after the download (default: 512 MiB)
    #[serde(default = "default_min_free_space")]
    pub min_free_space: u64,

    /// Multiplier for the declared size, to leave room for extraction (default: 2.0)
    #[serde(default = "default_size_multiplier")]
    pub size_multiplier: f64,
}

impl Default for DiskSpaceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_free_space: default_min_free_space(),
            size_multiplier: default_size_multiplier(),
        }
    }
}

/// Main configuration for [`QueueController`](crate::QueueController)
///
/// Per-mapping policy (auto-extract, manifest preference) travels on each
/// [`DownloadRequest`](crate::DownloadRequest); everything here is process-wide.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer settings
    #[serde(default)]
    pub download: DownloadConfig,

    /// Credentials for authenticated asset fetches
    #[serde(default)]
    pub credentials: Option<Credentials>,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,

    /// Extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Cleanup settings
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Visible-queue settings
    #[serde(default)]
    pub queue: QueueConfig,

    /// Disk space settings
    #[serde(default)]
    pub disk_space: DiskSpaceConfig,
}

impl Config {
    /// Load configuration from a JSON settings file
    ///
    /// Missing fields fall back to their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read settings file '{}': {}", path.display(), e),
            key: None,
        })?;
        let config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Effective concurrency limit, clamped to at least 1
    pub fn max_concurrent(&self) -> usize {
        self.download.max_concurrent_downloads.max(1)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.download.chunk_size == 0 {
            return Err(Error::Config {
                message: "chunk size must be greater than zero".to_string(),
                key: Some("download.chunk_size".to_string()),
            });
        }
        if self.queue.event_buffer == 0 {
            return Err(Error::Config {
                message: "event buffer must be greater than zero".to_string(),
                key: Some("queue.event_buffer".to_string()),
            });
        }
        if !(self.disk_space.size_multiplier.is_finite() && self.disk_space.size_multiplier >= 0.0)
        {
            return Err(Error::Config {
                message: "size multiplier must be a non-negative number".to_string(),
                key: Some("disk_space.size_multiplier".to_string()),
            });
        }
        Ok(())
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> usize {
    3
}

fn default_chunk_size() -> usize {
    256 * 1024
}

fn default_progress_threshold() -> u64 {
    512 * 1024
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    concat!("romm-dl/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_external_kinds() -> Vec<ArchiveType> {
    vec![ArchiveType::SevenZip, ArchiveType::Rar]
}

fn default_cleanup_retries() -> u32 {
    6
}

fn default_cleanup_delay() -> Duration {
    Duration::from_millis(150)
}

fn default_success_grace() -> Duration {
    Duration::from_millis(1000)
}

fn default_cancel_grace() -> Duration {
    Duration::from_millis(500)
}

fn default_failure_grace() -> Duration {
    Duration::from_millis(1500)
}

fn default_event_buffer() -> usize {
    1000
}

fn default_min_free_space() -> u64 {
    512 * 1024 * 1024
}

fn default_size_multiplier() -> f64 {
    2.0
}

// Duration serialization helper (milliseconds)
mod duration_ms_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
