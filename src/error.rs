//! Error types for romm-dl
//!
//! This module provides the error taxonomy for the install pipeline:
//! - Transfer errors (non-success HTTP status, interrupted body)
//! - Extraction errors (corrupt archive, unsupported container, external tool failures)
//! - A distinguished cancellation variant, kept apart from generic failure
//! - Path validation errors for server-controlled file names and archive entries
//!
//! Cleanup never surfaces an error; see [`crate::cleanup`].

use std::path::PathBuf;
use thiserror::Error;

use crate::types::JobId;

/// Result type alias for romm-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for romm-dl
///
/// Every variant except [`Error::Cancelled`] sends a job down the failure path.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "download.chunk_size")
        key: Option<String>,
    },

    /// HTTP transfer failed
    #[error("transfer error: {0}")]
    Transfer(#[from] TransferError),

    /// Archive extraction failed
    #[error("extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// The job's cancellation token was triggered
    #[error("operation canceled")]
    Cancelled,

    /// A path supplied by the server or the caller is unsafe to use
    #[error("invalid path {}: {reason}", .path.display())]
    InvalidPath {
        /// The rejected path
        path: PathBuf,
        /// Why it was rejected
        reason: String,
    },

    /// The download URL could not be parsed
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        /// The URL as supplied in the request
        url: String,
        /// Parser error
        #[source]
        source: url::ParseError,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error (connection refused, TLS failure, timeout, ...)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error (settings file)
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Insufficient disk space for the declared download size
    #[error("insufficient disk space: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        /// Number of bytes required for the operation
        required: u64,
        /// Number of bytes currently available on disk
        available: u64,
    },

    /// Failed to check disk space
    #[error("failed to check disk space: {0}")]
    DiskSpaceCheckFailed(String),

    /// External tool could not be launched
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// A job with the same id is still active or visible in the queue
    #[error("job {0} is already queued")]
    AlreadyQueued(JobId),

    /// Shutdown in progress - not accepting new requests
    #[error("shutdown in progress: not accepting new requests")]
    ShuttingDown,

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Returns true if this error represents cooperative cancellation rather than failure
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// HTTP transfer errors
#[derive(Debug, Error)]
pub enum TransferError {
    /// The server answered with a non-success status code
    #[error("server returned HTTP {status} for {url}")]
    HttpStatus {
        /// HTTP status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// The response body ended with an error after some bytes were written
    #[error("transfer of {url} interrupted after {bytes_written} bytes: {reason}")]
    Interrupted {
        /// Requested URL
        url: String,
        /// Bytes written to disk before the failure
        bytes_written: u64,
        /// Underlying error message
        reason: String,
    },
}

impl TransferError {
    /// HTTP status code, if this error came from a non-success response
    pub fn status(&self) -> Option<u16> {
        match self {
            TransferError::HttpStatus { status, .. } => Some(*status),
            TransferError::Interrupted { .. } => None,
        }
    }
}

/// Archive extraction errors
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The file is not a container format this crate can open
    #[error("unsupported archive format: {}", .archive.display())]
    UnsupportedFormat {
        /// The file that was probed
        archive: PathBuf,
    },

    /// The archive could not be read or written out
    #[error("extraction failed for {}: {reason}", .archive.display())]
    Failed {
        /// The archive file that failed to extract
        archive: PathBuf,
        /// The reason extraction failed
        reason: String,
    },

    /// An archive entry would be written outside the destination directory
    #[error("archive {} contains an entry outside the destination: {}", .archive.display(), .entry.display())]
    PathTraversal {
        /// The archive being extracted
        archive: PathBuf,
        /// The offending entry path
        entry: PathBuf,
    },

    /// The external extraction tool exited unsuccessfully
    #[error("{} exited with {} while extracting {}: {stderr}", .tool.display(), describe_exit(.code), .archive.display())]
    ToolFailed {
        /// Tool binary that was invoked
        tool: PathBuf,
        /// The archive being extracted
        archive: PathBuf,
        /// Exit code, if the process exited normally
        code: Option<i32>,
        /// Captured standard error (trimmed)
        stderr: String,
    },

    /// The blocking extraction task panicked or was aborted
    #[error("extraction task for {} did not complete: {reason}", .archive.display())]
    TaskFailed {
        /// The archive being extracted
        archive: PathBuf,
        /// Join error description
        reason: String,
    },
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("code {c}"),
        None => "signal".to_string(),
    }
}
