//! HTTP transfer engine
//!
//! Streams a response body to disk in fixed-size chunks. Cancellation is checked before
//! every read and raced against each read, so an abort takes effect within one chunk.
//! A canceled or failed transfer leaves its partial file behind; removing it is the
//! caller's job (see [`crate::cleanup`]).

use crate::config::{Config, Credentials, DiskSpaceConfig};
use crate::error::{Error, Result, TransferError};
use crate::types::TransferProgress;
use futures::TryStreamExt;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Result of a completed transfer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferOutcome {
    /// Bytes written to the destination file
    pub bytes_written: u64,
    /// Content length declared by the server, if any
    pub total: Option<u64>,
}

/// Streams HTTP responses to files
///
/// Owns a single [`reqwest::Client`] built once from [`Config`]; cloning the engine
/// shares the client's connection pool.
#[derive(Clone, Debug)]
pub struct TransferEngine {
    client: reqwest::Client,
    credentials: Option<Credentials>,
    chunk_size: usize,
    progress_threshold: u64,
    disk_space: DiskSpaceConfig,
}

impl TransferEngine {
    /// Build an engine with a client configured from `config`
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.download.connect_timeout)
            .user_agent(config.download.user_agent.clone())
            .build()
            .map_err(|e| Error::Config {
                message: format!("Failed to create HTTP client: {}", e),
                key: Some("download".to_string()),
            })?;

        Ok(Self::with_client(client, config))
    }

    /// Build an engine around an existing client
    pub fn with_client(client: reqwest::Client, config: &Config) -> Self {
        Self {
            client,
            credentials: config.credentials.clone(),
            chunk_size: config.download.chunk_size.max(1),
            progress_threshold: config.download.progress_threshold,
            disk_space: config.disk_space.clone(),
        }
    }

    /// Download `url` into `dest`, reporting byte progress through `on_progress`
    ///
    /// `on_progress` is called once when headers arrive, then whenever at least
    /// `progress_threshold` new bytes have been written, and once more at the end with
    /// the exact byte count.
    ///
    /// # Errors
    ///
    /// - [`TransferError::HttpStatus`] for a non-success response (no file is created)
    /// - [`Error::InsufficientSpace`] when the declared length does not fit on disk
    /// - [`TransferError::Interrupted`] when the body fails mid-stream
    /// - [`Error::Cancelled`] when `cancel` fires
    pub async fn transfer(
        &self,
        url: &url::Url,
        dest: &Path,
        cancel: &CancellationToken,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<TransferOutcome> {
        debug!(%url, ?dest, "starting transfer");

        let mut request = self.client.get(url.clone());
        if let Some(creds) = &self.credentials {
            request = request.basic_auth(&creds.username, Some(&creds.password));
        }

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            response = request.send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TransferError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }
            .into());
        }

        let total = response.content_length();
        on_progress(TransferProgress {
            bytes_written: 0,
            total,
        });

        if let Some(parent) = dest.parent() {
            if let Some(length) = total {
                crate::utils::check_disk_space(&self.disk_space, parent, length)?;
            }
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(dest).await?;
        let mut reader = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));
        let mut buffer = vec![0u8; self.chunk_size];
        let mut bytes_written: u64 = 0;
        let mut last_report: u64 = 0;

        loop {
            if cancel.is_cancelled() {
                file.flush().await.ok();
                return Err(Error::Cancelled);
            }

            let read = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    file.flush().await.ok();
                    return Err(Error::Cancelled);
                }
                read = reader.read(&mut buffer) => read.map_err(|e| TransferError::Interrupted {
                    url: url.to_string(),
                    bytes_written,
                    reason: e.to_string(),
                })?,
            };

            if read == 0 {
                break;
            }

            file.write_all(&buffer[..read]).await?;
            bytes_written += read as u64;

            if bytes_written - last_report >= self.progress_threshold {
                last_report = bytes_written;
                on_progress(TransferProgress {
                    bytes_written,
                    total,
                });
            }
        }

        file.flush().await?;
        file.sync_all().await?;

        on_progress(TransferProgress {
            bytes_written,
            total,
        });

        info!(%url, bytes_written, ?total, "transfer complete");

        Ok(TransferOutcome {
            bytes_written,
            total,
        })
    }
}
