//! # romm-dl
//!
//! Bounded-concurrency download, extract and install queue for ROM archives served by a
//! RomM library.
//!
//! ## Design Philosophy
//!
//! romm-dl is designed to be:
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding in a launcher
//! - **Event-driven** - Consumers subscribe to queue events, no polling required
//! - **Crash-safe** - Canceled and failed jobs clean up their partial files
//! - **Sensible defaults** - Works out of the box with zero configuration
//!
//! ## Quick Start
//!
//! ```no_run
//! use romm_dl::{Config, DownloadRequest, QueueController};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let controller = QueueController::new(Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = controller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     controller.enqueue(
//!         DownloadRequest::new(
//!             "Final Fantasy VII",
//!             "https://romm.local/api/roms/12/content/ff7.zip",
//!             "/games/psx/Final Fantasy VII",
//!             "/games/psx/Final Fantasy VII/ff7.zip",
//!         )
//!         .has_multiple_files(true)
//!         .auto_extract(true)
//!         .on_installed(|result| println!("launch {:?}", result.files)),
//!     )?;
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Cleanup of partial installs
pub mod cleanup;
/// Configuration types
pub mod config;
/// Queue controller (decomposed into focused submodules)
pub mod downloader;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Resolving installed files
pub mod installed;
/// HTTP transfer engine
pub mod transfer;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use downloader::{DownloadRequest, QueueController};
pub use error::{Error, ExtractionError, Result, TransferError};
pub use installed::ResolveOptions;
pub use types::{Event, InstallResult, JobId, QueueItem, Status};

/// Helper function to run the controller with graceful signal handling.
///
/// Waits for a termination signal and then calls the controller's `shutdown()` method,
/// which cancels and cleans up every unfinished job.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with a ctrl_c fallback if registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use romm_dl::{Config, QueueController, run_with_shutdown};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let controller = QueueController::new(Config::default())?;
///
///     // Run with automatic signal handling
///     run_with_shutdown(controller).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(controller: QueueController) {
    wait_for_signal().await;
    controller.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
