//! # channel-dl
//!
//! Bulk retrieval of file attachments posted in messaging-service channels.
//!
//! ## Design Philosophy
//!
//! channel-dl is designed to be:
//! - **Policy-driven** - File type, size ceiling and dedup decide what is fetched
//! - **Idempotent** - A second run over an unchanged channel downloads nothing
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! The messaging service itself is reached through a [`ChannelClient`]
//! implementation supplied by the consumer.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use async_trait::async_trait;
//! use channel_dl::client::{EntityQuery, MessageQuery, ResolvedEntity};
//! use channel_dl::error::ClientError;
//! use channel_dl::types::{Channel, FileAttachment, Message};
//! use channel_dl::{ChannelClient, ChannelDownloader, Config, ProgressSink, Target, Targets};
//!
//! struct MyClient;
//!
//! #[async_trait]
//! impl ChannelClient for MyClient {
//!     async fn get_entity(&self, query: &EntityQuery) -> Result<ResolvedEntity, ClientError> {
//!         Err(ClientError::NotFound(query.to_string()))
//!     }
//!     async fn get_messages(&self, _: &Channel, _: &MessageQuery) -> Result<Vec<Message>, ClientError> {
//!         Ok(Vec::new())
//!     }
//!     async fn download_media(&self, _: &FileAttachment, _: &Path, _: &ProgressSink) -> Result<u64, ClientError> {
//!         Err(ClientError::Other("not connected".into()))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let downloader = ChannelDownloader::new(Arc::new(MyClient), Config::default())?;
//!
//!     // Subscribe to events
//!     let mut events = downloader.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let targets: Targets = [Target::new("some_channel")].into_iter().collect();
//!     let summary = downloader.acquire(&targets).await?;
//!     println!("downloaded {} files", summary.downloaded());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Remote service client contract
pub mod client;
/// Configuration types
pub mod config;
/// Acquisition engine (decomposed into focused submodules)
pub mod downloader;
/// File-message enumeration
pub mod enumerator;
/// Error types
pub mod error;
/// Token extraction from message text
pub mod extraction;
/// Filter and dedup engine
pub mod filter;
/// Filename sanitizing and on-disk layout
pub mod naming;
/// Channel resolution
pub mod resolver;
/// Core types and events
pub mod types;

use std::future::Future;

// Re-export commonly used types
pub use client::ChannelClient;
pub use config::Config;
pub use downloader::{ChannelDownloader, ProgressSink};
pub use error::{ClientError, Error, Result};
pub use types::{AcquisitionSummary, ChannelSummary, Event, SkipReason, Target, Targets};

/// Acquire `targets`, stopping early on SIGTERM/SIGINT.
///
/// On a signal the downloader is shut down, in-flight transfers are
/// cancelled and counted as such, and the partial summary is returned. The
/// client is disconnected on every exit path.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use channel_dl::{ChannelDownloader, Targets, run_with_shutdown};
///
/// async fn run(downloader: ChannelDownloader, targets: Targets) -> channel_dl::Result<()> {
///     let summary = run_with_shutdown(&downloader, &targets).await?;
///     println!("{} downloaded, {} cancelled", summary.downloaded(), summary.cancelled());
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    downloader: &ChannelDownloader,
    targets: &Targets,
) -> Result<AcquisitionSummary> {
    run_until(downloader, targets, wait_for_signal()).await
}

/// Acquire `targets` until `shutdown` completes.
///
/// Same contract as [`run_with_shutdown`] with a caller-supplied trigger.
pub async fn run_until<F>(
    downloader: &ChannelDownloader,
    targets: &Targets,
    shutdown: F,
) -> Result<AcquisitionSummary>
where
    F: Future<Output = ()>,
{
    let acquisition = downloader.acquire(targets);
    tokio::pin!(acquisition);

    let finished = tokio::select! {
        result = &mut acquisition => Some(result),
        () = shutdown => None,
    };
    let result = match finished {
        Some(result) => result,
        None => {
            downloader.shutdown();
            acquisition.await
        }
    };

    if let Err(e) = downloader.disconnect().await {
        tracing::warn!(error = %e, "Failed to disconnect client");
    }
    result
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
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
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
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
