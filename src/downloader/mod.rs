//! Acquisition engine split into focused submodules.
//!
//! The [`ChannelDownloader`] struct and its methods are organized by concern:
//! - [`channel`] - Per-channel flow (resolve, enumerate, filter, schedule)
//! - [`scheduler`] - Batched, bounded-concurrency transfers
//! - [`progress`] - Per-file and per-batch progress tracking
//! - [`budget`] - Connection error budget of a run

mod budget;
mod channel;
mod progress;
pub mod scheduler;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

pub use progress::ProgressSink;
pub use scheduler::{ScheduleOutcome, Scheduler};

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::client::ChannelClient;
use crate::config::Config;
use crate::enumerator::MessageEnumerator;
use crate::error::{Error, Result};
use crate::filter::{DestinationClaims, FilterPolicy};
use crate::resolver::EntityResolver;
use crate::types::{AcquisitionSummary, ChannelSummary, Event, Target, Targets};

use budget::ConnectionBudget;

/// Maximum number of channels acquired at the same time
pub const CHANNEL_CONCURRENCY: usize = 3;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1000;

/// State shared by the channels of one acquisition run
pub(crate) struct RunContext {
    /// Cancelled on shutdown or when the connection budget runs out
    pub(crate) cancel_token: CancellationToken,
    /// Connection errors of this run
    pub(crate) budget: Arc<ConnectionBudget>,
    /// Destinations reserved by this run's channels
    pub(crate) claims: DestinationClaims,
}

impl RunContext {
    fn new(parent: &CancellationToken, max_errors: usize) -> Self {
        let cancel_token = parent.child_token();
        Self {
            budget: Arc::new(ConnectionBudget::new(max_errors, cancel_token.clone())),
            cancel_token,
            claims: DestinationClaims::new(),
        }
    }
}

/// Main downloader instance (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct ChannelDownloader {
    /// Remote service client
    pub(crate) client: Arc<dyn ChannelClient>,
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Identifier to channel cache, kept for the downloader's lifetime
    pub(crate) resolver: Arc<EntityResolver>,
    /// Message listing cache
    pub(crate) enumerator: Arc<MessageEnumerator>,
    /// Filtering rules derived from the configuration
    pub(crate) policy: Arc<FilterPolicy>,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: broadcast::Sender<Event>,
    /// Cancelled by [`shutdown`](Self::shutdown); every run derives its token from it
    pub(crate) cancel_token: CancellationToken,
}

impl ChannelDownloader {
    /// Create a downloader
    ///
    /// The configuration is validated; nothing is contacted or created on disk
    /// until a channel is acquired.
    pub fn new(client: Arc<dyn ChannelClient>, config: Config) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let policy = FilterPolicy::from_config(&config);
        let resolver = EntityResolver::new(Arc::clone(&client));
        let enumerator = MessageEnumerator::new(Arc::clone(&client), config.cache.message_ttl);

        Ok(Self {
            client,
            config: Arc::new(config),
            resolver: Arc::new(resolver),
            enumerator: Arc::new(enumerator),
            policy: Arc::new(policy),
            event_tx,
            cancel_token: CancellationToken::new(),
        })
    }

    /// Subscribe to downloader events
    ///
    /// A slow subscriber misses the oldest events once the buffer is full.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// The active configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The channel resolver and its cache
    pub fn resolver(&self) -> &EntityResolver {
        &self.resolver
    }

    /// The message enumerator and its cache
    pub fn enumerator(&self) -> &MessageEnumerator {
        &self.enumerator
    }

    /// Acquire every target
    ///
    /// With more than one target and parallel mode enabled, up to
    /// [`CHANNEL_CONCURRENCY`] channels run at once; otherwise they run in
    /// order. A failing channel never affects the others. Summaries come back
    /// in target order.
    ///
    /// # Errors
    ///
    /// [`Error::ConnectionBudgetExhausted`] when the run was stopped because
    /// too many connection errors occurred.
    pub async fn acquire(&self, targets: &Targets) -> Result<AcquisitionSummary> {
        let run = RunContext::new(&self.cancel_token, self.config.connection.max_errors);
        tracing::info!(
            channels = targets.len(),
            parallel = self.config.download.parallel,
            dry_run = self.config.download.dry_run,
            "Starting acquisition"
        );

        let channels = if targets.len() > 1 && self.config.download.parallel {
            let gate = Semaphore::new(CHANNEL_CONCURRENCY);
            join_all(targets.iter().map(|target| {
                let gate = &gate;
                let run = &run;
                async move {
                    let Ok(_permit) = gate.acquire().await else {
                        return ChannelSummary {
                            identifier: target.identifier.clone(),
                            title: target.identifier.clone(),
                            ..Default::default()
                        };
                    };
                    self.run_channel(target, run).await
                }
            }))
            .await
        } else {
            let mut channels = Vec::with_capacity(targets.len());
            for target in targets.iter() {
                channels.push(self.run_channel(target, &run).await);
            }
            channels
        };

        let summary = AcquisitionSummary { channels };
        tracing::info!(
            downloaded = summary.downloaded(),
            failed = summary.failed(),
            cancelled = summary.cancelled(),
            skipped = summary.skipped().total(),
            "Acquisition finished"
        );

        if run.budget.is_exhausted() {
            return Err(Error::ConnectionBudgetExhausted {
                errors: run.budget.errors(),
                budget: run.budget.max_errors(),
            });
        }
        Ok(summary)
    }

    /// Acquire a single channel
    ///
    /// Errors are reported in the summary rather than returned.
    pub async fn acquire_channel(&self, target: &Target) -> ChannelSummary {
        let run = RunContext::new(&self.cancel_token, self.config.connection.max_errors);
        self.run_channel(target, &run).await
    }

    /// Cancel outstanding and future work
    ///
    /// Transfers in flight are interrupted and counted as cancelled.
    pub fn shutdown(&self) {
        tracing::info!("Shutdown requested, cancelling downloads");
        self.cancel_token.cancel();
    }

    /// Whether [`shutdown`](Self::shutdown) was called
    pub fn is_shutting_down(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Release the client session
    pub async fn disconnect(&self) -> Result<()> {
        self.client.disconnect().await.map_err(Error::from)
    }
}
