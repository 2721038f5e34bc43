//! Batched transfer scheduling.
//!
//! Tasks are split into fixed-size batches. Inside a batch, transfers run
//! either behind a semaphore (parallel mode) or one by one with a short pause
//! between files. Every transfer future returns its outcome; the
//! scheduler folds those into a [`ScheduleOutcome`], so the counters have a
//! single owner.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{Semaphore, broadcast};
use tokio_util::sync::CancellationToken;

use crate::client::ChannelClient;
use crate::config::Config;
use crate::error::{ClientError, Error, Result};
use crate::types::{DownloadTask, Event, FailureRecord, TaskId};

use super::budget::ConnectionBudget;
use super::progress::{BatchTracker, ProgressSink};

/// Suffix of in-progress files
const PART_SUFFIX: &str = ".part";

/// Terminal state of one transfer
#[derive(Debug)]
pub(crate) enum TransferOutcome {
    /// Transferred and renamed into place
    Downloaded {
        /// Bytes written
        bytes: u64,
    },
    /// Transfer failed; the batch continues
    Failed(Error),
    /// Not attempted or interrupted because the run was cancelled
    Cancelled,
}

/// Counters of one channel's transfers
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    /// Files downloaded
    pub downloaded: usize,
    /// Files that failed
    pub failed: usize,
    /// Files not completed because the run was cancelled
    pub cancelled: usize,
    /// Files that would have been downloaded (dry-run)
    pub planned: usize,
    /// Bytes written by successful transfers
    pub bytes: u64,
    /// Failures with their reasons
    pub failures: Vec<FailureRecord>,
}

impl ScheduleOutcome {
    fn record(&mut self, task: &DownloadTask, outcome: TransferOutcome) {
        match outcome {
            TransferOutcome::Downloaded { bytes } => {
                self.downloaded += 1;
                self.bytes += bytes;
            }
            TransferOutcome::Failed(e) => {
                self.failed += 1;
                self.failures.push(FailureRecord::from_error(
                    task.target_path().display().to_string(),
                    &e,
                ));
            }
            TransferOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

/// Split tasks into consecutive batches of at most `batch_size`
pub(crate) fn prepare_batches(tasks: Vec<DownloadTask>, batch_size: usize) -> Vec<Vec<DownloadTask>> {
    let batch_size = batch_size.max(1);
    let mut batches = Vec::with_capacity(tasks.len().div_ceil(batch_size));
    let mut tasks = tasks.into_iter().peekable();
    while tasks.peek().is_some() {
        batches.push(tasks.by_ref().take(batch_size).collect());
    }
    batches
}

/// Path a transfer writes to before it is renamed into place
///
/// Tagged with the task id so concurrent transfers never share a part file.
pub(crate) fn part_path(final_path: &Path, task_id: TaskId) -> PathBuf {
    let mut name = final_path.as_os_str().to_os_string();
    name.push(format!(
        ".{}-{}{PART_SUFFIX}",
        task_id.channel_id, task_id.message_id
    ));
    PathBuf::from(name)
}

/// Runs the download tasks of one channel
pub struct Scheduler {
    client: Arc<dyn ChannelClient>,
    config: Arc<Config>,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
    budget: Arc<ConnectionBudget>,
    identifier: String,
}

impl Scheduler {
    pub(crate) fn new(
        client: Arc<dyn ChannelClient>,
        config: Arc<Config>,
        event_tx: broadcast::Sender<Event>,
        cancel_token: CancellationToken,
        budget: Arc<ConnectionBudget>,
        identifier: &str,
    ) -> Self {
        Self {
            client,
            config,
            event_tx,
            cancel_token,
            budget,
            identifier: identifier.to_string(),
        }
    }

    /// Transfer every task and report the counters
    pub async fn run(&self, tasks: Vec<DownloadTask>) -> ScheduleOutcome {
        let mut outcome = ScheduleOutcome::default();
        if tasks.is_empty() {
            return outcome;
        }

        if self.config.download.dry_run {
            for task in &tasks {
                tracing::info!(
                    channel = %self.identifier,
                    file = %task.target_path().display(),
                    size = task.size(),
                    "Dry run: would download"
                );
            }
            outcome.planned = tasks.len();
            return outcome;
        }

        let batches = prepare_batches(tasks, self.config.download.batch_size);
        let total_batches = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            if self.cancel_token.is_cancelled() {
                outcome.cancelled += batch.len();
                continue;
            }

            tracing::info!(
                channel = %self.identifier,
                batch = index + 1,
                total_batches,
                files = batch.len(),
                "Starting batch"
            );
            self.event_tx
                .send(Event::BatchStarted {
                    identifier: self.identifier.clone(),
                    batch: index + 1,
                    total_batches,
                    files: batch.len(),
                })
                .ok();

            let tracker = BatchTracker::new(&self.identifier, batch.len(), self.event_tx.clone());
            let results = if self.config.download.parallel {
                self.run_parallel(&batch, &tracker).await
            } else {
                self.run_sequential(&batch, &tracker).await
            };
            for (task, result) in batch.iter().zip(results) {
                outcome.record(task, result);
            }

            tracing::info!(
                channel = %self.identifier,
                batch = index + 1,
                completed = tracker.completed(),
                downloaded = outcome.downloaded,
                failed = outcome.failed,
                "Batch finished"
            );

            self.pause(self.config.download.inter_batch_delay).await;
        }

        outcome
    }

    async fn run_parallel(&self, batch: &[DownloadTask], tracker: &BatchTracker) -> Vec<TransferOutcome> {
        let gate = Semaphore::new(self.config.download.max_concurrent_transfers);
        join_all(batch.iter().map(|task| {
            let gate = &gate;
            async move {
                let Ok(_permit) = gate.acquire().await else {
                    return TransferOutcome::Cancelled;
                };
                self.transfer(task, tracker).await
            }
        }))
        .await
    }

    async fn run_sequential(&self, batch: &[DownloadTask], tracker: &BatchTracker) -> Vec<TransferOutcome> {
        let mut results = Vec::with_capacity(batch.len());
        for task in batch {
            results.push(self.transfer(task, tracker).await);
            self.pause(self.config.download.sequential_pacing).await;
        }
        results
    }

    /// Sleep unless the run is cancelled first
    async fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.cancel_token.cancelled() => {}
        }
    }

    /// Run one transfer to a terminal state, emitting its events
    async fn transfer(&self, task: &DownloadTask, tracker: &BatchTracker) -> TransferOutcome {
        if self.cancel_token.is_cancelled() {
            return TransferOutcome::Cancelled;
        }

        let final_path = task.target_path();
        let result = tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => None,
            result = self.transfer_file(task, &final_path) => Some(result),
        };

        match result {
            None => {
                tracing::info!(file = %final_path.display(), "Transfer cancelled");
                remove_part_file(&part_path(&final_path, task.id)).await;
                TransferOutcome::Cancelled
            }
            Some(Ok(bytes)) => {
                tracing::info!(
                    channel = %self.identifier,
                    file = %final_path.display(),
                    bytes,
                    "Downloaded"
                );
                self.event_tx
                    .send(Event::FileComplete {
                        task_id: task.id,
                        path: final_path,
                        bytes,
                    })
                    .ok();
                tracker.complete_one();
                TransferOutcome::Downloaded { bytes }
            }
            Some(Err(e)) => {
                if e.is_connection() {
                    self.budget.record(&task.id.to_string());
                }
                tracing::warn!(
                    channel = %self.identifier,
                    file = %task.display_name(),
                    error = %e,
                    "Download failed"
                );
                self.event_tx
                    .send(Event::FileFailed {
                        task_id: task.id,
                        error: e.to_string(),
                    })
                    .ok();
                tracker.complete_one();
                TransferOutcome::Failed(e)
            }
        }
    }

    /// Download into the part file, then rename it into place
    async fn transfer_file(&self, task: &DownloadTask, final_path: &Path) -> Result<u64> {
        let file = task.message.file.as_ref().ok_or_else(|| Error::Transfer {
            file: final_path.to_path_buf(),
            reason: "message has no attachment".to_string(),
        })?;

        tokio::fs::create_dir_all(&task.target_dir).await?;

        let part = part_path(final_path, task.id);
        let sink = ProgressSink::new(task.id, file.size, self.event_tx.clone());
        tracing::debug!(file = %part.display(), size = file.size, "Starting transfer");

        let bytes = match self.client.download_media(file, &part, &sink).await {
            Ok(bytes) => bytes,
            Err(e) => {
                remove_part_file(&part).await;
                return Err(match e {
                    ClientError::Connection(msg) => Error::Connection(msg),
                    other => Error::Transfer {
                        file: final_path.to_path_buf(),
                        reason: other.to_string(),
                    },
                });
            }
        };

        if let Err(e) = tokio::fs::rename(&part, final_path).await {
            remove_part_file(&part).await;
            return Err(Error::Transfer {
                file: final_path.to_path_buf(),
                reason: format!("cannot move completed file into place: {e}"),
            });
        }
        Ok(bytes)
    }
}

/// Best-effort removal of a transfer's part file
async fn remove_part_file(part: &Path) {
    match tokio::fs::remove_file(part).await {
        Ok(()) => tracing::debug!(file = %part.display(), "Removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %part.display(), error = %e, "Failed to remove partial file"),
    }
}
