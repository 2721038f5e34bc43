//! Per-file and per-batch progress tracking.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use tokio::sync::broadcast;

use crate::types::{Event, TaskId};

/// Progress callback handed to [`ChannelClient::download_media`]
///
/// Every report updates the tracker and is forwarded as
/// [`Event::FileProgress`]. Send errors (no subscribers) are ignored.
///
/// [`ChannelClient::download_media`]: crate::client::ChannelClient::download_media
pub struct ProgressSink {
    task_id: TaskId,
    bytes_done: AtomicU64,
    bytes_total: AtomicU64,
    event_tx: broadcast::Sender<Event>,
}

impl ProgressSink {
    /// Tracker for one file of `bytes_total` expected bytes
    pub fn new(task_id: TaskId, bytes_total: u64, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            task_id,
            bytes_done: AtomicU64::new(0),
            bytes_total: AtomicU64::new(bytes_total),
            event_tx,
        }
    }

    /// Record that `bytes_done` of `bytes_total` bytes have been received
    pub fn report(&self, bytes_done: u64, bytes_total: u64) {
        self.bytes_done.store(bytes_done, Ordering::Relaxed);
        self.bytes_total.store(bytes_total, Ordering::Relaxed);
        self.event_tx
            .send(Event::FileProgress {
                task_id: self.task_id,
                bytes_done,
                bytes_total,
            })
            .ok();
    }

    /// Task this sink reports for
    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// Bytes received so far
    pub fn bytes_done(&self) -> u64 {
        self.bytes_done.load(Ordering::Relaxed)
    }

    /// Expected size
    pub fn bytes_total(&self) -> u64 {
        self.bytes_total.load(Ordering::Relaxed)
    }
}

/// Aggregate tracker for one batch: files finished out of files scheduled
pub(crate) struct BatchTracker {
    identifier: String,
    total: usize,
    completed: AtomicUsize,
    event_tx: broadcast::Sender<Event>,
}

impl BatchTracker {
    pub(crate) fn new(identifier: &str, total: usize, event_tx: broadcast::Sender<Event>) -> Self {
        Self {
            identifier: identifier.to_string(),
            total,
            completed: AtomicUsize::new(0),
            event_tx,
        }
    }

    /// Count one finished file (downloaded or failed) and emit the new total
    pub(crate) fn complete_one(&self) -> usize {
        let completed = self.completed.fetch_add(1, Ordering::Relaxed) + 1;
        self.event_tx
            .send(Event::BatchProgress {
                identifier: self.identifier.clone(),
                completed,
                total: self.total,
            })
            .ok();
        completed
    }

    pub(crate) fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }
}
