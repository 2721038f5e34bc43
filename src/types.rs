//! Core types for channel-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::extraction::ExtractedToken;

/// Opaque handle the remote client uses to address a resolved channel
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelHandle(pub String);

/// A resolved channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// The identifier the channel was requested by (numeric id or handle)
    pub identifier: String,
    /// Numeric channel id reported by the service
    pub id: i64,
    /// Display title
    pub title: String,
    /// Handle for subsequent client calls
    pub handle: ChannelHandle,
}

/// Opaque reference to the media payload of an attachment
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MediaRef(pub String);

/// A file carried by a message
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    /// Original file name, when the service reports one
    pub name: Option<String>,
    /// Size in bytes
    pub size: u64,
    /// MIME type, when known
    pub mime_type: Option<String>,
    /// Handle passed back to the client to transfer the payload
    pub media: MediaRef,
}

/// A message posted in a channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Message id, unique within the channel
    pub id: i64,
    /// Time the message was posted
    pub date: DateTime<Utc>,
    /// Text body (may be empty)
    pub text: String,
    /// Attached file, if any
    pub file: Option<FileAttachment>,
}

impl Message {
    /// Whether the message carries an attachment
    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }
}

/// Why a message was not queued for download
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The message has no attachment
    NoFile,
    /// The attachment has no file name
    NoFilename,
    /// The attachment exceeds the size ceiling
    TooLarge,
    /// The extension is not in the allow-set
    WrongExtension,
    /// A file with this name and size is already on disk
    AlreadyDownloaded,
}

impl SkipReason {
    /// Stable machine-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NoFile => "no_file",
            SkipReason::NoFilename => "no_filename",
            SkipReason::TooLarge => "too_large",
            SkipReason::WrongExtension => "wrong_extension",
            SkipReason::AlreadyDownloaded => "already_downloaded",
        }
    }

    /// Human-readable label for status output
    pub fn label(&self) -> &'static str {
        match self {
            SkipReason::NoFile => "No file attached",
            SkipReason::NoFilename => "No filename",
            SkipReason::TooLarge => "File too large",
            SkipReason::WrongExtension => "Wrong file type",
            SkipReason::AlreadyDownloaded => "Already downloaded",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-reason skip counts
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SkipTally(BTreeMap<SkipReason, usize>);

impl SkipTally {
    /// Count one skip
    pub fn record(&mut self, reason: SkipReason) {
        *self.0.entry(reason).or_insert(0) += 1;
    }

    /// Skips recorded for a reason
    pub fn get(&self, reason: SkipReason) -> usize {
        self.0.get(&reason).copied().unwrap_or(0)
    }

    /// Total skips across all reasons
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Whether nothing was skipped
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Reasons with their counts, in a stable order
    pub fn iter(&self) -> impl Iterator<Item = (SkipReason, usize)> + '_ {
        self.0.iter().map(|(reason, count)| (*reason, *count))
    }

    /// Add another tally into this one
    pub fn merge(&mut self, other: &SkipTally) {
        for (reason, count) in other.iter() {
            *self.0.entry(reason).or_insert(0) += count;
        }
    }
}

/// Identifies one download task in events and summaries
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId {
    /// Numeric channel id
    pub channel_id: i64,
    /// Message id within the channel
    pub message_id: i64,
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.channel_id, self.message_id)
    }
}

/// A message that passed filtering, ready to be transferred
#[derive(Clone, Debug)]
pub struct DownloadTask {
    /// Task identifier
    pub id: TaskId,
    /// The source message (its attachment is guaranteed present)
    pub message: Message,
    /// Directory the file is written to
    pub target_dir: PathBuf,
    /// Final on-disk file name
    pub file_name: String,
    /// Token extracted from the message text
    pub token: ExtractedToken,
}

impl DownloadTask {
    /// Final path of the downloaded file
    pub fn target_path(&self) -> PathBuf {
        self.target_dir.join(&self.file_name)
    }

    /// Attachment size in bytes (0 when unknown)
    pub fn size(&self) -> u64 {
        self.message.file.as_ref().map(|f| f.size).unwrap_or(0)
    }

    /// Original attachment name for display
    pub fn display_name(&self) -> &str {
        self.message
            .file
            .as_ref()
            .and_then(|f| f.name.as_deref())
            .unwrap_or("unknown")
    }
}

/// A channel selected for acquisition
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Numeric id or handle
    pub identifier: String,
    /// Name used for the channel directory; the channel title is used when absent
    pub display_name: Option<String>,
}

impl Target {
    /// Create a target without a display name
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: None,
        }
    }

    /// Create a target with a display name
    pub fn named(identifier: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: Some(display_name.into()),
        }
    }
}

/// The channels selected for one session, in selection order
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Targets(Vec<Target>);

impl Targets {
    /// Empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target; a repeated identifier replaces the earlier entry's display name
    pub fn push(&mut self, target: Target) {
        match self
            .0
            .iter_mut()
            .find(|t| t.identifier == target.identifier)
        {
            Some(existing) => existing.display_name = target.display_name,
            None => self.0.push(target),
        }
    }

    /// Selected targets in order
    pub fn iter(&self) -> impl Iterator<Item = &Target> {
        self.0.iter()
    }

    /// Number of targets
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no target is selected
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<Target> for Targets {
    fn from_iter<I: IntoIterator<Item = Target>>(iter: I) -> Self {
        let mut targets = Targets::new();
        for target in iter {
            targets.push(target);
        }
        targets
    }
}

/// A failure attributed to a file or a channel
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// What failed: a file path or a channel identifier
    pub subject: String,
    /// Machine-readable error code
    pub code: String,
    /// Human-readable message
    pub message: String,
}

impl FailureRecord {
    /// Build a record from an error
    pub fn from_error(subject: impl Into<String>, error: &crate::error::Error) -> Self {
        Self {
            subject: subject.into(),
            code: error.error_code().to_string(),
            message: error.to_string(),
        }
    }
}

/// Result of acquiring one channel
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelSummary {
    /// The identifier the channel was requested by
    pub identifier: String,
    /// Channel title (the identifier when resolution failed)
    pub title: String,
    /// Files transferred successfully
    pub downloaded: usize,
    /// Files (or the channel itself) that failed
    pub failed: usize,
    /// Files not attempted because the run was cancelled
    pub cancelled: usize,
    /// Files that would have been transferred in dry-run mode
    pub planned: usize,
    /// Skipped messages by reason
    pub skipped: SkipTally,
    /// Every failure with its reason
    pub failures: Vec<FailureRecord>,
}

/// Result of one acquisition run across channels
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionSummary {
    /// Per-channel summaries in target order
    pub channels: Vec<ChannelSummary>,
}

impl AcquisitionSummary {
    /// Files downloaded across all channels
    pub fn downloaded(&self) -> usize {
        self.channels.iter().map(|c| c.downloaded).sum()
    }

    /// Failures across all channels
    pub fn failed(&self) -> usize {
        self.channels.iter().map(|c| c.failed).sum()
    }

    /// Cancelled files across all channels
    pub fn cancelled(&self) -> usize {
        self.channels.iter().map(|c| c.cancelled).sum()
    }

    /// Skip counts across all channels
    pub fn skipped(&self) -> SkipTally {
        let mut total = SkipTally::default();
        for channel in &self.channels {
            total.merge(&channel.skipped);
        }
        total
    }
}

/// Event emitted by the downloader
///
/// Events are broadcast; a slow subscriber loses the oldest events rather than
/// slowing down transfers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Channel listing filtered
    ChannelScanned {
        /// Channel identifier
        identifier: String,
        /// Channel title
        title: String,
        /// Messages with files found
        messages: usize,
        /// Files queued for download
        queued: usize,
        /// Skip counts
        skipped: SkipTally,
    },

    /// A batch started
    BatchStarted {
        /// Channel identifier
        identifier: String,
        /// 1-based batch number
        batch: usize,
        /// Number of batches
        total_batches: usize,
        /// Files in this batch
        files: usize,
    },

    /// Bytes received for a file
    FileProgress {
        /// Task identifier
        task_id: TaskId,
        /// Bytes written so far
        bytes_done: u64,
        /// Expected size
        bytes_total: u64,
    },

    /// A file finished downloading
    FileComplete {
        /// Task identifier
        task_id: TaskId,
        /// Final path
        path: PathBuf,
        /// Bytes written
        bytes: u64,
    },

    /// A file failed
    FileFailed {
        /// Task identifier
        task_id: TaskId,
        /// Error message
        error: String,
    },

    /// Aggregate progress of the current batch
    BatchProgress {
        /// Channel identifier
        identifier: String,
        /// Files finished (either way) in this batch
        completed: usize,
        /// Files in this batch
        total: usize,
    },

    /// Channel finished
    ChannelComplete {
        /// Channel identifier
        identifier: String,
        /// Files downloaded
        downloaded: usize,
        /// Failures
        failed: usize,
    },
}
