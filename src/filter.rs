//! Filter and dedup engine
//!
//! Decides for every message whether its attachment is downloaded or skipped.
//! The checks short-circuit in a fixed order (no file, no name, size,
//! extension, already on disk) and the engine never writes anything; dedup
//! only stats the live filesystem.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;

use crate::config::Config;
use crate::extraction::{ExtractedToken, extract_token};
use crate::naming::{
    disambiguated_file_name, extension_of, output_file_name, render_legacy_name,
};
use crate::types::{DownloadTask, Message, SkipReason, SkipTally, TaskId};

/// Filtering rules, built once per downloader
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FilterPolicy {
    allowed_extensions: BTreeSet<String>,
    max_file_size: u64,
    legacy_name_templates: Vec<String>,
}

impl FilterPolicy {
    /// Build the policy from a validated configuration
    pub fn from_config(config: &Config) -> Self {
        Self {
            allowed_extensions: config.download.allowed_extensions.clone(),
            max_file_size: config.download.max_file_size,
            legacy_name_templates: config.layout.legacy_name_templates.clone(),
        }
    }

    /// Whether files with this (lowercase, dotted) extension are accepted
    pub fn allows_extension(&self, ext: &str) -> bool {
        self.allowed_extensions.contains(ext)
    }

    /// Size ceiling in bytes
    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }
}

/// An attachment that passed every check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AcceptedFile {
    /// Final on-disk name
    pub file_name: String,
    /// Token extracted from the message text
    pub token: ExtractedToken,
}

/// Verdict for one message
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classification {
    /// Download the attachment
    Accept(AcceptedFile),
    /// Leave it, for this reason
    Skip(SkipReason),
}

/// Attachment that passed the metadata checks, before dedup
struct Candidate<'a> {
    name: &'a str,
    size: u64,
    token: ExtractedToken,
}

/// Metadata checks, in order: file, name, size, extension
fn screen<'a>(message: &'a Message, policy: &FilterPolicy) -> Result<Candidate<'a>, SkipReason> {
    let Some(file) = message.file.as_ref() else {
        return Err(SkipReason::NoFile);
    };
    let Some(name) = file.name.as_deref().filter(|n| !n.trim().is_empty()) else {
        return Err(SkipReason::NoFilename);
    };
    if file.size > policy.max_file_size {
        tracing::debug!(file = %name, size = file.size, "Skipping oversized file");
        return Err(SkipReason::TooLarge);
    }
    let ext = extension_of(name);
    if !policy.allows_extension(&ext) {
        tracing::debug!(file = %name, ext = %ext, "Skipping file type");
        return Err(SkipReason::WrongExtension);
    }
    Ok(Candidate {
        name,
        size: file.size,
        token: extract_token(&message.text),
    })
}

/// Classify a message against `policy`, deduplicating against `target_dir`
pub async fn classify(message: &Message, target_dir: &Path, policy: &FilterPolicy) -> Classification {
    match screen(message, policy) {
        Ok(candidate) => {
            let file_name = output_file_name(candidate.name, &candidate.token);
            dedup(candidate, file_name, target_dir, policy).await
        }
        Err(reason) => Classification::Skip(reason),
    }
}

/// Dedup against the output name and every legacy name
async fn dedup(
    candidate: Candidate<'_>,
    file_name: String,
    target_dir: &Path,
    policy: &FilterPolicy,
) -> Classification {
    if present_with_size(&target_dir.join(&file_name), candidate.size).await {
        tracing::debug!(file = %file_name, "Already downloaded");
        return Classification::Skip(SkipReason::AlreadyDownloaded);
    }
    for template in &policy.legacy_name_templates {
        let Some(legacy) = render_legacy_name(template, candidate.name, &candidate.token) else {
            continue;
        };
        if present_with_size(&target_dir.join(&legacy), candidate.size).await {
            tracing::debug!(file = %legacy, "Already downloaded under an earlier name");
            return Classification::Skip(SkipReason::AlreadyDownloaded);
        }
    }

    Classification::Accept(AcceptedFile {
        file_name,
        token: candidate.token,
    })
}

/// Whether a regular file of exactly `size` bytes exists at `path`
///
/// Stat errors count as absent.
async fn present_with_size(path: &Path, size: u64) -> bool {
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() == size,
        Err(_) => false,
    }
}

/// Answer to a destination claim
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Claim {
    /// The path is now reserved for the caller
    Granted,
    /// Already reserved for a file of the same size
    SameFile,
    /// Already reserved for a different file
    Taken,
}

/// Destination paths handed out during one run
///
/// No two tasks of a run share a destination. A repeat of a claimed path with
/// the same size is the same file posted again and is skipped; any other
/// repeat gets a disambiguated name. Claims are made in message order before
/// the dedup check, so reruns pick the same names.
#[derive(Debug, Default)]
pub struct DestinationClaims {
    claimed: Mutex<HashMap<PathBuf, u64>>,
}

impl DestinationClaims {
    /// Empty claim set
    pub fn new() -> Self {
        Self::default()
    }

    async fn claim(&self, path: PathBuf, size: u64) -> Claim {
        let mut claimed = self.claimed.lock().await;
        match claimed.get(&path) {
            None => {
                claimed.insert(path, size);
                Claim::Granted
            }
            Some(&existing) if existing == size => Claim::SameFile,
            Some(_) => Claim::Taken,
        }
    }

    /// Number of claimed paths
    pub async fn len(&self) -> usize {
        self.claimed.lock().await.len()
    }

    /// Whether nothing has been claimed yet
    pub async fn is_empty(&self) -> bool {
        self.claimed.lock().await.is_empty()
    }
}

/// Reserve a destination name for `candidate`
///
/// Tries the plain output name, then the name tagged with the message id, then
/// with channel and message id. `None` means the same file was already claimed.
async fn claim_file_name(
    claims: &DestinationClaims,
    channel_id: i64,
    message_id: i64,
    candidate: &Candidate<'_>,
    target_dir: &Path,
) -> Option<String> {
    let plain = output_file_name(candidate.name, &candidate.token);
    let tagged = [format!("m{message_id}"), format!("c{channel_id}-m{message_id}")]
        .into_iter()
        .map(|tag| disambiguated_file_name(candidate.name, &candidate.token, &tag));

    for file_name in std::iter::once(plain).chain(tagged) {
        match claims.claim(target_dir.join(&file_name), candidate.size).await {
            Claim::Granted => return Some(file_name),
            Claim::SameFile => return None,
            Claim::Taken => {
                tracing::debug!(file = %file_name, message_id, "Destination taken, disambiguating");
            }
        }
    }
    None
}

/// Result of filtering a channel's messages
#[derive(Clone, Debug, Default)]
pub struct FilterReport {
    /// Accepted files in message order
    pub tasks: Vec<DownloadTask>,
    /// Skips by reason
    pub skipped: SkipTally,
}

/// Classify every message, turning accepted ones into download tasks
///
/// `target_dir_for` decides where each message's file lands; dedup checks
/// that directory. Every destination is reserved in `claims` first, so no two
/// tasks sharing `claims` ever write the same path.
pub async fn filter_messages<F>(
    channel_id: i64,
    messages: &[Message],
    policy: &FilterPolicy,
    claims: &DestinationClaims,
    target_dir_for: F,
) -> FilterReport
where
    F: Fn(&Message) -> PathBuf,
{
    let mut report = FilterReport::default();
    for message in messages {
        let candidate = match screen(message, policy) {
            Ok(candidate) => candidate,
            Err(reason) => {
                report.skipped.record(reason);
                continue;
            }
        };
        let target_dir = target_dir_for(message);
        let Some(file_name) =
            claim_file_name(claims, channel_id, message.id, &candidate, &target_dir).await
        else {
            tracing::debug!(
                file = %candidate.name,
                message_id = message.id,
                "Same file posted again"
            );
            report.skipped.record(SkipReason::AlreadyDownloaded);
            continue;
        };
        match dedup(candidate, file_name, &target_dir, policy).await {
            Classification::Accept(accepted) => report.tasks.push(DownloadTask {
                id: TaskId {
                    channel_id,
                    message_id: message.id,
                },
                message: message.clone(),
                target_dir,
                file_name: accepted.file_name,
                token: accepted.token,
            }),
            Classification::Skip(reason) => report.skipped.record(reason),
        }
    }
    report
}
