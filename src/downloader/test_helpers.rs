//! Shared test helpers: an in-memory client and message fixtures.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};

use crate::client::{ChannelClient, EntityQuery, MessageFilter, MessageQuery, ResolvedEntity};
use crate::config::Config;
use crate::downloader::{ChannelDownloader, ProgressSink};
use crate::error::ClientError;
use crate::types::{Channel, ChannelHandle, FileAttachment, MediaRef, Message};

/// Fixed base date; message `n` is posted `n` minutes later
pub(crate) fn message_date(id: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::minutes(id)
}

/// Message with an attachment; the media reference is `media-<id>`
pub(crate) fn file_message(id: i64, name: &str, size: u64, text: &str) -> Message {
    Message {
        id,
        date: message_date(id),
        text: text.to_string(),
        file: Some(FileAttachment {
            name: Some(name.to_string()),
            size,
            mime_type: None,
            media: MediaRef(format!("media-{id}")),
        }),
    }
}

/// Message without an attachment
pub(crate) fn text_message(id: i64, text: &str) -> Message {
    Message {
        id,
        date: message_date(id),
        text: text.to_string(),
        file: None,
    }
}

/// In-memory [`ChannelClient`] with call counters and failure injection
#[derive(Default)]
pub(crate) struct FakeClient {
    entities: HashMap<String, ResolvedEntity>,
    messages: HashMap<i64, Vec<Message>>,
    ignore_documents_filter: bool,
    entity_connection_failure: bool,
    listing_failure: Option<ClientError>,
    failing_media: HashMap<String, ClientError>,
    transfer_delay: Duration,
    entity_calls: AtomicUsize,
    message_calls: AtomicUsize,
    downloads: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    disconnects: AtomicUsize,
}

impl FakeClient {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Register a channel, reachable by id and (when given) by handle
    pub(crate) fn with_channel(mut self, id: i64, title: &str, handle: Option<&str>) -> Self {
        let entity = ResolvedEntity {
            id,
            title: title.to_string(),
            handle: ChannelHandle(handle.unwrap_or(title).to_string()),
        };
        self.entities.insert(id.to_string(), entity.clone());
        if let Some(handle) = handle {
            self.entities.insert(handle.to_string(), entity);
        }
        self
    }

    pub(crate) fn with_messages(mut self, channel_id: i64, messages: Vec<Message>) -> Self {
        self.messages.insert(channel_id, messages);
        self
    }

    /// Answer document-filtered listings with nothing, forcing the page walk
    pub(crate) fn without_documents_filter(mut self) -> Self {
        self.ignore_documents_filter = true;
        self
    }

    pub(crate) fn with_entity_connection_failure(mut self) -> Self {
        self.entity_connection_failure = true;
        self
    }

    pub(crate) fn with_listing_failure(mut self, error: ClientError) -> Self {
        self.listing_failure = Some(error);
        self
    }

    /// Make the transfer of `media-<message_id>` fail
    pub(crate) fn with_failing_media(mut self, message_id: i64, error: ClientError) -> Self {
        self.failing_media.insert(format!("media-{message_id}"), error);
        self
    }

    pub(crate) fn with_transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = delay;
        self
    }

    pub(crate) fn entity_calls(&self) -> usize {
        self.entity_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn downloads(&self) -> usize {
        self.downloads.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelClient for FakeClient {
    async fn get_entity(&self, query: &EntityQuery) -> Result<ResolvedEntity, ClientError> {
        self.entity_calls.fetch_add(1, Ordering::SeqCst);
        if self.entity_connection_failure {
            return Err(ClientError::Connection("connection reset".into()));
        }
        let key = match query {
            EntityQuery::Id(id) => id.to_string(),
            EntityQuery::Handle(handle) => handle.clone(),
        };
        self.entities
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(key))
    }

    async fn get_messages(
        &self,
        channel: &Channel,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, ClientError> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.listing_failure {
            return Err(error.clone());
        }

        let mut messages = self.messages.get(&channel.id).cloned().unwrap_or_default();
        if query.filter == MessageFilter::Documents {
            if self.ignore_documents_filter {
                return Ok(Vec::new());
            }
            messages.retain(Message::has_file);
        }
        messages.sort_by(|a, b| b.id.cmp(&a.id));
        if let Some(offset_id) = query.offset_id {
            messages.retain(|m| m.id < offset_id);
        }
        if let Some(limit) = query.limit {
            messages.truncate(limit);
        }
        Ok(messages)
    }

    async fn download_media(
        &self,
        file: &FileAttachment,
        destination: &Path,
        progress: &ProgressSink,
    ) -> Result<u64, ClientError> {
        self.downloads.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.transfer_delay.is_zero() {
            tokio::time::sleep(self.transfer_delay).await;
        }

        let result = match self.failing_media.get(&file.media.0) {
            Some(error) => {
                // Leave a partial file behind, as an interrupted transfer would.
                let _ = tokio::fs::write(destination, b"partial").await;
                Err(error.clone())
            }
            None => {
                let payload = vec![0u8; file.size as usize];
                progress.report(file.size / 2, file.size);
                match tokio::fs::write(destination, &payload).await {
                    Ok(()) => {
                        progress.report(file.size, file.size);
                        Ok(file.size)
                    }
                    Err(e) => Err(ClientError::Transfer(e.to_string())),
                }
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Configuration for tests: downloads under `root`, no pacing delays
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.download.download_dir = root.to_path_buf();
    config.download.inter_batch_delay = Duration::ZERO;
    config.download.sequential_pacing = Duration::ZERO;
    config
}

/// Downloader over `client` with [`test_config`]
pub(crate) fn create_test_downloader(client: Arc<FakeClient>, root: &Path) -> ChannelDownloader {
    ChannelDownloader::new(client, test_config(root)).unwrap()
}
