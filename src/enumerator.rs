//! File-message enumeration with a time-bounded cache
//!
//! Listing a large channel is the most expensive call the pipeline makes, so
//! results are cached per channel for [`CacheConfig::message_ttl`]. The
//! primary strategy asks the service for documents only; services that do not
//! honour that filter (or answer with nothing) are walked page by page.
//!
//! [`CacheConfig::message_ttl`]: crate::config::CacheConfig::message_ttl

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::client::{ChannelClient, MessageQuery};
use crate::error::{ClientError, Error, Result};
use crate::types::{Channel, Message};

/// Page size of the fallback walk
pub const FALLBACK_PAGE_SIZE: usize = 100;

/// Scanned-message interval between progress log lines
const PROGRESS_LOG_INTERVAL: usize = 1000;

/// A cached listing and when it was fetched
struct CachedListing {
    messages: Arc<Vec<Message>>,
    fetched_at: Instant,
}

/// Lists the file-bearing messages of channels
pub struct MessageEnumerator {
    client: Arc<dyn ChannelClient>,
    ttl: Duration,
    cache: RwLock<HashMap<i64, CachedListing>>,
}

impl MessageEnumerator {
    /// Create an enumerator whose listings stay fresh for `ttl`
    pub fn new(client: Arc<dyn ChannelClient>, ttl: Duration) -> Self {
        Self {
            client,
            ttl,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// File messages of a channel, most recent first
    ///
    /// Failures are logged and yield an empty listing that is not cached.
    pub async fn list_file_messages(&self, channel: &Channel) -> Arc<Vec<Message>> {
        match self.try_list_file_messages(channel).await {
            Ok(messages) => messages,
            Err(e) => {
                tracing::error!(
                    channel = %channel.title,
                    error = %e,
                    "Failed to list messages, treating channel as empty"
                );
                Arc::new(Vec::new())
            }
        }
    }

    /// Like [`list_file_messages`](Self::list_file_messages) but reports the
    /// failure, so callers can tell transport errors from empty channels
    pub async fn try_list_file_messages(&self, channel: &Channel) -> Result<Arc<Vec<Message>>> {
        if let Some(messages) = self.fresh(channel.id).await {
            tracing::debug!(
                channel = %channel.title,
                messages = messages.len(),
                "Using cached message listing"
            );
            return Ok(messages);
        }

        let messages = Arc::new(self.fetch(channel).await?);
        self.cache.write().await.insert(
            channel.id,
            CachedListing {
                messages: Arc::clone(&messages),
                fetched_at: Instant::now(),
            },
        );
        Ok(messages)
    }

    /// Drop a channel's cached listing
    pub async fn invalidate(&self, channel: &Channel) {
        self.cache.write().await.remove(&channel.id);
    }

    async fn fresh(&self, channel_id: i64) -> Option<Arc<Vec<Message>>> {
        let cache = self.cache.read().await;
        let entry = cache.get(&channel_id)?;
        (entry.fetched_at.elapsed() < self.ttl).then(|| Arc::clone(&entry.messages))
    }

    async fn fetch(&self, channel: &Channel) -> Result<Vec<Message>> {
        let primary = self
            .client
            .get_messages(channel, &MessageQuery::all_documents())
            .await
            .map_err(|e| enumeration_error(channel, e))?;

        if !primary.is_empty() {
            tracing::info!(
                channel = %channel.title,
                messages = primary.len(),
                "Found file messages"
            );
            return Ok(primary);
        }

        tracing::info!(
            channel = %channel.title,
            "Document filter returned nothing, scanning all messages"
        );
        self.walk_pages(channel).await
    }

    /// Walk the channel from the newest message down, keeping file messages
    async fn walk_pages(&self, channel: &Channel) -> Result<Vec<Message>> {
        let mut found = Vec::new();
        let mut offset_id: Option<i64> = None;
        let mut scanned = 0usize;

        loop {
            let page = self
                .client
                .get_messages(channel, &MessageQuery::page(FALLBACK_PAGE_SIZE, offset_id))
                .await
                .map_err(|e| enumeration_error(channel, e))?;

            let Some(last_id) = page.last().map(|m| m.id) else {
                break;
            };
            if offset_id.is_some_and(|previous| last_id >= previous) {
                tracing::warn!(
                    channel = %channel.title,
                    offset_id = ?offset_id,
                    last_id,
                    "Message cursor did not advance, stopping scan"
                );
                break;
            }

            for message in page {
                scanned += 1;
                if scanned % PROGRESS_LOG_INTERVAL == 0 {
                    tracing::info!(
                        channel = %channel.title,
                        scanned,
                        found = found.len(),
                        "Scanning messages"
                    );
                }
                if message.has_file() {
                    found.push(message);
                }
            }
            offset_id = Some(last_id);
        }

        tracing::info!(
            channel = %channel.title,
            scanned,
            found = found.len(),
            "Finished scanning messages"
        );
        Ok(found)
    }
}

fn enumeration_error(channel: &Channel, error: ClientError) -> Error {
    match error {
        ClientError::Connection(msg) => Error::Connection(msg),
        other => Error::Enumeration {
            channel: channel.title.clone(),
            reason: other.to_string(),
        },
    }
}
