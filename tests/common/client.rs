//! In-memory messaging service for integration tests

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use channel_dl::client::{EntityQuery, MessageFilter, MessageQuery, ResolvedEntity};
use channel_dl::types::{Channel, ChannelHandle, FileAttachment, Message};
use channel_dl::{ChannelClient, ClientError, ProgressSink};

/// A fake service holding channels and their message histories
#[derive(Default)]
pub struct MemoryService {
    channels: HashMap<String, ResolvedEntity>,
    histories: HashMap<i64, Vec<Message>>,
    payloads: Mutex<HashMap<String, Vec<u8>>>,
    transfer_delay: Duration,
    transfers: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MemoryService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a channel reachable by its numeric id and by `@handle`
    pub fn channel(mut self, id: i64, title: &str, handle: &str, history: Vec<Message>) -> Self {
        let entity = ResolvedEntity {
            id,
            title: title.to_string(),
            handle: ChannelHandle(handle.to_string()),
        };
        self.channels.insert(id.to_string(), entity.clone());
        self.channels.insert(format!("@{handle}"), entity);
        self.histories.insert(id, history);
        self
    }

    /// Serve `bytes` as the payload of a media reference
    pub fn payload(self, media: &str, bytes: &[u8]) -> Self {
        if let Ok(mut payloads) = self.payloads.lock() {
            payloads.insert(media.to_string(), bytes.to_vec());
        }
        self
    }

    pub fn transfer_delay(mut self, delay: Duration) -> Self {
        self.transfer_delay = delay;
        self
    }

    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelClient for MemoryService {
    async fn get_entity(&self, query: &EntityQuery) -> Result<ResolvedEntity, ClientError> {
        let key = match query {
            EntityQuery::Id(id) => id.to_string(),
            EntityQuery::Handle(handle) => handle.clone(),
        };
        self.channels
            .get(&key)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("no channel {key}")))
    }

    async fn get_messages(
        &self,
        channel: &Channel,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, ClientError> {
        let mut messages = self.histories.get(&channel.id).cloned().unwrap_or_default();
        if query.filter == MessageFilter::Documents {
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
        self.transfers.fetch_add(1, Ordering::SeqCst);
        if !self.transfer_delay.is_zero() {
            tokio::time::sleep(self.transfer_delay).await;
        }

        let payload = self
            .payloads
            .lock()
            .ok()
            .and_then(|p| p.get(&file.media.0).cloned())
            .unwrap_or_else(|| vec![b'x'; file.size as usize]);
        tokio::fs::write(destination, &payload)
            .await
            .map_err(|e| ClientError::Transfer(e.to_string()))?;
        progress.report(payload.len() as u64, file.size);
        Ok(payload.len() as u64)
    }

    async fn disconnect(&self) -> Result<(), ClientError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
