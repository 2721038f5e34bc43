//! Remote service client contract
//!
//! The messaging-service client is an external collaborator. The downloader
//! talks to it only through [`ChannelClient`], which keeps the pipeline
//! testable with an in-memory implementation.

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::downloader::ProgressSink;
use crate::error::ClientError;
use crate::types::{Channel, ChannelHandle, FileAttachment, Message};

/// How the service is asked for an entity
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityQuery {
    /// Numeric channel id
    Id(i64),
    /// Public handle, with or without a leading `@`
    Handle(String),
}

impl std::fmt::Display for EntityQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityQuery::Id(id) => write!(f, "id {id}"),
            EntityQuery::Handle(handle) => write!(f, "handle {handle}"),
        }
    }
}

/// What the service returns for a resolved entity
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedEntity {
    /// Numeric channel id
    pub id: i64,
    /// Display title
    pub title: String,
    /// Handle for subsequent calls
    pub handle: ChannelHandle,
}

/// Server-side message filter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageFilter {
    /// Every message
    #[default]
    All,
    /// Only messages carrying a document
    Documents,
}

/// One message listing request
///
/// Results are ordered by decreasing message id. `offset_id` restricts the
/// listing to messages older than (id below) the given id; `limit: None`
/// requests everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageQuery {
    /// Server-side filter
    pub filter: MessageFilter,
    /// Maximum number of messages, `None` for all
    pub limit: Option<usize>,
    /// Only messages with an id below this one
    pub offset_id: Option<i64>,
}

impl MessageQuery {
    /// Every document message in one request
    pub fn all_documents() -> Self {
        Self {
            filter: MessageFilter::Documents,
            limit: None,
            offset_id: None,
        }
    }

    /// One unfiltered page below `offset_id`
    pub fn page(limit: usize, offset_id: Option<i64>) -> Self {
        Self {
            filter: MessageFilter::All,
            limit: Some(limit),
            offset_id,
        }
    }
}

/// Abstraction over the messaging service, enabling testability.
#[async_trait]
pub trait ChannelClient: Send + Sync {
    /// Look up a channel
    async fn get_entity(&self, query: &EntityQuery) -> Result<ResolvedEntity, ClientError>;

    /// List messages of a channel
    async fn get_messages(
        &self,
        channel: &Channel,
        query: &MessageQuery,
    ) -> Result<Vec<Message>, ClientError>;

    /// Write an attachment's payload to `destination`, reporting progress
    /// through `progress`. Returns the number of bytes written.
    async fn download_media(
        &self,
        file: &FileAttachment,
        destination: &Path,
        progress: &ProgressSink,
    ) -> Result<u64, ClientError>;

    /// Release the session; called once on every exit path of a run
    async fn disconnect(&self) -> Result<(), ClientError> {
        Ok(())
    }
}
