//! Channel resolution with a session-lifetime cache

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::client::{ChannelClient, EntityQuery};
use crate::error::{ClientError, Error, Result};
use crate::types::Channel;

/// Resolves channel identifiers and remembers the answers
///
/// Identifiers are either all digits (a numeric channel id) or a handle.
/// Handles are tried as given and, when the service does not know them,
/// again with a leading `@`. Successful resolutions are cached for the
/// lifetime of the resolver; failures are not.
pub struct EntityResolver {
    client: Arc<dyn ChannelClient>,
    cache: RwLock<HashMap<String, Channel>>,
}

impl EntityResolver {
    /// Create a resolver backed by `client`
    pub fn new(client: Arc<dyn ChannelClient>) -> Self {
        Self {
            client,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve an identifier to a channel
    ///
    /// Resolving the same identifier twice is safe and returns the same
    /// channel; only the first call reaches the service.
    pub async fn resolve(&self, identifier: &str) -> Result<Channel> {
        let identifier = identifier.trim();
        if let Some(channel) = self.cache.read().await.get(identifier) {
            tracing::debug!(identifier, "Channel resolved from cache");
            return Ok(channel.clone());
        }

        if identifier.is_empty() {
            return Err(Error::Resolution {
                identifier: String::new(),
                reason: "empty identifier".to_string(),
            });
        }

        let mut last_miss = None;
        for query in candidate_queries(identifier) {
            match self.client.get_entity(&query).await {
                Ok(entity) => {
                    let channel = Channel {
                        identifier: identifier.to_string(),
                        id: entity.id,
                        title: entity.title,
                        handle: entity.handle,
                    };
                    tracing::info!(
                        identifier,
                        channel_id = channel.id,
                        title = %channel.title,
                        "Resolved channel"
                    );
                    self.cache
                        .write()
                        .await
                        .entry(identifier.to_string())
                        .or_insert_with(|| channel.clone());
                    return Ok(channel);
                }
                Err(ClientError::NotFound(msg)) => {
                    tracing::debug!(identifier, %query, reason = %msg, "Channel not found");
                    last_miss = Some(msg);
                }
                Err(ClientError::Connection(msg)) => {
                    tracing::warn!(identifier, error = %msg, "Connection failed while resolving channel");
                    return Err(Error::Connection(msg));
                }
                Err(other) => {
                    tracing::error!(identifier, error = %other, "Error resolving channel");
                    return Err(Error::Resolution {
                        identifier: identifier.to_string(),
                        reason: other.to_string(),
                    });
                }
            }
        }

        Err(Error::Resolution {
            identifier: identifier.to_string(),
            reason: last_miss.unwrap_or_else(|| "not found".to_string()),
        })
    }

    /// Cached channel for an identifier, if it was resolved before
    pub async fn cached(&self, identifier: &str) -> Option<Channel> {
        self.cache.read().await.get(identifier.trim()).cloned()
    }

    /// Number of cached identifiers
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    /// Whether nothing has been resolved yet
    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}

/// Queries to try for an identifier, in order
fn candidate_queries(identifier: &str) -> Vec<EntityQuery> {
    if identifier.bytes().all(|b| b.is_ascii_digit())
        && let Ok(id) = identifier.parse::<i64>()
    {
        return vec![EntityQuery::Id(id)];
    }

    let mut queries = vec![EntityQuery::Handle(identifier.to_string())];
    if !identifier.starts_with('@') {
        queries.push(EntityQuery::Handle(format!("@{identifier}")));
    }
    queries
}
