//! Source queues using Redis Streams.
//!
//! Each queue is a stream read through a consumer group. A received entry
//! stays in the group's pending list until it is deleted; entries left
//! pending longer than the visibility timeout are reclaimed by the next
//! receiver, which is how a crashed or slow worker's job becomes visible
//! again.

use std::time::Duration;

use async_trait::async_trait;
use redis::streams::{StreamAutoClaimReply, StreamId, StreamReadReply};
use tracing::{debug, info, warn};
use uuid::Uuid;

use gist_models::SourceType;

use crate::error::{QueueError, QueueResult};

/// Stream field holding the JSON payload.
const BODY_FIELD: &str = "body";

/// A message handed out by `receive`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    /// Receipt id used to delete the message
    pub id: String,
    /// Raw JSON payload
    pub body: String,
}

/// Receive/delete contract of the source queues.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Receive at most one message; it stays invisible to other receivers
    /// until deleted or until the visibility timeout elapses.
    async fn receive(&self, queue: &str) -> QueueResult<Option<ReceivedMessage>>;

    /// Permanently remove a received message.
    async fn delete(&self, queue: &str, message_id: &str) -> QueueResult<()>;

    /// Enqueue a raw payload, returning its message id.
    async fn send(&self, queue: &str, body: &str) -> QueueResult<String>;
}

/// Names of the three source queues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueNames {
    pub video: String,
    pub website: String,
    pub document: String,
}

impl Default for QueueNames {
    fn default() -> Self {
        Self {
            video: "gist:queue:video".to_string(),
            website: "gist:queue:website".to_string(),
            document: "gist:queue:document".to_string(),
        }
    }
}

impl QueueNames {
    pub fn name_for(&self, source_type: SourceType) -> &str {
        match source_type {
            SourceType::Video => &self.video,
            SourceType::Website => &self.website,
            SourceType::Document => &self.document,
        }
    }

    /// Queue names paired with their source type, in polling order.
    pub fn all(&self) -> [(SourceType, &str); 3] {
        SourceType::ALL.map(|source_type| (source_type, self.name_for(source_type)))
    }
}

/// Queue configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Consumer group shared by all workers
    pub consumer_group: String,
    /// Consumer name of this process
    pub consumer_name: String,
    /// Source queue (stream) names
    pub names: QueueNames,
    /// How long a received message stays hidden before it can be reclaimed
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            consumer_group: "gist:workers".to_string(),
            consumer_name: format!("worker-{}", Uuid::new_v4()),
            names: QueueNames::default(),
            visibility_timeout: Duration::from_secs(900), // 15 minutes
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            consumer_group: std::env::var("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            consumer_name: std::env::var("QUEUE_CONSUMER_NAME").unwrap_or(defaults.consumer_name),
            names: QueueNames {
                video: std::env::var("VIDEO_QUEUE").unwrap_or(defaults.names.video),
                website: std::env::var("WEBSITE_QUEUE").unwrap_or(defaults.names.website),
                document: std::env::var("DOCUMENT_QUEUE").unwrap_or(defaults.names.document),
            },
            visibility_timeout: Duration::from_secs(
                std::env::var("QUEUE_VISIBILITY_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
        }
    }
}

/// Redis Streams queue client.
pub struct RedisQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RedisQueue {
    /// Create a new queue client.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Create the consumer group on every source queue (idempotent).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        for (_, stream) in self.config.names.all() {
            let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
                .arg("CREATE")
                .arg(stream)
                .arg(&self.config.consumer_group)
                .arg("0")
                .arg("MKSTREAM")
                .query_async(&mut conn)
                .await;

            match result {
                Ok(_) => info!(queue = %stream, "Created consumer group: {}", self.config.consumer_group),
                Err(e) if e.to_string().contains("BUSYGROUP") => {
                    debug!(queue = %stream, "Consumer group already exists");
                }
                Err(e) => return Err(QueueError::Redis(e)),
            }
        }

        Ok(())
    }

    /// Reclaim one entry whose visibility timeout has elapsed.
    async fn reclaim_expired(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
    ) -> QueueResult<Option<StreamId>> {
        let reply: StreamAutoClaimReply = redis::cmd("XAUTOCLAIM")
            .arg(queue)
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_name)
            .arg(self.config.visibility_timeout.as_millis() as u64)
            .arg("0-0")
            .arg("COUNT")
            .arg(1)
            .query_async(conn)
            .await?;

        Ok(reply.claimed.into_iter().next())
    }

    /// Read one never-delivered entry.
    async fn read_new(
        &self,
        conn: &mut redis::aio::MultiplexedConnection,
        queue: &str,
    ) -> QueueResult<Option<StreamId>> {
        let reply: Option<StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(&self.config.consumer_name)
            .arg("COUNT")
            .arg(1)
            .arg("STREAMS")
            .arg(queue)
            .arg(">")
            .query_async(conn)
            .await?;

        Ok(reply
            .and_then(|r| r.keys.into_iter().next())
            .and_then(|key| key.ids.into_iter().next()))
    }

    fn entry_to_message(entry: StreamId) -> ReceivedMessage {
        let body = entry.get::<String>(BODY_FIELD).unwrap_or_default();
        ReceivedMessage { id: entry.id, body }
    }
}

#[async_trait]
impl QueueClient for RedisQueue {
    async fn receive(&self, queue: &str) -> QueueResult<Option<ReceivedMessage>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        if let Some(entry) = self.reclaim_expired(&mut conn, queue).await? {
            warn!(
                queue = %queue,
                message_id = %entry.id,
                "Reclaimed message after visibility timeout"
            );
            return Ok(Some(Self::entry_to_message(entry)));
        }

        let message = self.read_new(&mut conn, queue).await?.map(Self::entry_to_message);
        if let Some(ref m) = message {
            debug!(queue = %queue, message_id = %m.id, "Received message");
        }
        Ok(message)
    }

    async fn delete(&self, queue: &str, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(queue)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::DeleteFailed(format!("XACK {}: {}", message_id, e)))?;

        redis::cmd("XDEL")
            .arg(queue)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await
            .map_err(|e| QueueError::DeleteFailed(format!("XDEL {}: {}", message_id, e)))?;

        debug!(queue = %queue, message_id = %message_id, "Deleted message");
        Ok(())
    }

    async fn send(&self, queue: &str, body: &str) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(queue)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(body)
            .query_async(&mut conn)
            .await
            .map_err(|e| QueueError::SendFailed(e.to_string()))?;

        info!(queue = %queue, message_id = %message_id, "Enqueued message");
        Ok(message_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_names_in_polling_order() {
        let names = QueueNames::default();
        let all = names.all();
        assert_eq!(all[0], (SourceType::Video, "gist:queue:video"));
        assert_eq!(all[1], (SourceType::Website, "gist:queue:website"));
        assert_eq!(all[2], (SourceType::Document, "gist:queue:document"));
    }

    #[test]
    fn test_default_config() {
        let config = QueueConfig::default();
        assert_eq!(config.visibility_timeout, Duration::from_secs(900));
        assert!(config.consumer_name.starts_with("worker-"));
        assert_eq!(config.names.name_for(SourceType::Document), "gist:queue:document");
    }

    #[test]
    fn test_client_creation_rejects_bad_url() {
        let config = QueueConfig {
            redis_url: "not-a-url".to_string(),
            ..Default::default()
        };
        assert!(RedisQueue::new(config).is_err());
    }
}
