//! Redis-backed work queue (durable, one list per queue name).
//!
//! - **Enqueue**: `LPUSH` onto the head of the list
//! - **Dequeue**: `RPOP` from the tail, so the oldest entry comes out first
//! - **Peek**: `LINDEX key -1`
//! - **Length**: `LLEN`
//!
//! Each command is atomic in Redis, so per-name FIFO holds with any number
//! of concurrent producers and consumers.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Cmd, FromRedisValue};
use tracing::instrument;

use invsync_events::{QueueEntry, QueueError, WorkQueue};

/// Upper bound on connecting and on each command.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum RedisQueueError {
    #[error("Redis connection error: {0}")]
    Connection(String),
}

/// Work queue stored in Redis lists.
///
/// Queue names map to keys as `<prefix>:<name>` when a prefix is set, or the
/// bare name otherwise. Every command is bounded by a timeout; a Redis that
/// accepts the connection but never answers yields [`QueueError::Unavailable`].
#[derive(Clone)]
pub struct RedisWorkQueue {
    conn: ConnectionManager,
    prefix: Option<String>,
    command_timeout: Duration,
}

impl RedisWorkQueue {
    /// Connect to Redis with [`DEFAULT_COMMAND_TIMEOUT`].
    ///
    /// The connection manager reconnects on its own; commands issued while
    /// Redis is down fail with [`QueueError::Unavailable`].
    pub async fn connect(redis_url: impl AsRef<str>, prefix: Option<String>) -> Result<Self, RedisQueueError> {
        Self::connect_with_timeout(redis_url, prefix, DEFAULT_COMMAND_TIMEOUT).await
    }

    pub async fn connect_with_timeout(
        redis_url: impl AsRef<str>,
        prefix: Option<String>,
        timeout: Duration,
    ) -> Result<Self, RedisQueueError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(|e| RedisQueueError::Connection(e.to_string()))?;
        let conn = tokio::time::timeout(timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| RedisQueueError::Connection(format!("no answer within {timeout:?}")))?
            .map_err(|e| RedisQueueError::Connection(e.to_string()))?;

        Ok(Self {
            conn,
            prefix: prefix.filter(|p| !p.is_empty()),
            command_timeout: timeout,
        })
    }

    fn key(&self, queue: &str) -> String {
        queue_key(self.prefix.as_deref(), queue)
    }

    async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T, QueueError> {
        let mut conn = self.conn.clone();
        match tokio::time::timeout(self.command_timeout, cmd.query_async(&mut conn)).await {
            Ok(result) => result.map_err(unavailable),
            Err(_) => Err(QueueError::Unavailable(format!(
                "Redis did not answer within {:?}",
                self.command_timeout
            ))),
        }
    }
}

fn queue_key(prefix: Option<&str>, queue: &str) -> String {
    match prefix {
        Some(prefix) => format!("{prefix}:{queue}"),
        None => queue.to_string(),
    }
}

impl core::fmt::Debug for RedisWorkQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RedisWorkQueue")
            .field("prefix", &self.prefix)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

fn unavailable(e: redis::RedisError) -> QueueError {
    QueueError::Unavailable(e.to_string())
}

#[async_trait]
impl WorkQueue for RedisWorkQueue {
    #[instrument(skip(self, entry), fields(key = %self.key(queue)), err)]
    async fn enqueue(&self, queue: &str, entry: QueueEntry) -> Result<(), QueueError> {
        let _: i64 = self
            .query(redis::cmd("LPUSH").arg(self.key(queue)).arg(entry.as_str()))
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %self.key(queue)), err)]
    async fn dequeue(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError> {
        let raw: Option<String> = self.query(redis::cmd("RPOP").arg(self.key(queue))).await?;
        Ok(raw.map(QueueEntry::from))
    }

    #[instrument(skip(self), fields(key = %self.key(queue)), err)]
    async fn length(&self, queue: &str) -> Result<usize, QueueError> {
        self.query(redis::cmd("LLEN").arg(self.key(queue))).await
    }

    #[instrument(skip(self), fields(key = %self.key(queue)), err)]
    async fn peek(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError> {
        let raw: Option<String> = self.query(redis::cmd("LINDEX").arg(self.key(queue)).arg(-1)).await?;
        Ok(raw.map(QueueEntry::from))
    }
}
