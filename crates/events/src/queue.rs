//! Work queue abstraction (mechanics only).
//!
//! A work queue is a set of named FIFO channels used to hand normalized
//! records and inbound events to downstream consumers. Implementations live
//! here (in-memory, for tests/dev) and in `invsync-infra` (Redis, durable).
//!
//! ## Ordering
//!
//! Strict FIFO per queue name. No ordering exists across different names,
//! and implementations need no mutual exclusion between names.
//!
//! ## Delivery
//!
//! Producers get at-least-once semantics at best: a producer that crashes
//! after `enqueue` succeeded but before it recorded progress will enqueue the
//! same record again on restart. Consumers must be idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Queue-level failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// The backing store could not be reached or rejected the command.
    #[error("queue unavailable: {0}")]
    Unavailable(String),

    /// A value could not be turned into (or read back from) an entry.
    #[error("queue entry serialization failed: {0}")]
    Serialization(String),
}

/// One opaque entry on a queue (a JSON document in practice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry(String);

impl QueueEntry {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Serialize `value` as JSON.
    pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Self, QueueError> {
        serde_json::to_string(value)
            .map(Self)
            .map_err(|e| QueueError::Serialization(e.to_string()))
    }

    /// Parse the entry back as JSON.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, QueueError> {
        serde_json::from_str(&self.0).map_err(|e| QueueError::Serialization(e.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<String> for QueueEntry {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for QueueEntry {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Named FIFO channels shared by every scheduler and webhook handler.
///
/// One instance is created at startup and injected (usually as
/// `Arc<dyn WorkQueue>`) into everything that produces work.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Append `entry` to the tail of `queue`.
    async fn enqueue(&self, queue: &str, entry: QueueEntry) -> Result<(), QueueError>;

    /// Remove and return the oldest entry, `None` when the queue is empty.
    async fn dequeue(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError>;

    /// Number of entries currently in `queue`.
    async fn length(&self, queue: &str) -> Result<usize, QueueError>;

    /// Return the oldest entry without removing it.
    async fn peek(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError>;
}

#[async_trait]
impl<Q> WorkQueue for Arc<Q>
where
    Q: WorkQueue + ?Sized,
{
    async fn enqueue(&self, queue: &str, entry: QueueEntry) -> Result<(), QueueError> {
        (**self).enqueue(queue, entry).await
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError> {
        (**self).dequeue(queue).await
    }

    async fn length(&self, queue: &str) -> Result<usize, QueueError> {
        (**self).length(queue).await
    }

    async fn peek(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError> {
        (**self).peek(queue).await
    }
}
