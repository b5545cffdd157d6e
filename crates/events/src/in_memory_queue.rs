//! In-memory work queue for tests/dev.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::queue::{QueueEntry, QueueError, WorkQueue};

/// In-memory named FIFO queues.
///
/// - Not durable: contents are lost with the process
/// - One lock for all names (contention is irrelevant at test scale)
#[derive(Debug, Default)]
pub struct InMemoryWorkQueue {
    queues: Mutex<HashMap<String, VecDeque<QueueEntry>>>,
}

impl InMemoryWorkQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a queue, oldest first. Does not consume anything.
    pub fn entries(&self, queue: &str) -> Vec<QueueEntry> {
        self.queues
            .lock()
            .map(|queues| {
                queues
                    .get(queue)
                    .map(|q| q.iter().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn with_queues<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, VecDeque<QueueEntry>>) -> T,
    ) -> Result<T, QueueError> {
        let mut queues = self
            .queues
            .lock()
            .map_err(|_| QueueError::Unavailable("in-memory queue lock poisoned".to_string()))?;
        Ok(f(&mut queues))
    }
}

#[async_trait]
impl WorkQueue for InMemoryWorkQueue {
    async fn enqueue(&self, queue: &str, entry: QueueEntry) -> Result<(), QueueError> {
        self.with_queues(|queues| {
            queues.entry(queue.to_string()).or_default().push_back(entry);
        })
    }

    async fn dequeue(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError> {
        self.with_queues(|queues| queues.get_mut(queue).and_then(VecDeque::pop_front))
    }

    async fn length(&self, queue: &str) -> Result<usize, QueueError> {
        self.with_queues(|queues| queues.get(queue).map_or(0, VecDeque::len))
    }

    async fn peek(&self, queue: &str) -> Result<Option<QueueEntry>, QueueError> {
        self.with_queues(|queues| queues.get(queue).and_then(|q| q.front().cloned()))
    }
}
