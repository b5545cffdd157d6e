use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::queue::{QueueEntry, QueueError, WorkQueue};
use crate::webhook::WebhookEvent;

/// Failure reported by an [`EventHandler`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandlerError {
    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error("handler rejected event: {0}")]
    Rejected(String),
}

/// Handles one inbound event and reports success or failure.
///
/// This is the only contract a webhook handler has to meet; there is no
/// shared base type. Handlers run sequentially inside a dispatch, so an
/// implementation may assume nothing else from the same dispatch is running
/// concurrently with it.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle_event(&self, event: &WebhookEvent) -> Result<(), HandlerError>;
}

#[async_trait]
impl<H> EventHandler for Arc<H>
where
    H: EventHandler + ?Sized,
{
    async fn handle_event(&self, event: &WebhookEvent) -> Result<(), HandlerError> {
        (**self).handle_event(event).await
    }
}

/// Serializes the whole event and appends it to a fixed queue.
#[derive(Clone)]
pub struct EnqueueHandler {
    queue: Arc<dyn WorkQueue>,
    queue_name: String,
}

impl EnqueueHandler {
    pub fn new(queue: Arc<dyn WorkQueue>, queue_name: impl Into<String>) -> Self {
        Self {
            queue,
            queue_name: queue_name.into(),
        }
    }

    pub fn queue_name(&self) -> &str {
        &self.queue_name
    }
}

impl core::fmt::Debug for EnqueueHandler {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EnqueueHandler")
            .field("queue_name", &self.queue_name)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl EventHandler for EnqueueHandler {
    async fn handle_event(&self, event: &WebhookEvent) -> Result<(), HandlerError> {
        let entry = QueueEntry::encode(event)?;
        self.queue.enqueue(&self.queue_name, entry).await?;

        debug!(
            event_id = %event.id(),
            event_type = event.event_type(),
            queue = %self.queue_name,
            "webhook event enqueued"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::in_memory_queue::InMemoryWorkQueue;
    use serde_json::json;

    #[tokio::test]
    async fn enqueue_handler_writes_serialized_event() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let handler = EnqueueHandler::new(queue.clone(), "product_paid_events");

        let event = WebhookEvent::new("product.paid", json!({"sku": "S9"})).unwrap();
        handler.handle_event(&event).await.unwrap();

        let entries = queue.entries("product_paid_events");
        assert_eq!(entries.len(), 1);
        let stored: WebhookEvent = entries[0].decode().unwrap();
        assert_eq!(stored, event);
    }
}
