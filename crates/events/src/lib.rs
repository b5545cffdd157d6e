//! Inbound events, handlers, and the work queue contract.

pub mod dispatcher;
pub mod handler;
pub mod in_memory_queue;
pub mod queue;
pub mod webhook;

pub use dispatcher::{DispatchError, EventDispatcher};
pub use handler::{EnqueueHandler, EventHandler, HandlerError};
pub use in_memory_queue::InMemoryWorkQueue;
pub use queue::{QueueEntry, QueueError, WorkQueue};
pub use webhook::{EventValidationError, WebhookEvent, event_types, is_empty_payload};
