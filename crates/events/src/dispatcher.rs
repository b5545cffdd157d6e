//! Fan-out routing of inbound events to registered handlers.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::handler::{EventHandler, HandlerError};
use crate::webhook::WebhookEvent;

/// A dispatch stopped at a failing handler.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DispatchError {
    #[error("handler #{position} for `{event_type}` failed: {source}")]
    HandlerFailed {
        event_type: String,
        /// Zero-based registration index of the failing handler.
        position: usize,
        #[source]
        source: HandlerError,
    },
}

/// Routes an event to every handler registered for its type.
///
/// Handlers run one after another in registration order. The first failure
/// aborts the dispatch: later handlers are not invoked, and side effects of
/// earlier handlers are not rolled back. Callers that retry a failed dispatch
/// therefore re-run the earlier handlers too.
///
/// Registration takes `&mut self`; wire everything up before sharing the
/// dispatcher (typically behind an `Arc`).
#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<String, Vec<Arc<dyn EventHandler>>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_handler<H>(&mut self, event_type: impl Into<String>, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.register_shared(event_type, Arc::new(handler));
    }

    /// Register a handler that is also held elsewhere.
    pub fn register_shared(&mut self, event_type: impl Into<String>, handler: Arc<dyn EventHandler>) {
        self.handlers.entry(event_type.into()).or_default().push(handler);
    }

    pub fn handler_count(&self, event_type: &str) -> usize {
        self.handlers.get(event_type).map_or(0, Vec::len)
    }

    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<(), DispatchError> {
        let Some(handlers) = self.handlers.get(event.event_type()) else {
            debug!(event_type = event.event_type(), "no handlers registered");
            return Ok(());
        };

        for (position, handler) in handlers.iter().enumerate() {
            if let Err(source) = handler.handle_event(event).await {
                warn!(
                    event_id = %event.id(),
                    event_type = event.event_type(),
                    position,
                    error = %source,
                    "event handler failed"
                );
                return Err(DispatchError::HandlerFailed {
                    event_type: event.event_type().to_string(),
                    position,
                    source,
                });
            }
        }

        Ok(())
    }
}

impl core::fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let counts: HashMap<&str, usize> = self
            .handlers
            .iter()
            .map(|(event_type, handlers)| (event_type.as_str(), handlers.len()))
            .collect();
        f.debug_struct("EventDispatcher").field("handlers", &counts).finish()
    }
}
