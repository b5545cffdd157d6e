//! Standard webhook wiring: product events land on their own queues.

use std::sync::Arc;

use invsync_events::{EnqueueHandler, EventDispatcher, WorkQueue, event_types};

pub const PRODUCT_CREATED_QUEUE: &str = "product_created_events";
pub const PRODUCT_PAID_QUEUE: &str = "product_paid_events";

/// Register the enqueue handlers for `product.created` and `product.paid`.
pub fn register_product_handlers(dispatcher: &mut EventDispatcher, queue: Arc<dyn WorkQueue>) {
    dispatcher.register_handler(
        event_types::PRODUCT_CREATED,
        EnqueueHandler::new(Arc::clone(&queue), PRODUCT_CREATED_QUEUE),
    );
    dispatcher.register_handler(event_types::PRODUCT_PAID, EnqueueHandler::new(queue, PRODUCT_PAID_QUEUE));
}
