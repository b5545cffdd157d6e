//! Inbound webhook events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// Event types received from tenant systems.
pub mod event_types {
    pub const PRODUCT_CREATED: &str = "product.created";
    pub const PRODUCT_PAID: &str = "product.paid";
}

/// Why an inbound event was rejected before dispatch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventValidationError {
    #[error("event type must not be empty")]
    EmptyType,

    #[error("missing payload")]
    EmptyPayload,
}

/// A typed occurrence reported by a tenant system.
///
/// Lives only for the duration of a dispatch; what survives is whatever the
/// handlers enqueue. `id` and `received_at` travel with the serialized form so
/// consumers can de-duplicate redeliveries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    id: Uuid,
    #[serde(rename = "type")]
    event_type: String,
    payload: JsonValue,
    received_at: DateTime<Utc>,
}

impl WebhookEvent {
    /// Build a validated event. Empty payloads never reach a dispatcher.
    pub fn new(event_type: impl Into<String>, payload: JsonValue) -> Result<Self, EventValidationError> {
        let event_type = event_type.into();
        if event_type.trim().is_empty() {
            return Err(EventValidationError::EmptyType);
        }
        if is_empty_payload(&payload) {
            return Err(EventValidationError::EmptyPayload);
        }

        Ok(Self {
            id: Uuid::now_v7(),
            event_type,
            payload,
            received_at: Utc::now(),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn payload(&self) -> &JsonValue {
        &self.payload
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }
}

/// A payload carries nothing usable: absent, an empty container, an empty
/// string, or a bare scalar.
pub fn is_empty_payload(payload: &JsonValue) -> bool {
    match payload {
        JsonValue::Null | JsonValue::Bool(_) | JsonValue::Number(_) => true,
        JsonValue::String(s) => s.is_empty(),
        JsonValue::Array(items) => items.is_empty(),
        JsonValue::Object(fields) => fields.is_empty(),
    }
}
