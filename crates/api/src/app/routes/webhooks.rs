use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Value as JsonValue, json};
use tracing::{error, info};

use invsync_events::{WebhookEvent, event_types};

use crate::app::errors;
use crate::app::services::AppServices;

const MISSING_PAYLOAD: &str = "Missing payload in request body";

pub fn router() -> Router {
    Router::new()
        .route("/product-created", post(product_created))
        .route("/product-paid", post(product_paid))
}

pub async fn product_created(Extension(services): Extension<Arc<AppServices>>, body: Bytes) -> Response {
    receive(&services, event_types::PRODUCT_CREATED, &body).await
}

pub async fn product_paid(Extension(services): Extension<Arc<AppServices>>, body: Bytes) -> Response {
    receive(&services, event_types::PRODUCT_PAID, &body).await
}

/// Validate the body, dispatch it as `event_type` and map the outcome.
async fn receive(services: &AppServices, event_type: &str, body: &[u8]) -> Response {
    let Some(payload) = parse_payload(body) else {
        return errors::json_error(StatusCode::BAD_REQUEST, MISSING_PAYLOAD);
    };
    let event = match WebhookEvent::new(event_type, payload) {
        Ok(event) => event,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, MISSING_PAYLOAD),
    };

    match services.dispatcher.dispatch(&event).await {
        Ok(()) => {
            info!(event_id = %event.id(), event_type, "webhook event dispatched");
            (
                StatusCode::OK,
                Json(json!({ "status": format!("{event_type} event dispatched") })),
            )
                .into_response()
        }
        Err(e) => {
            error!(event_id = %event.id(), event_type, error = %e, "webhook dispatch failed");
            errors::json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to dispatch {event_type} event"),
            )
        }
    }
}

/// Any body that is not JSON counts as missing.
fn parse_payload(body: &[u8]) -> Option<JsonValue> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    serde_json::from_slice(body).ok()
}
