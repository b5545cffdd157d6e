use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value as JsonValue, json};

pub async fn health() -> Json<JsonValue> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
}
