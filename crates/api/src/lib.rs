//! HTTP API: inbound webhooks, health, and process wiring.

pub mod app;
