//! Infrastructure layer: retries, polling, adapters, Redis, config.

pub mod adapter;
pub mod backoff;
pub mod config;
pub mod fetch;
pub mod orchestrator;
pub mod queue;
pub mod retry;
pub mod scheduler;
pub mod transform;
pub mod webhooks;

pub use adapter::Adapter;
pub use backoff::{BackoffError, BackoffPolicy};
pub use config::{AppConfig, load_tenant_configs, parse_tenant_configs};
pub use fetch::{FetchError, FetcherFactory, HttpFetcher, HttpFetcherFactory, RecordFetcher};
pub use orchestrator::{IntegrationOrchestrator, OrchestratorBuilder, OrchestratorError};
pub use retry::{RetryAttempt, RetryExecutor};
pub use scheduler::{DEFAULT_ENQUEUE_TIMEOUT, PollScheduler, PollSchedulerBuilder, SchedulerState, SchedulerStats};
pub use transform::{Transform, TransformRegistry, UnknownTransform};
pub use webhooks::{PRODUCT_CREATED_QUEUE, PRODUCT_PAID_QUEUE, register_product_handlers};
