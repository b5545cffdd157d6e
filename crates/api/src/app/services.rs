//! Service wiring: work queue, webhook dispatcher, poll orchestrator.

use std::sync::Arc;

use anyhow::Context;
use tracing::warn;

use invsync_events::{EventDispatcher, InMemoryWorkQueue, WorkQueue};
use invsync_infra::{
    AppConfig, HttpFetcherFactory, IntegrationOrchestrator, TransformRegistry, load_tenant_configs,
    register_product_handlers,
};

/// Shared state behind the HTTP handlers.
#[derive(Debug)]
pub struct AppServices {
    pub dispatcher: EventDispatcher,
}

impl AppServices {
    /// Standard product webhook handlers, enqueuing onto `queue`.
    pub fn new(queue: Arc<dyn WorkQueue>) -> Self {
        let mut dispatcher = EventDispatcher::new();
        register_product_handlers(&mut dispatcher, queue);
        Self { dispatcher }
    }

    pub fn with_dispatcher(dispatcher: EventDispatcher) -> Self {
        Self { dispatcher }
    }
}

/// Redis when `REDIS_URL` is set, otherwise an in-memory queue.
pub async fn build_queue(config: &AppConfig) -> anyhow::Result<Arc<dyn WorkQueue>> {
    match &config.redis_url {
        Some(url) => connect_redis(url, config.queue_prefix.clone()).await,
        None => {
            warn!("REDIS_URL not set; using in-memory work queue (not durable)");
            Ok(Arc::new(InMemoryWorkQueue::new()))
        }
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(url: &str, prefix: Option<String>) -> anyhow::Result<Arc<dyn WorkQueue>> {
    let queue = invsync_infra::queue::RedisWorkQueue::connect(url, prefix)
        .await
        .context("connecting to Redis work queue")?;
    tracing::info!(queue = ?queue, "using Redis work queue");
    Ok(Arc::new(queue))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(_url: &str, _prefix: Option<String>) -> anyhow::Result<Arc<dyn WorkQueue>> {
    anyhow::bail!("REDIS_URL is set but this build has no Redis support (enable the `redis` feature)")
}

/// Load tenants and start one poll scheduler per polling tenant.
pub fn start_orchestrator(config: &AppConfig, queue: Arc<dyn WorkQueue>) -> anyhow::Result<IntegrationOrchestrator> {
    let tenants = load_tenant_configs(&config.tenant_config_path)?;
    let fetchers = HttpFetcherFactory::with_timeout(config.http_timeout)?;

    IntegrationOrchestrator::builder(queue)
        .transforms(TransformRegistry::new())
        .fetchers(Arc::new(fetchers))
        .start(tenants)
        .context("starting integration orchestrator")
}
