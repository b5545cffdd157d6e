//! Builds and owns one poll scheduler per polling-enabled tenant.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use invsync_core::{ConfigError, TenantConfig, TenantId};
use invsync_events::WorkQueue;
use tracing::info;

use crate::adapter::Adapter;
use crate::backoff::{BackoffError, BackoffPolicy};
use crate::fetch::{DEFAULT_HTTP_TIMEOUT, FetchError, FetcherFactory, HttpFetcherFactory};
use crate::retry::RetryExecutor;
use crate::scheduler::{PollScheduler, SchedulerState, SchedulerStats};
use crate::transform::{TransformRegistry, UnknownTransform};

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("duplicate tenant: {0}")]
    DuplicateTenant(String),

    #[error("tenant {tenant}: {source}")]
    Transform {
        tenant: String,
        #[source]
        source: UnknownTransform,
    },

    #[error("tenant {tenant}: {source}")]
    Backoff {
        tenant: String,
        #[source]
        source: BackoffError,
    },

    #[error(transparent)]
    Fetcher(#[from] FetchError),
}

/// Wiring for [`IntegrationOrchestrator::start`] beyond the tenant list.
pub struct OrchestratorBuilder {
    queue: Arc<dyn WorkQueue>,
    transforms: TransformRegistry,
    fetchers: Option<Arc<dyn FetcherFactory>>,
}

impl OrchestratorBuilder {
    pub fn transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    /// Replace the default HTTP fetchers.
    pub fn fetchers(mut self, fetchers: Arc<dyn FetcherFactory>) -> Self {
        self.fetchers = Some(fetchers);
        self
    }

    /// Validate every tenant, build its scheduler, then start them all.
    ///
    /// Nothing is started unless every tenant is valid.
    pub fn start(self, configs: Vec<TenantConfig>) -> Result<IntegrationOrchestrator, OrchestratorError> {
        let fetchers = match self.fetchers {
            Some(fetchers) => fetchers,
            None => Arc::new(HttpFetcherFactory::with_timeout(DEFAULT_HTTP_TIMEOUT)?),
        };

        let mut seen = HashSet::new();
        let mut schedulers = BTreeMap::new();
        let mut webhook_only = Vec::new();

        for config in &configs {
            config.validate()?;
            if !seen.insert(config.tenant_id.clone()) {
                return Err(OrchestratorError::DuplicateTenant(config.tenant_id.to_string()));
            }

            let Some(polling) = config.polling() else {
                info!(tenant = %config.tenant_id, "webhook-only tenant, no poll scheduler");
                webhook_only.push(config.tenant_id.clone());
                continue;
            };

            let tenant = config.tenant_id.to_string();
            let transform = self
                .transforms
                .resolve(config.transform.as_ref())
                .map_err(|source| OrchestratorError::Transform {
                    tenant: tenant.clone(),
                    source,
                })?;

            let settings = config.retry_settings();
            let policy = BackoffPolicy::from_settings(&settings)
                .map_err(|source| OrchestratorError::Backoff { tenant, source })?;

            let scheduler = PollScheduler::builder(
                config.tenant_id.clone(),
                config.queue_name(),
                polling.interval,
                fetchers.fetcher_for(polling.endpoint),
                Arc::clone(&self.queue),
            )
            .retry(RetryExecutor::new(settings.max_retries, policy))
            .transform(transform)
            .adapter(Adapter::for_tenant(config))
            .build();

            schedulers.insert(config.tenant_id.clone(), scheduler);
        }

        for scheduler in schedulers.values() {
            scheduler.start();
        }

        info!(
            polling = schedulers.len(),
            webhook_only = webhook_only.len(),
            "integration orchestrator started"
        );

        Ok(IntegrationOrchestrator {
            schedulers,
            webhook_only,
        })
    }
}

/// Owner of every tenant's poll scheduler.
///
/// Dropping the orchestrator stops all schedulers.
#[derive(Debug)]
pub struct IntegrationOrchestrator {
    schedulers: BTreeMap<TenantId, PollScheduler>,
    webhook_only: Vec<TenantId>,
}

impl IntegrationOrchestrator {
    pub fn builder(queue: Arc<dyn WorkQueue>) -> OrchestratorBuilder {
        OrchestratorBuilder {
            queue,
            transforms: TransformRegistry::new(),
            fetchers: None,
        }
    }

    /// Start with the built-in transforms and HTTP fetchers.
    pub fn start(configs: Vec<TenantConfig>, queue: Arc<dyn WorkQueue>) -> Result<Self, OrchestratorError> {
        Self::builder(queue).start(configs)
    }

    /// Stop every scheduler. In-flight ticks run to completion.
    pub fn shutdown(&self) {
        for scheduler in self.schedulers.values() {
            scheduler.stop();
        }
        info!(schedulers = self.schedulers.len(), "integration orchestrator shut down");
    }

    pub fn polling_tenants(&self) -> impl Iterator<Item = &TenantId> {
        self.schedulers.keys()
    }

    pub fn webhook_only_tenants(&self) -> &[TenantId] {
        &self.webhook_only
    }

    pub fn scheduler(&self, tenant: &TenantId) -> Option<&PollScheduler> {
        self.schedulers.get(tenant)
    }

    pub fn stats(&self, tenant: &TenantId) -> Option<SchedulerStats> {
        self.schedulers.get(tenant).map(PollScheduler::stats)
    }

    pub fn state(&self, tenant: &TenantId) -> Option<SchedulerState> {
        self.schedulers.get(tenant).map(PollScheduler::state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::RecordFetcher;
    use async_trait::async_trait;
    use invsync_core::{RetrySettings, TransformSpec};
    use invsync_events::InMemoryWorkQueue;
    use serde_json::{Value as JsonValue, json};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CannedFetchers {
        calls: Arc<AtomicU32>,
        endpoints: Mutex<Vec<String>>,
    }

    struct Canned {
        calls: Arc<AtomicU32>,
    }

    #[async_trait]
    impl RecordFetcher for Canned {
        async fn fetch(&self) -> Result<Vec<JsonValue>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![json!({"name": "foo", "sku": "S1", "quantity": 2})])
        }
    }

    impl FetcherFactory for CannedFetchers {
        fn fetcher_for(&self, endpoint: &str) -> Arc<dyn RecordFetcher> {
            self.endpoints.lock().unwrap().push(endpoint.to_string());
            Arc::new(Canned {
                calls: self.calls.clone(),
            })
        }
    }

    fn tenant(id: &str) -> TenantConfig {
        TenantConfig::new(TenantId::new(id).unwrap())
    }

    fn polling_org() -> TenantConfig {
        tenant("polling-org")
            .with_polling(30_000, "http://localhost:4000/paid-products")
            .with_transform(TransformSpec::UppercaseName)
    }

    #[tokio::test(start_paused = true)]
    async fn polling_tenant_enqueues_after_one_interval() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let fetchers = Arc::new(CannedFetchers::default());
        let orchestrator = IntegrationOrchestrator::builder(queue.clone())
            .fetchers(fetchers.clone())
            .start(vec![tenant("webhook-org"), polling_org()])
            .unwrap();

        assert_eq!(*fetchers.endpoints.lock().unwrap(), vec!["http://localhost:4000/paid-products"]);
        assert_eq!(orchestrator.webhook_only_tenants(), &[TenantId::new("webhook-org").unwrap()]);

        tokio::time::sleep(Duration::from_millis(30_001)).await;

        let entries = queue.entries("polling-org_products");
        assert_eq!(entries.len(), 1);
        let record: JsonValue = entries[0].decode().unwrap();
        assert_eq!(record, json!({"name": "FOO", "sku": "S1", "quantity": 2}));

        let stats = orchestrator.stats(&TenantId::new("polling-org").unwrap()).unwrap();
        assert_eq!(stats.records_enqueued, 1);
        assert!(orchestrator.stats(&TenantId::new("webhook-org").unwrap()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_tenant_starts_nothing() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let fetchers = Arc::new(CannedFetchers::default());
        let mut broken = tenant("broken");
        broken.polling_interval_ms = Some(1_000);

        let err = IntegrationOrchestrator::builder(queue.clone())
            .fetchers(fetchers.clone())
            .start(vec![polling_org(), broken])
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Config(ConfigError::IncompletePolling { .. })));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(fetchers.calls.load(Ordering::SeqCst), 0);
        assert_eq!(queue.length("polling-org_products").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_custom_transform_is_fatal() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let config = tenant("acme")
            .with_polling(1_000, "http://acme.test/items")
            .with_transform(TransformSpec::Custom { id: "missing".into() });

        let err = IntegrationOrchestrator::builder(queue)
            .fetchers(Arc::new(CannedFetchers::default()))
            .start(vec![config])
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Transform { ref tenant, .. } if tenant == "acme"));
    }

    #[tokio::test]
    async fn unknown_backoff_strategy_is_fatal() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let config = tenant("acme")
            .with_polling(1_000, "http://acme.test/items")
            .with_retry(RetrySettings {
                strategy: "fibonacci".into(),
                ..RetrySettings::default()
            });

        let err = IntegrationOrchestrator::builder(queue)
            .fetchers(Arc::new(CannedFetchers::default()))
            .start(vec![config])
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Backoff { source: BackoffError::UnknownStrategy(ref name), .. } if name == "fibonacci"
        ));
    }

    #[tokio::test]
    async fn duplicate_tenants_are_rejected() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let err = IntegrationOrchestrator::builder(queue)
            .fetchers(Arc::new(CannedFetchers::default()))
            .start(vec![polling_org(), polling_org()])
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::DuplicateTenant(ref id) if id == "polling-org"));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_stops_every_scheduler() {
        let queue = Arc::new(InMemoryWorkQueue::new());
        let fetchers = Arc::new(CannedFetchers::default());
        let orchestrator = IntegrationOrchestrator::builder(queue)
            .fetchers(fetchers.clone())
            .start(vec![
                tenant("a").with_polling(1_000, "http://a.test"),
                tenant("b").with_polling(1_000, "http://b.test"),
            ])
            .unwrap();

        assert_eq!(orchestrator.polling_tenants().count(), 2);
        tokio::time::sleep(Duration::from_millis(1_001)).await;
        assert_eq!(fetchers.calls.load(Ordering::SeqCst), 2);

        orchestrator.shutdown();
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(fetchers.calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            orchestrator.state(&TenantId::new("a").unwrap()),
            Some(SchedulerState::Stopped)
        );
    }
}
