use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use invsync_core::{RetrySettings, TenantConfig, TenantId, TransformSpec};
use invsync_events::{InMemoryWorkQueue, WorkQueue};
use invsync_infra::{FetchError, HttpFetcher, HttpFetcherFactory, IntegrationOrchestrator, RecordFetcher};
use serde_json::{Value as JsonValue, json};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn(app: Router) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn tenant_api() -> Router {
    Router::new()
        .route(
            "/paid-products",
            get(|| async { axum::Json(json!([{"name": "foo", "sku": "S1", "quantity": 2}])) }),
        )
        .route("/broken", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
        .route("/not-a-list", get(|| async { axum::Json(json!({"items": []})) }))
}

#[tokio::test]
async fn http_fetcher_decodes_a_json_array() {
    let srv = TestServer::spawn(tenant_api()).await;
    let fetcher = HttpFetcher::new(reqwest::Client::new(), format!("{}/paid-products", srv.base_url));

    let records = fetcher.fetch().await.unwrap();

    assert_eq!(records, vec![json!({"name": "foo", "sku": "S1", "quantity": 2})]);
}

#[tokio::test]
async fn non_success_status_is_a_fetch_error() {
    let srv = TestServer::spawn(tenant_api()).await;
    let fetcher = HttpFetcher::new(reqwest::Client::new(), format!("{}/broken", srv.base_url));

    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, FetchError::Status { status: 503, .. }));
}

#[tokio::test]
async fn non_array_body_is_a_decode_error() {
    let srv = TestServer::spawn(tenant_api()).await;
    let fetcher = HttpFetcher::new(reqwest::Client::new(), format!("{}/not-a-list", srv.base_url));

    let err = fetcher.fetch().await.unwrap_err();

    assert!(matches!(err, FetchError::Decode { .. }));
}

#[tokio::test]
async fn orchestrated_tenant_polls_over_http() {
    let srv = TestServer::spawn(tenant_api()).await;
    let queue = Arc::new(InMemoryWorkQueue::new());

    let config = TenantConfig::new(TenantId::new("polling-org").unwrap())
        .with_polling(50, format!("{}/paid-products", srv.base_url))
        .with_transform(TransformSpec::UppercaseName);

    let orchestrator = IntegrationOrchestrator::builder(queue.clone())
        .fetchers(Arc::new(HttpFetcherFactory::with_timeout(Duration::from_secs(5)).unwrap()))
        .start(vec![config])
        .unwrap();

    let mut head = None;
    for _ in 0..100 {
        if let Some(entry) = queue.peek("polling-org_products").await.unwrap() {
            head = Some(entry);
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    orchestrator.shutdown();

    let record: JsonValue = head.expect("no record was polled in time").decode().unwrap();
    assert_eq!(record, json!({"name": "FOO", "sku": "S1", "quantity": 2}));
}

#[tokio::test]
async fn unreachable_endpoint_counts_failed_ticks() {
    // Nothing listens on the port of a dropped listener.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = format!("http://{}/paid-products", listener.local_addr().unwrap());
    drop(listener);

    let queue = Arc::new(InMemoryWorkQueue::new());
    let tenant = TenantId::new("offline-org").unwrap();
    let config = TenantConfig::new(tenant.clone())
        .with_polling(20, dead)
        .with_retry(RetrySettings {
            max_retries: 1,
            strategy: "fixed".into(),
            initial_delay_ms: None,
            backoff_factor: None,
            delay_ms: Some(5),
        });

    let orchestrator = IntegrationOrchestrator::builder(queue.clone())
        .fetchers(Arc::new(HttpFetcherFactory::with_timeout(Duration::from_secs(1)).unwrap()))
        .start(vec![config])
        .unwrap();

    let mut failed = false;
    for _ in 0..200 {
        if orchestrator.stats(&tenant).unwrap().ticks_failed > 0 {
            failed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    orchestrator.shutdown();

    assert!(failed, "no tick failed in time");
    assert_eq!(queue.length("offline-org_products").await.unwrap(), 0);
}
