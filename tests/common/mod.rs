#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    extract::State,
    http::{Request, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use schoolbus_api::app::{routes, with_tenant_routing, RoutingState};
use schoolbus_api::config::TenancyConfig;
use schoolbus_api::database::{
    ConnectionProfile, DirectoryError, RegistryError, SourceFactory, SourceRegistry, TenantDirectory,
    TenantRecord,
};
use schoolbus_api::tenancy::{TenantContext, TenantId, TenantRouting};

pub fn tenant_id(raw: &str) -> TenantId {
    TenantId::parse(raw).expect("non-blank tenant id")
}

pub fn record(id: &str) -> TenantRecord {
    TenantRecord {
        tenant_id: tenant_id(id),
        name: format!("{id} schools"),
        active: true,
        connection: ConnectionProfile {
            url: format!("postgres://fleet@db.internal:5432/{id}"),
            ..ConnectionProfile::default()
        },
    }
}

pub fn inactive(id: &str) -> TenantRecord {
    TenantRecord {
        active: false,
        ..record(id)
    }
}

/// Tenant whose database refuses connections
pub fn unreachable(id: &str) -> TenantRecord {
    let mut record = record(id);
    record.connection.url = format!("postgres://fleet@unreachable:5432/{id}");
    record
}

/// Directory over a fixed set of records, counting lookups
#[derive(Default)]
pub struct MemoryDirectory {
    records: HashMap<TenantId, TenantRecord>,
    lookups: AtomicUsize,
}

impl MemoryDirectory {
    pub fn with(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self {
            records: records.into_iter().map(|r| (r.tenant_id.clone(), r)).collect(),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TenantDirectory for MemoryDirectory {
    async fn find(&self, id: &TenantId) -> Result<Option<TenantRecord>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.records.get(id).cloned())
    }

    async fn find_all_active(&self) -> Result<Vec<TenantId>, DirectoryError> {
        let mut ids: Vec<TenantId> = self
            .records
            .values()
            .filter(|r| r.active)
            .map(|r| r.tenant_id.clone())
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[derive(Debug)]
pub struct FakePool {
    pub url: String,
    pub closed: AtomicBool,
}

/// Hands out fake pools and counts how many it built
#[derive(Clone, Default)]
pub struct CountingFactory {
    created: Arc<AtomicUsize>,
    delay: Duration,
}

impl CountingFactory {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFactory for CountingFactory {
    type Source = Arc<FakePool>;

    async fn create(&self, profile: &ConnectionProfile) -> Result<Arc<FakePool>, RegistryError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if profile.url.contains("unreachable") {
            return Err(RegistryError::Unavailable(format!("connection refused: {}", profile.url)));
        }
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakePool {
            url: profile.url.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    // Like the Postgres factory, the primary pool is lazy and never fails to build
    async fn create_primary(&self, profile: &ConnectionProfile) -> Result<Arc<FakePool>, RegistryError> {
        Ok(Arc::new(FakePool {
            url: profile.url.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self, source: &Arc<FakePool>) {
        source.closed.store(true, Ordering::SeqCst);
    }

    async fn ping(&self, source: &Arc<FakePool>) -> Result<(), RegistryError> {
        if source.url.contains("unreachable") {
            return Err(RegistryError::Unavailable(format!("connection refused: {}", source.url)));
        }
        Ok(())
    }
}

/// Routing state plus handles to its fakes
pub struct Harness {
    pub routing: RoutingState<CountingFactory>,
    pub directory: Arc<MemoryDirectory>,
    pub factory: CountingFactory,
}

impl Harness {
    pub fn new(config: TenancyConfig, records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self::with_factory(config, records, CountingFactory::default())
    }

    pub fn with_factory(
        config: TenancyConfig,
        records: impl IntoIterator<Item = TenantRecord>,
        factory: CountingFactory,
    ) -> Self {
        Self::build(config, records, factory, record("master").connection)
    }

    /// Master database refuses connections
    pub fn with_master_down(config: TenancyConfig, records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self::build(config, records, CountingFactory::default(), unreachable("master").connection)
    }

    fn build(
        config: TenancyConfig,
        records: impl IntoIterator<Item = TenantRecord>,
        factory: CountingFactory,
        master: ConnectionProfile,
    ) -> Self {
        let directory = Arc::new(MemoryDirectory::with(records));
        let registry = Arc::new(SourceRegistry::new(factory.clone(), master));
        let routing = Arc::new(
            TenantRouting::from_config(&config, directory.clone(), registry).expect("valid tenancy config"),
        );
        Self {
            routing,
            directory,
            factory,
        }
    }

    /// Application routes plus `/api/whoami`, `/api/boom` and `/api/slow`, behind
    /// the tenant pipeline.
    pub fn router(&self) -> Router {
        let routes = routes::<CountingFactory>()
            .route("/api/whoami", get(whoami))
            .route("/api/boom", get(boom))
            .route("/api/slow", get(slow))
            .route("/health/whoami", get(whoami));
        with_tenant_routing(routes, self.routing.clone())
    }
}

/// Reports the bound tenant and the source persistence code would use
async fn whoami(State(routing): State<RoutingState<CountingFactory>>) -> Json<Value> {
    let source = routing.current_source().await.ok().map(|s| s.url.clone());
    Json(json!({
        "bound": TenantContext::get(),
        "source": source,
    }))
}

async fn boom() -> &'static str {
    panic!("handler exploded")
}

/// Holds the binding long enough for a client to give up
async fn slow() -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Json(json!({ "bound": TenantContext::get() }))
}

/// Drive one request through `router` and decode the JSON body
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.oneshot(request).await.expect("infallible router");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
    };
    (status, body)
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn get_with_header(uri: &str, name: &str, value: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(name, value)
        .body(Body::empty())
        .unwrap()
}

/// A real listener on a free port serving `router`
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub async fn spawn(router: Router) -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self { port, base_url, handle })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
