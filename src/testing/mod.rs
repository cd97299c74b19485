use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::database::directory::{DirectoryError, TenantDirectory};
use crate::database::models::tenant::{ConnectionProfile, TenantRecord};
use crate::database::registry::{RegistryError, SourceFactory};
use crate::tenancy::TenantId;

pub fn tenant_id(raw: &str) -> TenantId {
    TenantId::parse(raw).expect("non-blank tenant id")
}

/// Active tenant whose database URL embeds the id.
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

pub fn inactive_record(id: &str) -> TenantRecord {
    TenantRecord {
        active: false,
        ..record(id)
    }
}

/// Stand-in for a pool handle
#[derive(Debug)]
pub struct FakePool {
    pub url: String,
    closed: AtomicBool,
}

impl FakePool {
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Counts constructions. URLs containing `unreachable` fail; URLs containing
/// `slow` wait for [`CountingFactory::gate`] to be notified.
#[derive(Default)]
pub struct CountingFactory {
    created: AtomicUsize,
    delay: Duration,
    gate: Arc<Notify>,
    fail_next: AtomicBool,
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

    pub fn gate(&self) -> Arc<Notify> {
        self.gate.clone()
    }

    /// The next build fails after the configured delay; later builds succeed.
    pub fn fail_next_build(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SourceFactory for CountingFactory {
    type Source = Arc<FakePool>;

    async fn create(&self, profile: &ConnectionProfile) -> Result<Self::Source, RegistryError> {
        if profile.url.contains("unreachable") {
            return Err(RegistryError::Unavailable(format!("cannot reach {}", profile.url)));
        }
        if profile.url.contains("slow") {
            self.gate.notified().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(RegistryError::Unavailable("transient connect failure".to_string()));
        }

        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakePool {
            url: profile.url.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self, source: &Self::Source) {
        source.closed.store(true, Ordering::SeqCst);
    }
}

/// Directory over a fixed record set, counting lookups
#[derive(Default)]
pub struct InMemoryDirectory {
    records: HashMap<TenantId, TenantRecord>,
    lookups: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryDirectory {
    pub fn with(records: impl IntoIterator<Item = TenantRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.tenant_id.clone(), r))
                .collect(),
            ..Self::default()
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TenantDirectory for InMemoryDirectory {
    async fn find(&self, id: &TenantId) -> Result<Option<TenantRecord>, DirectoryError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DirectoryError::Unavailable(RegistryError::Unavailable(
                "master database down".to_string(),
            )));
        }
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
