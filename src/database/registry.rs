use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock};
use tracing::{info, warn};

use crate::database::models::tenant::{ConnectionProfile, TenantRecord};
use crate::tenancy::TenantId;

/// Errors from building a connection source
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unsupported database driver: {0}")]
    UnsupportedDriver(String),

    #[error("invalid connection url: {0}")]
    InvalidUrl(String),

    #[error("connection source unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds pooled connection sources from connection profiles
#[async_trait]
pub trait SourceFactory: Send + Sync + 'static {
    /// Cheap, shareable handle to a pool.
    type Source: Clone + Send + Sync + 'static;

    async fn create(&self, profile: &ConnectionProfile) -> Result<Self::Source, RegistryError>;

    /// Builds the primary source. Defaults to [`SourceFactory::create`].
    async fn create_primary(&self, profile: &ConnectionProfile) -> Result<Self::Source, RegistryError> {
        self.create(profile).await
    }

    async fn close(&self, _source: &Self::Source) {}

    /// Round trip to the database behind `source`.
    async fn ping(&self, _source: &Self::Source) -> Result<(), RegistryError> {
        Ok(())
    }
}

/// One tenant's pool and how it was built
#[derive(Debug, Clone)]
pub struct ConnectionSourceEntry<S> {
    pub tenant_id: TenantId,
    pub source: S,
    pub created_at: DateTime<Utc>,
    pub profile: ConnectionProfile,
}

type Slot<S> = Arc<OnceCell<ConnectionSourceEntry<S>>>;

/// Owns every per-tenant pool plus the primary pool.
///
/// The map lock is only held to look up or insert a slot; pool construction runs
/// under the slot's own `OnceCell`, so first use of one tenant never waits on
/// another tenant's construction.
pub struct SourceRegistry<F: SourceFactory> {
    factory: F,
    default_profile: ConnectionProfile,
    primary: OnceCell<F::Source>,
    slots: RwLock<HashMap<TenantId, Slot<F::Source>>>,
}

impl<F: SourceFactory> SourceRegistry<F> {
    pub fn new(factory: F, default_profile: ConnectionProfile) -> Self {
        Self {
            factory,
            default_profile,
            primary: OnceCell::new(),
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Pool for a validated tenant, built on first use and shared afterwards.
    pub async fn get_source(&self, tenant: &TenantRecord) -> Result<F::Source, RegistryError> {
        let slot = self.slot(&tenant.tenant_id).await;

        match slot.get_or_try_init(|| self.build_entry(tenant)).await {
            Ok(entry) => {
                let source = entry.source.clone();
                self.adopt_if_detached(&tenant.tenant_id, &slot).await;
                Ok(source)
            }
            Err(e) => {
                self.discard_if_empty(&tenant.tenant_id, &slot).await;
                Err(e)
            }
        }
    }

    /// Pool built from the static default profile. Independent of tenant traffic
    /// and of the directory.
    pub async fn primary_source(&self) -> Result<F::Source, RegistryError> {
        self.primary
            .get_or_try_init(|| async {
                info!(driver = %self.default_profile.driver, "creating primary connection source");
                self.factory.create_primary(&self.default_profile).await
            })
            .await
            .cloned()
    }

    pub async fn ping_primary(&self) -> Result<(), RegistryError> {
        let primary = self.primary_source().await?;
        self.factory.ping(&primary).await
    }

    /// Already-built pool for `id`, without creating one.
    pub async fn existing(&self, id: &TenantId) -> Option<F::Source> {
        let slots = self.slots.read().await;
        slots.get(id).and_then(|slot| slot.get()).map(|entry| entry.source.clone())
    }

    pub async fn entry(&self, id: &TenantId) -> Option<ConnectionSourceEntry<F::Source>> {
        let slots = self.slots.read().await;
        slots.get(id).and_then(|slot| slot.get()).cloned()
    }

    /// Tenants that currently own a pool, sorted.
    pub async fn tenant_ids(&self) -> Vec<TenantId> {
        let slots = self.slots.read().await;
        let mut ids: Vec<TenantId> = slots
            .iter()
            .filter(|(_, slot)| slot.initialized())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Close and forget one tenant's pool. Returns whether a pool existed.
    pub async fn evict(&self, id: &TenantId) -> bool {
        let removed = {
            let mut slots = self.slots.write().await;
            slots.remove(id)
        };

        match removed.as_ref().and_then(|slot| slot.get()) {
            Some(entry) => {
                self.factory.close(&entry.source).await;
                info!(tenant_id = %id, "evicted connection source");
                true
            }
            None => false,
        }
    }

    /// Close every pool (e.g., on shutdown)
    pub async fn close_all(&self) {
        let drained: Vec<(TenantId, Slot<F::Source>)> = {
            let mut slots = self.slots.write().await;
            slots.drain().collect()
        };

        for (id, slot) in drained {
            if let Some(entry) = slot.get() {
                self.factory.close(&entry.source).await;
                info!(tenant_id = %id, "closed connection source");
            }
        }

        if let Some(primary) = self.primary.get() {
            self.factory.close(primary).await;
            info!("closed primary connection source");
        }
    }

    async fn slot(&self, id: &TenantId) -> Slot<F::Source> {
        // Fast path: try read lock
        {
            let slots = self.slots.read().await;
            if let Some(slot) = slots.get(id) {
                return slot.clone();
            }
        }

        let mut slots = self.slots.write().await;
        slots
            .entry(id.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn build_entry(
        &self,
        tenant: &TenantRecord,
    ) -> Result<ConnectionSourceEntry<F::Source>, RegistryError> {
        let profile = &tenant.connection;
        info!(
            tenant_id = %tenant.tenant_id,
            max_pool_size = profile.max_pool_size,
            min_idle = profile.min_idle,
            "creating connection source"
        );

        let source = self.factory.create(profile).await.map_err(|e| {
            warn!(tenant_id = %tenant.tenant_id, error = %e, "connection source construction failed");
            e
        })?;

        Ok(ConnectionSourceEntry {
            tenant_id: tenant.tenant_id.clone(),
            source,
            created_at: Utc::now(),
            profile: profile.clone(),
        })
    }

    // A failed build leaves an empty slot behind. Drop it only when nobody else
    // holds it: the map and the failing caller account for two references, any
    // more means another caller is waiting on or building into the same slot.
    async fn discard_if_empty(&self, id: &TenantId, failed: &Slot<F::Source>) {
        let mut slots = self.slots.write().await;
        let stale = slots
            .get(id)
            .map(|current| {
                Arc::ptr_eq(current, failed) && !current.initialized() && Arc::strong_count(current) <= 2
            })
            .unwrap_or(false);
        if stale {
            slots.remove(id);
        }
    }

    // A slot removed while its build was in flight must not strand the pool
    // outside the map, where nothing could reuse or close it.
    async fn adopt_if_detached(&self, id: &TenantId, built: &Slot<F::Source>) {
        {
            let slots = self.slots.read().await;
            if slots.get(id).is_some() {
                return;
            }
        }

        let mut slots = self.slots.write().await;
        slots.entry(id.clone()).or_insert_with(|| built.clone());
    }
}
