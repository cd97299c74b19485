use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::{ConfigError, TenancyConfig};
use crate::database::directory::{DirectoryError, TenantDirectory};
use crate::database::models::tenant::TenantRecord;
use crate::database::registry::{RegistryError, SourceFactory, SourceRegistry};
use super::context::{TenantContext, TenantId};
use super::error::TenantRoutingError;
use super::resolver::{matches_prefix, RequestAttributes, ResolutionSource, TenantResolver};
use super::validator::{TenantValidator, Validation};

const WARM_UP_CONCURRENCY: usize = 8;

/// A request's tenant after resolution, validation and source acquisition
#[derive(Debug, Clone)]
pub struct RoutedTenant<S> {
    pub tenant_id: TenantId,
    pub resolved_by: ResolutionSource,
    pub record: TenantRecord,
    pub connection: S,
}

#[derive(Debug, Default, Serialize)]
pub struct WarmUpReport {
    pub ready: Vec<TenantId>,
    pub failed: Vec<TenantId>,
}

/// Shared routing state handed to the request pipeline
pub struct TenantRouting<F: SourceFactory> {
    resolver: TenantResolver,
    validator: TenantValidator,
    registry: Arc<SourceRegistry<F>>,
    excluded_paths: Vec<String>,
}

impl<F: SourceFactory> TenantRouting<F> {
    pub fn new(
        resolver: TenantResolver,
        validator: TenantValidator,
        registry: Arc<SourceRegistry<F>>,
        excluded_paths: Vec<String>,
    ) -> Self {
        Self {
            resolver,
            validator,
            registry,
            excluded_paths,
        }
    }

    pub fn from_config(
        config: &TenancyConfig,
        directory: Arc<dyn TenantDirectory>,
        registry: Arc<SourceRegistry<F>>,
    ) -> Result<Self, ConfigError> {
        Ok(Self::new(
            TenantResolver::from_config(config)?,
            TenantValidator::new(directory),
            registry,
            config.excluded_paths.clone(),
        ))
    }

    pub fn resolver(&self) -> &TenantResolver {
        &self.resolver
    }

    pub fn validator(&self) -> &TenantValidator {
        &self.validator
    }

    pub fn registry(&self) -> &Arc<SourceRegistry<F>> {
        &self.registry
    }

    /// Tenant-agnostic paths skip routing entirely.
    pub fn is_excluded(&self, path: &str) -> bool {
        self.excluded_paths.iter().any(|prefix| matches_prefix(path, prefix))
    }

    /// Resolve, validate and acquire a source, in that order.
    pub async fn route(
        &self,
        request: &RequestAttributes<'_>,
    ) -> Result<RoutedTenant<F::Source>, TenantRoutingError> {
        let resolution = self
            .resolver
            .resolve(request)
            .ok_or(TenantRoutingError::MissingTenant)?;
        let tenant_id = resolution.tenant_id;

        let record = match self.validator.validate(&tenant_id).await {
            Ok(Validation::Valid(record)) => record,
            Ok(Validation::Rejected(reason)) => {
                return Err(TenantRoutingError::TenantNotFound { tenant_id, reason });
            }
            Err(e) => {
                error!(tenant_id = %tenant_id, error = ?e, "tenant directory lookup failed");
                return Err(TenantRoutingError::Internal(e.to_string()));
            }
        };

        let connection = self
            .registry
            .get_source(&record)
            .await
            .map_err(|source| TenantRoutingError::TenantUnavailable {
                tenant_id: tenant_id.clone(),
                source,
            })?;

        Ok(RoutedTenant {
            tenant_id,
            resolved_by: resolution.source,
            record,
            connection,
        })
    }

    /// The source persistence code should use right now: the bound tenant's pool,
    /// or the primary pool when no tenant is bound.
    pub async fn current_source(&self) -> Result<F::Source, RegistryError> {
        match TenantContext::get() {
            Some(id) => self.registry.existing(&id).await.ok_or_else(|| {
                RegistryError::Unavailable(format!("no connection source built for tenant {id}"))
            }),
            None => self.registry.primary_source().await,
        }
    }

    /// Drop a tenant's cached validation and pool. Returns (was_cached, had_pool).
    pub async fn forget(&self, id: &TenantId) -> (bool, bool) {
        let cached = self.validator.invalidate(id).await;
        let pooled = self.registry.evict(id).await;
        info!(tenant_id = %id, cached, pooled, "tenant routing state reset");
        (cached, pooled)
    }

    /// Validate every active tenant and build its pool. Individual failures are
    /// reported, not fatal.
    pub async fn warm_up(&self) -> Result<WarmUpReport, DirectoryError> {
        let ids = self.validator.directory().find_all_active().await?;

        let outcomes: Vec<(TenantId, bool)> = stream::iter(ids)
            .map(|id| async move {
                let ok = match self.validator.validate(&id).await {
                    Ok(Validation::Valid(record)) => match self.registry.get_source(&record).await {
                        Ok(_) => true,
                        Err(e) => {
                            warn!(tenant_id = %id, error = %e, "warm-up could not build pool");
                            false
                        }
                    },
                    Ok(Validation::Rejected(reason)) => {
                        warn!(tenant_id = %id, ?reason, "warm-up skipped tenant");
                        false
                    }
                    Err(e) => {
                        warn!(tenant_id = %id, error = %e, "warm-up validation failed");
                        false
                    }
                };
                (id, ok)
            })
            .buffer_unordered(WARM_UP_CONCURRENCY)
            .collect()
            .await;

        let mut report = WarmUpReport::default();
        for (id, ok) in outcomes {
            if ok {
                report.ready.push(id);
            } else {
                report.failed.push(id);
            }
        }
        report.ready.sort();
        report.failed.sort();
        info!(ready = report.ready.len(), failed = report.failed.len(), "tenant pool warm-up finished");
        Ok(report)
    }
}
