// handlers/tenant.rs - Tenant-scoped handlers
//
// Everything here runs with a bound tenant: the pipeline has already resolved,
// validated and pooled it before the handler is called.

use std::sync::Arc;

use axum::extract::{Extension, State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::database::registry::SourceFactory;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult, ResolvedTenant};
use crate::tenancy::{TenantContext, TenantId, TenantRouting};

#[derive(Debug, Serialize)]
pub struct TenantContextView {
    pub tenant: ResolvedTenant,
    /// What persistence code sees through the context
    pub bound_tenant: Option<TenantId>,
    pub pool_created_at: DateTime<Utc>,
    pub max_pool_size: u32,
    pub min_idle: u32,
}

/// GET /api/context and GET /tenant/:id/context
pub async fn tenant_context<F: SourceFactory>(
    State(routing): State<Arc<TenantRouting<F>>>,
    Extension(tenant): Extension<ResolvedTenant>,
) -> ApiResult<TenantContextView> {
    let bound_tenant = TenantContext::get();

    // Same lookup persistence code goes through
    routing.current_source().await?;

    let entry = routing
        .registry()
        .entry(&tenant.tenant_id)
        .await
        .ok_or_else(|| ApiError::service_unavailable("Tenant connection source is not available"))?;

    Ok(ApiResponse::success(TenantContextView {
        tenant,
        bound_tenant,
        pool_created_at: entry.created_at,
        max_pool_size: entry.profile.max_pool_size,
        min_idle: entry.profile.min_idle,
    }))
}
