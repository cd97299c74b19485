// handlers/master.rs - Tenant administration (/api/master/*)
//
// These routes are on the excluded-path list: no tenant is ever bound for them,
// and they talk to the directory and registry directly.

use std::sync::Arc;

use axum::extract::{Path, State};
use serde::Serialize;

use crate::database::registry::SourceFactory;
use crate::error::ApiError;
use crate::middleware::{ApiResponse, ApiResult};
use crate::tenancy::{TenantId, TenantRouting};

#[derive(Debug, Serialize)]
pub struct TenantOverview {
    pub active: Vec<TenantId>,
    pub pooled: Vec<TenantId>,
}

#[derive(Debug, Serialize)]
pub struct ForgetOutcome {
    pub tenant_id: TenantId,
    pub cache_invalidated: bool,
    pub pool_closed: bool,
}

/// GET /api/master/tenants
pub async fn tenant_list<F: SourceFactory>(
    State(routing): State<Arc<TenantRouting<F>>>,
) -> ApiResult<TenantOverview> {
    let active = routing.validator().directory().find_all_active().await?;
    let pooled = routing.registry().tenant_ids().await;

    Ok(ApiResponse::success(TenantOverview { active, pooled }))
}

/// DELETE /api/master/tenants/:id/cache
pub async fn tenant_forget<F: SourceFactory>(
    State(routing): State<Arc<TenantRouting<F>>>,
    Path(raw_id): Path<String>,
) -> ApiResult<ForgetOutcome> {
    let tenant_id =
        TenantId::parse(&raw_id).ok_or_else(|| ApiError::bad_request("Tenant identifier is required"))?;

    let (cache_invalidated, pool_closed) = routing.forget(&tenant_id).await;

    Ok(ApiResponse::success(ForgetOutcome {
        tenant_id,
        cache_invalidated,
        pool_closed,
    }))
}
