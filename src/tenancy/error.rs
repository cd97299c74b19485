use thiserror::Error;

use crate::database::registry::RegistryError;
use super::context::TenantId;
use super::validator::RejectionReason;

/// Why a request could not be routed to a tenant
#[derive(Debug, Error)]
pub enum TenantRoutingError {
    #[error("Tenant identifier is required")]
    MissingTenant,

    #[error("Tenant '{tenant_id}' not found or inactive")]
    TenantNotFound {
        tenant_id: TenantId,
        reason: RejectionReason,
    },

    #[error("Tenant '{tenant_id}' is temporarily unavailable")]
    TenantUnavailable {
        tenant_id: TenantId,
        #[source]
        source: RegistryError,
    },

    /// Detail is for logs only
    #[error("Internal tenant resolution error: {0}")]
    Internal(String),
}

impl TenantRoutingError {
    pub fn kind(&self) -> &'static str {
        match self {
            TenantRoutingError::MissingTenant => "missing_tenant",
            TenantRoutingError::TenantNotFound { .. } => "tenant_not_found",
            TenantRoutingError::TenantUnavailable { .. } => "tenant_unavailable",
            TenantRoutingError::Internal(_) => "internal_resolution_error",
        }
    }
}
