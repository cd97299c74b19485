use std::cell::RefCell;
use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Opaque, case-sensitive tenant identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Build an id from raw request input. Surrounding whitespace is dropped;
    /// blank input yields `None`. Case is preserved.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("no tenant scope is active for the current request")]
    NoScope,
}

tokio::task_local! {
    static CURRENT_TENANT: RefCell<Option<TenantId>>;
}

/// Request-scoped tenant binding.
///
/// Storage lives in a tokio task-local that only exists inside [`TenantContext::scope`].
/// Each request runs its own scope, so a binding can never be observed by another
/// request, and the storage disappears when the scope's future completes or is dropped.
pub struct TenantContext;

impl TenantContext {
    /// Run `fut` with fresh, unbound tenant storage.
    pub async fn scope<F>(fut: F) -> F::Output
    where
        F: Future,
    {
        CURRENT_TENANT.scope(RefCell::new(None), fut).await
    }

    /// Bind `id` to the current request.
    pub fn set(id: TenantId) -> Result<(), ContextError> {
        CURRENT_TENANT
            .try_with(|slot| {
                *slot.borrow_mut() = Some(id);
            })
            .map_err(|_| ContextError::NoScope)
    }

    /// The id bound to the current request, if any.
    pub fn get() -> Option<TenantId> {
        CURRENT_TENANT
            .try_with(|slot| slot.borrow().clone())
            .ok()
            .flatten()
    }

    pub fn clear() {
        let _ = CURRENT_TENANT.try_with(|slot| {
            slot.borrow_mut().take();
        });
    }

    /// Whether tenant storage exists for the current task.
    pub fn is_scoped() -> bool {
        CURRENT_TENANT.try_with(|_| ()).is_ok()
    }
}

/// Clears the binding when dropped, on normal return, unwind or cancellation alike.
pub(crate) struct ClearOnDrop {
    tenant_id: TenantId,
}

impl ClearOnDrop {
    pub(crate) fn bind(tenant_id: TenantId) -> Result<Self, ContextError> {
        TenantContext::set(tenant_id.clone())?;
        tracing::trace!(tenant_id = %tenant_id, "tenant context bound");
        Ok(Self { tenant_id })
    }
}

impl Drop for ClearOnDrop {
    fn drop(&mut self) {
        TenantContext::clear();
        tracing::trace!(tenant_id = %self.tenant_id, "tenant context cleared");
    }
}
