use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, error};

use crate::database::registry::SourceFactory;
use crate::error::ApiError;
use crate::tenancy::context::ClearOnDrop;
use crate::tenancy::{
    RequestAttributes, ResolutionSource, TenantContext, TenantId, TenantRouting, TenantRoutingError,
};

/// Tenant bound to the current request, injected by the pipeline
#[derive(Clone, Debug, Serialize)]
pub struct ResolvedTenant {
    pub tenant_id: TenantId,
    pub name: String,
    pub resolved_by: ResolutionSource,
}

/// Per-request tenant pipeline.
///
/// Excluded paths pass straight through. Every other request is resolved,
/// validated and given its tenant's source before the handler runs; any failure
/// short-circuits with a JSON rejection and nothing is bound. The handler runs
/// inside a fresh context scope and the binding is cleared when it finishes,
/// panics, or is cancelled.
pub async fn tenant_pipeline<F: SourceFactory>(
    State(routing): State<Arc<TenantRouting<F>>>,
    mut request: Request,
    next: Next,
) -> Response {
    if routing.is_excluded(request.uri().path()) {
        return next.run(request).await;
    }

    let routed = {
        let attributes = RequestAttributes::from_request(&request);
        match AssertUnwindSafe(routing.route(&attributes)).catch_unwind().await {
            Ok(Ok(routed)) => routed,
            Ok(Err(e)) => {
                debug!(kind = e.kind(), "tenant routing rejected request");
                return ApiError::from(e).into_response();
            }
            Err(panic) => return internal_error("tenant routing panicked", panic),
        }
    };

    let tenant_id = routed.tenant_id.clone();
    debug!(tenant_id = %tenant_id, resolved_by = ?routed.resolved_by, "tenant routed");
    request.extensions_mut().insert(ResolvedTenant {
        tenant_id: routed.tenant_id,
        name: routed.record.name,
        resolved_by: routed.resolved_by,
    });

    TenantContext::scope(async move {
        let guard = match ClearOnDrop::bind(tenant_id) {
            Ok(guard) => guard,
            Err(e) => return ApiError::from(TenantRoutingError::Internal(e.to_string())).into_response(),
        };

        let outcome = AssertUnwindSafe(next.run(request)).catch_unwind().await;
        drop(guard);

        match outcome {
            Ok(response) => response,
            Err(panic) => internal_error("request handler panicked", panic),
        }
    })
    .await
}

fn internal_error(context: &str, panic: Box<dyn Any + Send>) -> Response {
    let detail = panic_message(panic.as_ref());
    error!(panic = %detail, "{}", context);
    ApiError::from(TenantRoutingError::Internal(format!("{context}: {detail}"))).into_response()
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        msg.to_string()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
