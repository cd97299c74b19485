use std::sync::Arc;

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::database::registry::SourceFactory;
use crate::tenancy::context::ClearOnDrop;
use crate::tenancy::{RequestAttributes, TenantContext, TenantRouting};

/// Second binding pass, mounted inside the pipeline.
///
/// Binds the context from request attributes (header, query parameter, subdomain,
/// path) only when nothing is bound yet. Never overrides a binding, never applies
/// the default tenant and never validates.
pub async fn tenant_fallback<F: SourceFactory>(
    State(routing): State<Arc<TenantRouting<F>>>,
    request: Request,
    next: Next,
) -> Response {
    if routing.is_excluded(request.uri().path()) || TenantContext::get().is_some() {
        return next.run(request).await;
    }

    let resolution = routing
        .resolver()
        .resolve_from_attributes(&RequestAttributes::from_request(&request));
    let Some(resolution) = resolution else {
        return next.run(request).await;
    };

    debug!(tenant_id = %resolution.tenant_id, "binding tenant from request attributes");
    TenantContext::scope(async move {
        // A fresh scope always accepts a binding
        let _guard = ClearOnDrop::bind(resolution.tenant_id).ok();
        next.run(request).await
    })
    .await
}
