use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{delete, get},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::database::registry::SourceFactory;
use crate::handlers;
use crate::middleware::{tenant_fallback, tenant_pipeline};
use crate::tenancy::TenantRouting;

pub type RoutingState<F> = Arc<TenantRouting<F>>;

/// Full application router
pub fn app<F: SourceFactory>(routing: RoutingState<F>) -> Router {
    with_tenant_routing(routes::<F>(), routing)
        // Global middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Every route, before tenant routing is attached
pub fn routes<F: SourceFactory>() -> Router<RoutingState<F>> {
    Router::new()
        // Tenant-agnostic
        .route("/health", get(handlers::health::health::<F>))
        .merge(master_routes::<F>())
        // Tenant-scoped
        .route("/api/context", get(handlers::tenant::tenant_context::<F>))
        .route("/tenant/:id/context", get(handlers::tenant::tenant_context::<F>))
}

fn master_routes<F: SourceFactory>() -> Router<RoutingState<F>> {
    use handlers::master;

    Router::new()
        .route("/api/master/tenants", get(master::tenant_list::<F>))
        .route("/api/master/tenants/:id/cache", delete(master::tenant_forget::<F>))
}

/// Mount the tenant pipeline and its second pass on `router`, then attach state.
/// The pipeline is the outer layer, so it runs first.
pub fn with_tenant_routing<F: SourceFactory>(
    router: Router<RoutingState<F>>,
    routing: RoutingState<F>,
) -> Router {
    router
        .layer(from_fn_with_state(routing.clone(), tenant_fallback::<F>))
        .layer(from_fn_with_state(routing.clone(), tenant_pipeline::<F>))
        .with_state(routing)
}
