use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;

use crate::database::registry::SourceFactory;
use crate::tenancy::TenantRouting;

/// GET /health - primary source round trip. Never tenant-scoped.
pub async fn health<F: SourceFactory>(State(routing): State<Arc<TenantRouting<F>>>) -> Response {
    let now = chrono::Utc::now();

    match routing.registry().ping_primary().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "database": "ok",
                    "tenant_pools": routing.registry().tenant_ids().await.len(),
                }
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::warn!(error = %e, "health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "success": false,
                    "message": "database unavailable",
                    "timestamp": now,
                    "status": 503,
                })),
            )
                .into_response()
        }
    }
}
