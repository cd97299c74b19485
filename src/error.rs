// HTTP API Error Types
use axum::{http::StatusCode, response::IntoResponse, Json};
use chrono::{SecondsFormat, Utc};
use serde_json::{json, Value};

use crate::database::directory::DirectoryError;
use crate::database::registry::RegistryError;
use crate::tenancy::TenantRoutingError;

/// HTTP API error with appropriate status codes and client-friendly messages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    // 400 Bad Request
    BadRequest(String),

    // 404 Not Found
    NotFound(String),

    // 500 Internal Server Error
    InternalServerError(String),

    // 503 Service Unavailable
    ServiceUnavailable(String),
}

impl ApiError {
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::InternalServerError(_) => 500,
            ApiError::ServiceUnavailable(_) => 503,
        }
    }

    /// Get client-safe error message
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(msg) => msg,
            ApiError::NotFound(msg) => msg,
            ApiError::InternalServerError(msg) => msg,
            ApiError::ServiceUnavailable(msg) => msg,
        }
    }

    /// Rejection body: `{success, message, timestamp, status}`
    pub fn to_json(&self) -> Value {
        json!({
            "success": false,
            "message": self.message(),
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "status": self.status_code(),
        })
    }
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn internal_server_error(message: impl Into<String>) -> Self {
        ApiError::InternalServerError(message.into())
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        ApiError::ServiceUnavailable(message.into())
    }
}

impl From<TenantRoutingError> for ApiError {
    fn from(err: TenantRoutingError) -> Self {
        match err {
            TenantRoutingError::MissingTenant => {
                ApiError::bad_request("Tenant identifier is required")
            }
            TenantRoutingError::TenantNotFound { tenant_id, reason } => {
                tracing::warn!(tenant_id = %tenant_id, ?reason, "tenant rejected");
                ApiError::not_found(format!("Tenant not found or inactive: {}", tenant_id))
            }
            TenantRoutingError::TenantUnavailable { tenant_id, source } => {
                tracing::error!(tenant_id = %tenant_id, error = %source, "tenant connection source unavailable");
                ApiError::service_unavailable(format!(
                    "Tenant '{}' is temporarily unavailable",
                    tenant_id
                ))
            }
            TenantRoutingError::Internal(detail) => {
                // Don't expose internal detail to clients
                tracing::error!(detail = %detail, "internal tenant resolution error");
                ApiError::internal_server_error("An internal error occurred while processing your request")
            }
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        tracing::error!("Connection source error: {}", err);
        ApiError::service_unavailable("Database temporarily unavailable")
    }
}

impl From<DirectoryError> for ApiError {
    fn from(err: DirectoryError) -> Self {
        tracing::error!("Tenant directory error: {}", err);
        ApiError::internal_server_error("An error occurred while processing your request")
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message())
    }
}

impl std::error::Error for ApiError {}

// Automatic HTTP response conversion for Axum
impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.to_json())).into_response()
    }
}
