pub mod response;
pub mod tenant_fallback;
pub mod tenant_pipeline;

pub use response::{ApiResponse, ApiResult};
pub use tenant_fallback::tenant_fallback;
pub use tenant_pipeline::{tenant_pipeline, ResolvedTenant};
