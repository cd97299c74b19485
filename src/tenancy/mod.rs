//! Tenant resolution and per-tenant connection routing.
//!
//! A request flows resolver → validator → registry → context; the request
//! pipeline middleware drives the sequence and clears the context afterwards.

pub mod context;
pub mod error;
pub mod resolver;
pub mod routing;
pub mod validator;

pub use context::{ContextError, TenantContext, TenantId};
pub use error::TenantRoutingError;
pub use resolver::{RequestAttributes, Resolution, ResolutionSource, Strategy, TenantResolver};
pub use routing::{RoutedTenant, TenantRouting, WarmUpReport};
pub use validator::{RejectionReason, TenantValidator, Validation};
