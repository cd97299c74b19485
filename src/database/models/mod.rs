pub mod tenant;

pub use tenant::{ConnectionProfile, TenantRecord, TenantRow};
